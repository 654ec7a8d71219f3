//! Mod override table (`modoverrides.lua`).
//!
//! One file per world lists every enabled mod and its configuration:
//!
//! ```lua
//! return {
//!   ["workshop-378160973"]={
//!     configuration_options={
//!       difficulty=3,
//!       lang="en"
//!     },
//!     enabled=true
//!   }
//! }
//! ```
//!
//! Output is deterministic: mods and options are emitted in sorted key
//! order, so writing the same collection twice yields identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::lua::{LuaValue, format_number, parse_literal};

/// Key of the pseudo-mod that tells the server to ignore client-only mods.
pub const DISABLED_LOCAL_MODS_KEY: &str = "client_mods_disabled";

/// Builds the override key for a workshop item id (`workshop-<id>`).
///
/// Id `0` maps to [`DISABLED_LOCAL_MODS_KEY`].
pub fn workshop_key(id: u64) -> String {
    if id == 0 {
        DISABLED_LOCAL_MODS_KEY.to_owned()
    } else {
        format!("workshop-{id}")
    }
}

/// One entry of the override table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModConfig {
    pub enabled: bool,
    pub configuration_options: BTreeMap<String, LuaValue>,
}

/// The full override table of one world, keyed by mod key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModOverrideCollection {
    pub mods: BTreeMap<String, ModConfig>,
}

impl ModOverrideCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `modoverrides.lua` text.
    ///
    /// Blank input is an empty collection. Entries whose value is not a
    /// table are skipped; a missing `enabled` reads as `false`.
    pub fn parse(src: &str) -> Result<Self, CodecError> {
        if src.trim().is_empty() {
            return Ok(Self::default());
        }

        let root = parse_literal(src)?;
        let entries = match root {
            LuaValue::Map(map) => map,
            LuaValue::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), v))
                .collect(),
            other => {
                return Err(CodecError::LuaShape(format!(
                    "mod overrides must return a table, got {other}"
                )));
            }
        };

        let mut mods = BTreeMap::new();
        for (key, value) in entries {
            if !matches!(value, LuaValue::Map(_)) {
                continue;
            }
            let enabled = value
                .get("enabled")
                .and_then(LuaValue::as_bool)
                .unwrap_or(false);
            let configuration_options = match value.get("configuration_options") {
                Some(LuaValue::Map(options)) => options.clone(),
                Some(LuaValue::List(items)) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ((i + 1).to_string(), v.clone()))
                    .collect(),
                _ => BTreeMap::new(),
            };
            mods.insert(
                key,
                ModConfig {
                    enabled,
                    configuration_options,
                },
            );
        }
        Ok(Self { mods })
    }

    /// Renders the collection as Lua source.
    pub fn to_lua(&self) -> String {
        let mut out = String::from("return {\n");
        let count = self.mods.len();
        for (index, (key, config)) in self.mods.iter().enumerate() {
            if key == DISABLED_LOCAL_MODS_KEY {
                out.push_str(&format!("  {DISABLED_LOCAL_MODS_KEY}={{\n"));
            } else {
                out.push_str(&format!("  [{}]={{\n", quote(key)));
            }

            out.push_str("    configuration_options={\n");
            let options = config.configuration_options.len();
            for (i, (name, value)) in config.configuration_options.iter().enumerate() {
                out.push_str(&format!(
                    "      {}={}",
                    format_lua_key(name),
                    format_lua_value(value)
                ));
                out.push_str(if i + 1 < options { ",\n" } else { "\n" });
            }
            out.push_str("    },\n");
            out.push_str(&format!("    enabled={}\n", config.enabled));
            out.push_str(if index + 1 < count { "  },\n" } else { "  }\n" });
        }
        out.push('}');
        out
    }

    pub fn get(&self, key: &str) -> Option<&ModConfig> {
        self.mods.get(key)
    }

    /// Inserts or replaces a mod entry.
    pub fn insert(&mut self, key: impl Into<String>, config: ModConfig) {
        self.mods.insert(key.into(), config);
    }

    /// Removes a mod entry. Returns `true` if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.mods.remove(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    /// Numeric ids of all entries, in key order.
    ///
    /// `workshop-<id>` keys yield `<id>`; the disabled-local-mods sentinel
    /// yields `0`. Other keys are ignored.
    pub fn workshop_ids(&self) -> Vec<u64> {
        self.mods
            .keys()
            .filter_map(|key| {
                if key == DISABLED_LOCAL_MODS_KEY {
                    Some(0)
                } else {
                    key.strip_prefix("workshop-")?.parse().ok()
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Lua rendering helpers
// ---------------------------------------------------------------------------

fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders a table key: bare when it is a plain identifier, otherwise
/// bracket-quoted (`["my key"]`).
pub fn format_lua_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_owned()
    } else {
        format!("[{}]", quote(key))
    }
}

/// Renders a value as a Lua literal.
///
/// Lists render as `{a,b}`; maps render as `{k=v,...}` in key order.
pub fn format_lua_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Bool(b) => b.to_string(),
        LuaValue::Number(n) => format_number(*n),
        LuaValue::String(s) => quote(s),
        LuaValue::List(items) => {
            let inner: Vec<String> = items.iter().map(format_lua_value).collect();
            format!("{{{}}}", inner.join(","))
        }
        LuaValue::Map(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}={}", format_lua_key(k), format_lua_value(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\{:03}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
