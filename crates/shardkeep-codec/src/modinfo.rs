//! Mod descriptor (`modinfo.lua`) reader.
//!
//! Only the `configuration_options` table is read. Mod authors are free to
//! compute labels at load time (`locale == "zh" and "..." or "..."`); those
//! fields cannot be evaluated without a Lua VM and are left empty.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::lua::{LuaValue, find_assignment};

/// One selectable value of a configuration option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub description: String,
    pub data: Option<LuaValue>,
    pub hover: String,
}

/// A configurable option declared by a mod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationOption {
    pub name: String,
    /// Display label. Falls back to `name` when the mod declares none.
    pub label: String,
    pub hover: String,
    pub default: Option<LuaValue>,
    pub options: Vec<OptionChoice>,
}

/// Extracts `configuration_options` from `modinfo.lua` source.
///
/// A descriptor without the table yields an empty list. Entries without a
/// name (section headers in many mods) are skipped.
pub fn parse_configuration_options(src: &str) -> Result<Vec<ConfigurationOption>, CodecError> {
    let Some(table) = find_assignment(src, "configuration_options")? else {
        return Ok(Vec::new());
    };

    let text = |v: &LuaValue, key: &str| {
        v.get(key)
            .map(|f| match f {
                LuaValue::List(_) | LuaValue::Map(_) => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    };

    let mut out = Vec::new();
    for entry in table.entries() {
        let name = text(entry, "name");
        if name.is_empty() {
            continue;
        }
        let label = match text(entry, "label") {
            l if l.is_empty() => name.clone(),
            l => l,
        };
        let options = entry
            .get("options")
            .map(|o| {
                o.entries()
                    .into_iter()
                    .map(|choice| OptionChoice {
                        description: text(choice, "description"),
                        data: choice.get("data").cloned(),
                        hover: text(choice, "hover"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        out.push(ConfigurationOption {
            hover: text(entry, "hover"),
            default: entry.get("default").cloned(),
            name,
            label,
            options,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODINFO: &str = r#"
name = "Global Positions"
description = "Shows players on the map"
author = "someone"
version = "1.2"
api_version = 10
dst_compatible = true
all_clients_require_mod = true

local function title(label)
    return { name = "", label = label, options = { { description = "", data = 0 } }, default = 0 }
end

configuration_options = {
    title("Display"),
    {
        name = "SHOWPLAYERICONS",
        label = locale == "zh" and "显示玩家" or "Player icons",
        hover = "Show player icons on the map.",
        options = {
            { description = "Show", data = true },
            { description = "Hide", data = false, hover = "No icons" },
        },
        default = true,
    },
    {
        name = "SCALE",
        options = { { description = "1x", data = 1 }, { description = "2x", data = 2 } },
        default = 1,
    },
}
"#;

    #[test]
    fn test_parses_named_options() {
        let opts = parse_configuration_options(MODINFO).unwrap();
        assert_eq!(opts.len(), 2);

        let icons = &opts[0];
        assert_eq!(icons.name, "SHOWPLAYERICONS");
        // Computed label is dropped, so the name is used.
        assert_eq!(icons.label, "SHOWPLAYERICONS");
        assert_eq!(icons.hover, "Show player icons on the map.");
        assert_eq!(icons.default, Some(LuaValue::Bool(true)));
        assert_eq!(icons.options.len(), 2);
        assert_eq!(icons.options[1].hover, "No icons");

        let scale = &opts[1];
        assert_eq!(scale.default, Some(LuaValue::Number(1.0)));
        assert_eq!(scale.options[1].data, Some(LuaValue::Number(2.0)));
    }

    #[test]
    fn test_missing_table_is_empty() {
        let opts = parse_configuration_options("name = 'x'\nversion = '1'").unwrap();
        assert!(opts.is_empty());
    }
}
