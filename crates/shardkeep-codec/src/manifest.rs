//! Workshop manifest (`appworkshop_322330.acf`) codec.
//!
//! The manifest is Valve's keyed-block text format: quoted tokens, one
//! key/value pair or block name per line, braces on their own lines.
//!
//! ```text
//! "AppWorkshop"
//! {
//!     "appid"     "322330"
//!     "WorkshopItemsInstalled"
//!     {
//!         "123"
//!         {
//!             "size"      "500"
//!             ...
//!         }
//!     }
//!     "WorkshopItemDetails"
//!     { ... }
//! }
//! ```
//!
//! Only the fields the game server needs are kept. Unknown header fields,
//! unknown item fields and unknown sections are skipped when parsing and
//! do not reappear on serialization.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::GAME_APP_ID;
use crate::error::CodecError;

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("valid regex"));

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// An entry of the `WorkshopItemsInstalled` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledItem {
    pub id: String,
    pub size: String,
    pub time_updated: String,
    pub manifest: String,
}

/// An entry of the `WorkshopItemDetails` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub manifest: String,
    pub time_updated: String,
    pub time_touched: String,
    pub latest_time_updated: String,
    pub latest_manifest: String,
}

// ---------------------------------------------------------------------------
// ManifestDocument
// ---------------------------------------------------------------------------

/// A parsed workshop manifest.
///
/// Item order is preserved. Ids are unique within each list; both
/// [`upsert_installed`](Self::upsert_installed) and
/// [`upsert_detail`](Self::upsert_detail) replace in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub app_id: String,
    pub size_on_disk: String,
    pub needs_update: String,
    pub needs_download: String,
    pub time_last_updated: String,
    pub time_last_app_ran: String,
    pub last_build_id: String,
    pub installed: Vec<InstalledItem>,
    pub details: Vec<ItemDetail>,
}

impl Default for ManifestDocument {
    fn default() -> Self {
        Self {
            app_id: GAME_APP_ID.to_owned(),
            size_on_disk: "2071004".to_owned(),
            needs_update: "0".to_owned(),
            needs_download: "0".to_owned(),
            time_last_updated: "0".to_owned(),
            time_last_app_ran: "0".to_owned(),
            last_build_id: "0".to_owned(),
            installed: Vec::new(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Installed,
    Details,
    Unknown,
}

impl ManifestDocument {
    /// Parses manifest text.
    ///
    /// Empty or whitespace-only input yields [`ManifestDocument::default`].
    /// Unbalanced braces are reported as [`CodecError::Manifest`].
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut doc = Self::default();
        let mut depth = 0usize;
        let mut section = Section::Unknown;
        let mut item_id: Option<String> = None;
        let mut fields: Vec<(String, String)> = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "{" {
                depth += 1;
                continue;
            }
            if trimmed == "}" {
                if depth == 0 {
                    return Err(CodecError::Manifest(format!(
                        "unexpected '}}' at line {}",
                        line_no + 1
                    )));
                }
                if depth == 3 {
                    if let Some(id) = item_id.take() {
                        doc.push_item(section, id, std::mem::take(&mut fields));
                    }
                } else if depth == 2 {
                    section = Section::Unknown;
                }
                depth -= 1;
                continue;
            }

            let tokens: Vec<&str> = QUOTED
                .captures_iter(trimmed)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            match (depth, tokens.as_slice()) {
                (1, [name]) => {
                    section = match *name {
                        "WorkshopItemsInstalled" => Section::Installed,
                        "WorkshopItemDetails" => Section::Details,
                        _ => Section::Unknown,
                    };
                }
                (1, [key, value]) => doc.set_header(key, value),
                (2, [id]) => {
                    item_id = Some((*id).to_owned());
                    fields.clear();
                }
                (3, [key, value]) => fields.push(((*key).to_owned(), (*value).to_owned())),
                _ => {}
            }
        }

        if depth != 0 {
            return Err(CodecError::Manifest(format!(
                "{depth} unclosed block(s) at end of input"
            )));
        }
        Ok(doc)
    }

    fn set_header(&mut self, key: &str, value: &str) {
        let slot = match key {
            "appid" => &mut self.app_id,
            "SizeOnDisk" => &mut self.size_on_disk,
            "NeedsUpdate" => &mut self.needs_update,
            "NeedsDownload" => &mut self.needs_download,
            "TimeLastUpdated" => &mut self.time_last_updated,
            "TimeLastAppRan" => &mut self.time_last_app_ran,
            "LastBuildID" => &mut self.last_build_id,
            _ => return,
        };
        *slot = value.to_owned();
    }

    fn push_item(&mut self, section: Section, id: String, fields: Vec<(String, String)>) {
        let field = |name: &str| {
            fields
                .iter()
                .rev()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        match section {
            Section::Installed => self.installed.push(InstalledItem {
                size: field("size"),
                time_updated: field("timeupdated"),
                manifest: field("manifest"),
                id,
            }),
            Section::Details => self.details.push(ItemDetail {
                manifest: field("manifest"),
                time_updated: field("timeupdated"),
                time_touched: field("timetouched"),
                latest_time_updated: field("latest_timeupdated"),
                latest_manifest: field("latest_manifest"),
                id,
            }),
            Section::Unknown => {}
        }
    }

    /// Serializes back to the manifest text layout the game writes.
    pub fn to_acf(&self) -> String {
        let mut out = String::from("\"AppWorkshop\"\n{\n");
        for (key, value) in [
            ("appid", &self.app_id),
            ("SizeOnDisk", &self.size_on_disk),
            ("NeedsUpdate", &self.needs_update),
            ("NeedsDownload", &self.needs_download),
            ("TimeLastUpdated", &self.time_last_updated),
            ("TimeLastAppRan", &self.time_last_app_ran),
            ("LastBuildID", &self.last_build_id),
        ] {
            out.push_str(&format!("\t\"{key}\"\t\t\"{value}\"\n"));
        }

        out.push_str("\t\"WorkshopItemsInstalled\"\n\t{\n");
        for item in &self.installed {
            out.push_str(&format!("\t\t\"{}\"\n\t\t{{\n", item.id));
            push_field(&mut out, "size", &item.size);
            push_field(&mut out, "timeupdated", &item.time_updated);
            push_field(&mut out, "manifest", &item.manifest);
            out.push_str("\t\t}\n");
        }
        out.push_str("\n\t}\n");

        out.push_str("\t\"WorkshopItemDetails\"\n\t{\n");
        for item in &self.details {
            out.push_str(&format!("\t\t\"{}\"\n\t\t{{\n", item.id));
            push_field(&mut out, "manifest", &item.manifest);
            push_field(&mut out, "timeupdated", &item.time_updated);
            push_field(&mut out, "timetouched", &item.time_touched);
            push_field(&mut out, "latest_timeupdated", &item.latest_time_updated);
            push_field(&mut out, "latest_manifest", &item.latest_manifest);
            out.push_str("\t\t}\n");
        }
        out.push_str("\n\t}\n}");
        out
    }

    pub fn installed_item(&self, id: &str) -> Option<&InstalledItem> {
        self.installed.iter().find(|i| i.id == id)
    }

    pub fn detail(&self, id: &str) -> Option<&ItemDetail> {
        self.details.iter().find(|i| i.id == id)
    }

    /// Replaces the installed entry with the same id, or appends it.
    pub fn upsert_installed(&mut self, item: InstalledItem) {
        match self.installed.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => *slot = item,
            None => self.installed.push(item),
        }
    }

    /// Replaces the detail entry with the same id, or appends it.
    pub fn upsert_detail(&mut self, item: ItemDetail) {
        match self.details.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => *slot = item,
            None => self.details.push(item),
        }
    }

    /// Copies item `id` from `source` into this manifest.
    ///
    /// The installed entry must exist in `source`; the detail entry is
    /// merged only when present. Each list is merged independently.
    pub fn merge_item(&mut self, source: &ManifestDocument, id: &str) -> Result<(), CodecError> {
        let installed = source
            .installed_item(id)
            .cloned()
            .ok_or_else(|| CodecError::MissingItem(id.to_owned()))?;
        self.upsert_installed(installed);
        if let Some(detail) = source.detail(id).cloned() {
            self.upsert_detail(detail);
        }
        Ok(())
    }

    /// Removes `id` from both lists. Returns `true` if anything was removed.
    pub fn remove_item(&mut self, id: &str) -> bool {
        let before = self.installed.len() + self.details.len();
        self.installed.retain(|i| i.id != id);
        self.details.retain(|i| i.id != id);
        before != self.installed.len() + self.details.len()
    }

    /// Ids of all installed items, in manifest order.
    pub fn installed_ids(&self) -> Vec<&str> {
        self.installed.iter().map(|i| i.id.as_str()).collect()
    }
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("\t\t\t\"{key}\"\t\t\"{value}\"\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\"AppWorkshop\"
{
\t\"appid\"\t\t\"322330\"
\t\"SizeOnDisk\"\t\t\"12345\"
\t\"NeedsUpdate\"\t\t\"0\"
\t\"NeedsDownload\"\t\t\"0\"
\t\"TimeLastUpdated\"\t\t\"1700000000\"
\t\"TimeLastAppRan\"\t\t\"1700000001\"
\t\"LastBuildID\"\t\t\"42\"
\t\"WorkshopItemsInstalled\"
\t{
\t\t\"378160973\"
\t\t{
\t\t\t\"size\"\t\t\"3307618\"
\t\t\t\"timeupdated\"\t\t\"1698765432\"
\t\t\t\"manifest\"\t\t\"8837128371\"
\t\t\t\"unknownfield\"\t\t\"x\"
\t\t}
\t}
\t\"WorkshopItemDetails\"
\t{
\t\t\"378160973\"
\t\t{
\t\t\t\"manifest\"\t\t\"8837128371\"
\t\t\t\"timeupdated\"\t\t\"1698765432\"
\t\t\t\"timetouched\"\t\t\"1700000002\"
\t\t\t\"latest_timeupdated\"\t\t\"1698765432\"
\t\t\t\"latest_manifest\"\t\t\"8837128371\"
\t\t}
\t}
}
";

    #[test]
    fn test_parse_reads_header_and_items() {
        let doc = ManifestDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.app_id, "322330");
        assert_eq!(doc.size_on_disk, "12345");
        assert_eq!(doc.last_build_id, "42");
        assert_eq!(doc.installed.len(), 1);
        assert_eq!(doc.installed[0].id, "378160973");
        assert_eq!(doc.installed[0].size, "3307618");
        assert_eq!(doc.details.len(), 1);
        assert_eq!(doc.details[0].time_touched, "1700000002");
    }

    #[test]
    fn test_empty_input_is_default() {
        let doc = ManifestDocument::parse("  \n").unwrap();
        assert_eq!(doc, ManifestDocument::default());
    }

    #[test]
    fn test_unbalanced_braces_are_rejected() {
        assert!(ManifestDocument::parse("\"AppWorkshop\"\n{\n").is_err());
        assert!(ManifestDocument::parse("}\n").is_err());
    }

    #[test]
    fn test_serialization_layout() {
        let mut doc = ManifestDocument::default();
        doc.upsert_installed(InstalledItem {
            id: "1".into(),
            size: "2".into(),
            time_updated: "3".into(),
            manifest: "4".into(),
        });
        let text = doc.to_acf();
        assert!(text.starts_with("\"AppWorkshop\"\n{\n\t\"appid\"\t\t\"322330\"\n"));
        assert!(text.contains(
            "\t\t\"1\"\n\t\t{\n\t\t\t\"size\"\t\t\"2\"\n\t\t\t\"timeupdated\"\t\t\"3\"\n\t\t\t\"manifest\"\t\t\"4\"\n\t\t}\n\n\t}\n"
        ));
        assert!(text.ends_with("\n\t}\n}"));
    }

    #[test]
    fn test_remove_item_touches_both_lists() {
        let mut doc = ManifestDocument::parse(SAMPLE).unwrap();
        assert!(doc.remove_item("378160973"));
        assert!(doc.installed.is_empty());
        assert!(doc.details.is_empty());
        assert!(!doc.remove_item("378160973"));
    }

    #[test]
    fn test_merge_missing_item_errors() {
        let mut doc = ManifestDocument::default();
        let err = doc.merge_item(&ManifestDocument::default(), "9").unwrap_err();
        assert!(matches!(err, CodecError::MissingItem(id) if id == "9"));
    }
}
