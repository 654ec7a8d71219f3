//! Integration tests for the on-disk text formats.
//!
//! Each test feeds realistic file contents through the public API the room
//! controller uses, then checks what would be written back to disk.

use std::collections::BTreeMap;

use shardkeep_codec::{
    BackupName, DISABLED_LOCAL_MODS_KEY, InstalledItem, ItemDetail, LuaValue, ManifestDocument,
    ModConfig, ModOverrideCollection, parse_literal, parse_literal_lenient,
};

// =========================================================================
// Helpers
// =========================================================================

fn downloaded_manifest(id: &str, size: &str) -> ManifestDocument {
    let mut doc = ManifestDocument::default();
    doc.upsert_installed(InstalledItem {
        id: id.to_owned(),
        size: size.to_owned(),
        time_updated: "1700000000".to_owned(),
        manifest: "998877".to_owned(),
    });
    doc.upsert_detail(ItemDetail {
        id: id.to_owned(),
        manifest: "998877".to_owned(),
        time_updated: "1700000000".to_owned(),
        time_touched: "1700000005".to_owned(),
        latest_time_updated: "1700000000".to_owned(),
        latest_manifest: "998877".to_owned(),
    });
    doc
}

// =========================================================================
// Workshop manifest
// =========================================================================

#[test]
fn test_manifest_survives_serialize_and_parse() {
    let mut doc = downloaded_manifest("123", "500");
    doc.merge_item(&downloaded_manifest("456", "42"), "456").unwrap();
    doc.last_build_id = "17".to_owned();

    let reparsed = ManifestDocument::parse(&doc.to_acf()).unwrap();
    assert_eq!(reparsed, doc);
}

#[test]
fn test_merge_into_empty_then_replace() {
    let mut game = ManifestDocument::parse("").unwrap();

    game.merge_item(&downloaded_manifest("123", "500"), "123").unwrap();
    assert_eq!(game.installed.len(), 1);
    assert_eq!(game.installed_item("123").unwrap().size, "500");

    game.merge_item(&downloaded_manifest("123", "999"), "123").unwrap();
    assert_eq!(game.installed.len(), 1);
    assert_eq!(game.details.len(), 1);
    assert_eq!(game.installed_item("123").unwrap().size, "999");
}

#[test]
fn test_merge_keeps_other_items_in_order() {
    let mut game = downloaded_manifest("1", "10");
    game.merge_item(&downloaded_manifest("2", "20"), "2").unwrap();
    game.merge_item(&downloaded_manifest("1", "11"), "1").unwrap();
    assert_eq!(game.installed_ids(), vec!["1", "2"]);
    assert_eq!(game.installed_item("1").unwrap().size, "11");
}

// =========================================================================
// Mod overrides
// =========================================================================

#[test]
fn test_mod_overrides_round_trip() {
    let mut c = ModOverrideCollection::new();
    c.insert(
        "workshop-378160973",
        ModConfig {
            enabled: true,
            configuration_options: BTreeMap::from([
                ("difficulty".to_owned(), LuaValue::Number(3.0)),
                ("lang".to_owned(), LuaValue::String("en".to_owned())),
                (
                    "colors".to_owned(),
                    LuaValue::List(vec![
                        LuaValue::String("red".to_owned()),
                        LuaValue::String("blue".to_owned()),
                    ]),
                ),
                ("ratio".to_owned(), LuaValue::Number(0.75)),
            ]),
        },
    );
    c.insert(DISABLED_LOCAL_MODS_KEY, ModConfig::default());

    let text = c.to_lua();
    let parsed = ModOverrideCollection::parse(&text).unwrap();
    assert_eq!(parsed, c);
    // Serializing again yields identical bytes.
    assert_eq!(parsed.to_lua(), text);
}

#[test]
fn test_mod_overrides_written_by_game_tools() {
    // Hand-edited files use arbitrary spacing, comments and quote styles.
    let src = r#"
-- generated by the world settings screen
return {
  ["workshop-1185229307"] = { configuration_options = { ["Show Health"] = true, range = 30 }, enabled = true },
  ['workshop-666155465'] = { enabled = false };
  client_mods_disabled = { configuration_options = {}, enabled = true },
}
"#;
    let c = ModOverrideCollection::parse(src).unwrap();
    assert_eq!(c.len(), 3);
    let health = c.get("workshop-1185229307").unwrap();
    assert_eq!(
        health.configuration_options.get("Show Health"),
        Some(&LuaValue::Bool(true))
    );
    assert!(!c.get("workshop-666155465").unwrap().enabled);
    assert!(c.to_lua().contains("      [\"Show Health\"]=true,\n"));
}

// =========================================================================
// Lua literal shapes
// =========================================================================

#[test]
fn test_list_map_and_empty_are_distinguished() {
    assert!(matches!(parse_literal("{1,2,3}").unwrap(), LuaValue::List(v) if v.len() == 3));
    assert!(matches!(parse_literal("{[1]=1,[3]=3}").unwrap(), LuaValue::Map(m) if m.len() == 2));
    assert!(matches!(parse_literal("{}").unwrap(), LuaValue::Map(m) if m.is_empty()));
}

#[test]
fn test_session_meta_shape() {
    let meta = "return { clock = { cycles = 41, phase = \"dusk\" }, seasons = { season = \"autumn\", \
                elapseddaysinseason = 5, lengths = { summer = 15, autumn = 20, spring = 20, winter = 15 } } }\0";
    let v = parse_literal_lenient(meta.trim_end_matches('\0')).unwrap();
    assert_eq!(v.get("clock").and_then(|c| c.get("cycles")), Some(&LuaValue::Number(41.0)));
    assert_eq!(
        v.get("seasons").and_then(|s| s.get("lengths")).and_then(|l| l.get("autumn")),
        Some(&LuaValue::Number(20.0))
    );
}

// =========================================================================
// Backup names
// =========================================================================

#[test]
fn test_backup_name_round_trip() {
    let name = BackupName::new("MyServer", "7", 1_700_000_000_000);
    let file = name.file_name();
    let decoded = BackupName::decode(&file).unwrap();
    assert_eq!(decoded.game_name, "MyServer");
    assert_eq!(decoded.cycles, "7");
    assert_eq!(decoded.timestamp_ms, 1_700_000_000_000);
}

#[test]
fn test_backup_name_with_unicode_game_name() {
    let name = BackupName::new("饥荒 服务器", "-1", 1);
    assert_eq!(BackupName::decode(&name.file_name()).unwrap(), name);
}
