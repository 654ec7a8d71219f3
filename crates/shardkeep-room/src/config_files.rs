//! Rendering of `cluster.ini` and `server.ini`.

use rand::Rng;
use rand::distr::Alphanumeric;
use shardkeep_codec::IniDocument;

use crate::{Room, RoomSetting, World};

const CLUSTER_KEY_LEN: usize = 14;

/// Game mode as the server expects it. The platform's survival presets
/// all run as `survival`; `custom` uses the room's free-text mode.
pub fn cluster_game_mode(room: &Room) -> &str {
    match room.game_mode.as_str() {
        "relaxed" | "wilderness" | "lightsOut" => "survival",
        "custom" => &room.custom_game_mode,
        other => other,
    }
}

/// Renders `cluster.ini`.
///
/// `whitelist_slots` is the number of whitelisted players. `lang` picks
/// the cluster language; anything but `en` is `zh`.
pub fn cluster_ini(room: &Room, setting: &RoomSetting, whitelist_slots: usize, lang: &str) -> IniDocument {
    let mut ini = IniDocument::new();
    ini.section("GAMEPLAY")
        .entry("game_mode", cluster_game_mode(room))
        .entry("max_players", room.max_player)
        .entry("pvp", room.pvp)
        .entry("pause_when_empty", room.pause_empty)
        .entry("vote_enabled", room.vote)
        .entry("vote_kick_enabled", room.vote);
    ini.section("NETWORK")
        .entry("lan_only_cluster", room.lan)
        .entry("offline_cluster", room.offline)
        .entry("cluster_description", &room.description)
        .entry("whitelist_slots", whitelist_slots)
        .entry("cluster_name", &room.game_name)
        .entry("cluster_password", &room.password)
        .entry("cluster_language", if lang == "en" { "en" } else { "zh" })
        .entry("tick_rate", setting.tick_rate);
    ini.section("MISC")
        .entry("console_enabled", true)
        .entry("max_snapshots", room.max_roll_back);
    ini.section("SHARD")
        .entry("shard_enabled", true)
        .entry("bind_ip", "0.0.0.0")
        .entry("master_ip", &room.master_ip)
        .entry("master_port", room.master_port)
        .entry("cluster_key", &room.cluster_key);
    if !room.steam_group_id.is_empty() {
        ini.section("STEAM")
            .entry("steam_group_admins", room.steam_group_admins)
            .entry("steam_group_id", &room.steam_group_id)
            .entry("steam_group_only", room.steam_group_only);
    }
    ini
}

/// Renders one world's `server.ini`.
pub fn server_ini(world: &World) -> IniDocument {
    let mut ini = IniDocument::new();
    ini.section("NETWORK").entry("server_port", world.server_port);
    ini.section("SHARD")
        .entry("id", world.game_id)
        .entry("is_master", world.is_master)
        .entry("name", &world.world_name);
    ini.section("STEAM")
        .entry("master_server_port", world.master_server_port)
        .entry("authentication_port", world.authentication_port);
    ini.section("ACCOUNT")
        .entry("encode_user_path", world.encode_user_path);
    ini
}

/// A fresh shard-to-shard key.
pub fn generate_cluster_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CLUSTER_KEY_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room {
            id: 1,
            game_name: "My Server".into(),
            description: "hello".into(),
            game_mode: "relaxed".into(),
            max_player: 6,
            max_roll_back: 10,
            vote: true,
            password: "pw".into(),
            master_ip: "127.0.0.1".into(),
            master_port: 10888,
            cluster_key: "k".into(),
            ..Room::default()
        }
    }

    #[test]
    fn test_cluster_ini_layout() {
        let text = cluster_ini(&room(), &RoomSetting::default(), 2, "en").to_string();
        let expected = "\
[GAMEPLAY]
game_mode = survival
max_players = 6
pvp = false
pause_when_empty = false
vote_enabled = true
vote_kick_enabled = true

[NETWORK]
lan_only_cluster = false
offline_cluster = false
cluster_description = hello
whitelist_slots = 2
cluster_name = My Server
cluster_password = pw
cluster_language = en
tick_rate = 15

[MISC]
console_enabled = true
max_snapshots = 10

[SHARD]
shard_enabled = true
bind_ip = 0.0.0.0
master_ip = 127.0.0.1
master_port = 10888
cluster_key = k
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_steam_section_only_with_group() {
        let mut r = room();
        assert!(cluster_ini(&r, &RoomSetting::default(), 0, "zh").get("STEAM").is_none());

        r.steam_group_id = "9001".into();
        r.steam_group_only = true;
        let ini = cluster_ini(&r, &RoomSetting::default(), 0, "zh");
        let names: Vec<&str> = ini.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["GAMEPLAY", "NETWORK", "MISC", "SHARD", "STEAM"]);
        assert_eq!(ini.get("STEAM").unwrap().get("steam_group_only"), Some("true"));
    }

    #[test]
    fn test_game_mode_mapping() {
        let mut r = room();
        for (mode, expected) in [("wilderness", "survival"), ("lightsOut", "survival"), ("endless", "endless")] {
            r.game_mode = mode.into();
            assert_eq!(cluster_game_mode(&r), expected);
        }
        r.game_mode = "custom".into();
        r.custom_game_mode = "quagmire".into();
        assert_eq!(cluster_game_mode(&r), "quagmire");
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let ini = cluster_ini(&room(), &RoomSetting::default(), 0, "fr");
        assert_eq!(ini.get("NETWORK").unwrap().get("cluster_language"), Some("zh"));
    }

    #[test]
    fn test_server_ini() {
        let world = World {
            game_id: 2,
            world_name: "Caves".into(),
            server_port: 11001,
            master_server_port: 27019,
            authentication_port: 8769,
            encode_user_path: true,
            ..World::default()
        };
        assert_eq!(
            server_ini(&world).to_string(),
            "[NETWORK]\nserver_port = 11001\n\n[SHARD]\nid = 2\nis_master = false\nname = Caves\n\n\
             [STEAM]\nmaster_server_port = 27019\nauthentication_port = 8769\n\n\
             [ACCOUNT]\nencode_user_path = true\n"
        );
    }

    #[test]
    fn test_cluster_key_shape() {
        let key = generate_cluster_key();
        assert_eq!(key.len(), 14);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_cluster_key());
    }
}
