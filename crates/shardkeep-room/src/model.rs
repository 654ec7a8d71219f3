//! Room, world and settings records.
//!
//! These are the rows an outside store keeps. Field names serialize the
//! way the management API has always exposed them (`roomID`, `masterIP`,
//! ...), so a `dmp.json` written by one version restores on another.
//!
//! Schedules are kept as JSON text inside the settings row; the typed
//! accessors on [`RoomSetting`] decode them on demand.

use serde::{Deserialize, Serialize};
use shardkeep_session::{SessionError, StartVariant};

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Room {
    pub id: i64,
    /// Active rooms have jobs registered and are polled.
    pub status: bool,
    pub game_name: String,
    pub description: String,
    pub game_mode: String,
    pub custom_game_mode: String,
    pub pvp: bool,
    pub max_player: u32,
    pub max_roll_back: u32,
    /// All worlds share `mod_data` instead of their own override text.
    pub mod_in_one: bool,
    pub mod_data: String,
    pub vote: bool,
    pub pause_empty: bool,
    pub password: String,
    pub token: String,
    #[serde(rename = "masterIP")]
    pub master_ip: String,
    pub master_port: u16,
    pub cluster_key: String,
    pub lan: bool,
    pub offline: bool,
    pub steam_group_only: bool,
    #[serde(rename = "steamGroupID")]
    pub steam_group_id: String,
    pub steam_group_admins: bool,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// One shard of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct World {
    pub id: i64,
    #[serde(rename = "roomID")]
    pub room_id: i64,
    /// Shard id assigned by the game (`[SHARD] id`).
    #[serde(rename = "gameID")]
    pub game_id: i64,
    pub world_name: String,
    pub server_port: u16,
    pub master_server_port: u16,
    pub authentication_port: u16,
    pub is_master: bool,
    pub encode_user_path: bool,
    pub level_data: String,
    pub mod_data: String,
    /// Last `[HH:MM:SS]` stamp seen by the keepalive watchdog.
    pub last_alive_time: String,
}

// ---------------------------------------------------------------------------
// RoomSetting
// ---------------------------------------------------------------------------

/// Per-room automation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSetting {
    #[serde(rename = "roomID")]
    pub room_id: i64,
    pub backup_enable: bool,
    /// JSON list of `{"time": "HH:MM:SS"}`.
    pub backup_setting: String,
    pub backup_clean_enable: bool,
    /// Retention in days.
    pub backup_clean_setting: u32,
    pub restart_enable: bool,
    /// `HH:MM:SS`.
    pub restart_setting: String,
    /// JSON list of [`Announcement`].
    pub announce_setting: String,
    pub keepalive_enable: bool,
    /// Interval in minutes.
    pub keepalive_setting: u64,
    pub scheduled_start_stop_enable: bool,
    /// JSON `{"start": "HH:MM:SS", "stop": "HH:MM:SS"}`.
    pub scheduled_start_stop_setting: String,
    pub tick_rate: u32,
    /// `32-bit`, `64-bit` or `luajit`.
    pub start_type: String,
    #[serde(rename = "customIP")]
    pub custom_ip: String,
    pub custom_port: u16,
}

impl Default for RoomSetting {
    fn default() -> Self {
        Self {
            room_id: 0,
            backup_enable: false,
            backup_setting: "[]".to_owned(),
            backup_clean_enable: false,
            backup_clean_setting: 30,
            restart_enable: false,
            restart_setting: "06:00:00".to_owned(),
            announce_setting: "[]".to_owned(),
            keepalive_enable: false,
            keepalive_setting: 5,
            scheduled_start_stop_enable: false,
            scheduled_start_stop_setting: String::new(),
            tick_rate: 15,
            start_type: "64-bit".to_owned(),
            custom_ip: String::new(),
            custom_port: 0,
        }
    }
}

/// One entry of the backup schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSlot {
    pub time: String,
}

/// One repeating announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub status: bool,
    /// Seconds between announcements.
    pub interval: u64,
    pub content: String,
}

/// Daily start and stop times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStopTimes {
    pub start: String,
    pub stop: String,
}

fn json_or_default<T: for<'de> Deserialize<'de> + Default>(text: &str) -> Result<T, serde_json::Error> {
    if text.trim().is_empty() {
        Ok(T::default())
    } else {
        serde_json::from_str(text)
    }
}

impl RoomSetting {
    /// Backup times, one per daily backup job. Blank text is no backups.
    pub fn backup_slots(&self) -> Result<Vec<BackupSlot>, serde_json::Error> {
        json_or_default(&self.backup_setting)
    }

    pub fn announcements(&self) -> Result<Vec<Announcement>, serde_json::Error> {
        json_or_default(&self.announce_setting)
    }

    pub fn start_stop(&self) -> Result<StartStopTimes, serde_json::Error> {
        json_or_default(&self.scheduled_start_stop_setting)
    }

    pub fn start_variant(&self) -> Result<StartVariant, SessionError> {
        self.start_type.parse()
    }
}

// ---------------------------------------------------------------------------
// GlobalSetting
// ---------------------------------------------------------------------------

/// Platform-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSetting {
    /// Seconds between online player polls.
    pub player_get_frequency: u64,
    #[serde(rename = "UIDMaintainEnable")]
    pub uid_maintain_enable: bool,
    pub sys_metrics_enable: bool,
    /// Hours of system metrics kept.
    pub sys_metrics_setting: u64,
    pub auto_update_enable: bool,
    /// `HH:MM:SS`.
    pub auto_update_setting: String,
    pub auto_update_restart: bool,
}

impl Default for GlobalSetting {
    fn default() -> Self {
        Self {
            player_get_frequency: 30,
            uid_maintain_enable: false,
            sys_metrics_enable: true,
            sys_metrics_setting: 12,
            auto_update_enable: false,
            auto_update_setting: "05:00:00".to_owned(),
            auto_update_restart: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSnapshot
// ---------------------------------------------------------------------------

/// Everything needed to recreate a room, stored as `dmp.json` inside
/// each backup archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: Room,
    pub worlds: Vec<World>,
    pub room_setting: RoomSetting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_field_names() {
        let room = Room {
            id: 3,
            master_ip: "127.0.0.1".into(),
            steam_group_id: "123".into(),
            ..Room::default()
        };
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["masterIP"], "127.0.0.1");
        assert_eq!(json["steamGroupID"], "123");
        assert_eq!(json["modInOne"], false);
    }

    #[test]
    fn test_schedule_accessors() {
        let setting = RoomSetting {
            backup_setting: r#"[{"time":"06:00:00"},{"time":"18:30:00"}]"#.into(),
            announce_setting: r#"[{"id":"a-b","status":true,"interval":600,"content":"hi"}]"#.into(),
            scheduled_start_stop_setting: r#"{"start":"08:00:00","stop":"02:00:00"}"#.into(),
            ..RoomSetting::default()
        };
        assert_eq!(setting.backup_slots().unwrap().len(), 2);
        assert_eq!(setting.announcements().unwrap()[0].interval, 600);
        assert_eq!(setting.start_stop().unwrap().stop, "02:00:00");
    }

    #[test]
    fn test_blank_schedules_are_empty() {
        let setting = RoomSetting {
            backup_setting: String::new(),
            ..RoomSetting::default()
        };
        assert!(setting.backup_slots().unwrap().is_empty());
        assert_eq!(setting.start_stop().unwrap(), StartStopTimes::default());
    }

    #[test]
    fn test_bad_start_type() {
        let setting = RoomSetting {
            start_type: "arm64".into(),
            ..RoomSetting::default()
        };
        assert!(setting.start_variant().is_err());
    }

    #[test]
    fn test_snapshot_reads_partial_rows() {
        let snap: RoomSnapshot = serde_json::from_str(
            r#"{"room":{"id":5,"gameName":"x"},"worlds":[{"worldName":"Master","isMaster":true}],"roomSetting":{"tickRate":30}}"#,
        )
        .unwrap();
        assert_eq!(snap.room.id, 5);
        assert!(snap.worlds[0].is_master);
        assert_eq!(snap.room_setting.tick_rate, 30);
        assert_eq!(snap.room_setting.start_type, "64-bit");
    }
}
