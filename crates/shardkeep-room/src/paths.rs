//! Filesystem layout of the platform, a room and a world.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shardkeep_codec::GAME_APP_ID;
use shardkeep_session::cluster_dir_name;

/// Where the platform keeps things.
///
/// Every path except `root` is relative to `root`, which is also the
/// working directory of the shell runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformPaths {
    pub root: PathBuf,
    /// Parent of every `Cluster_<id>` directory.
    pub cluster_root: PathBuf,
    /// Platform data: backups, temporary mod downloads.
    pub files_dir: PathBuf,
    /// Game install.
    pub game_dir: PathBuf,
    pub steamcmd_dir: PathBuf,
    /// Daemon log directory (`access.log`, `runtime.log`).
    pub logs_dir: PathBuf,
    pub steam_log: PathBuf,
}

impl Default for PlatformPaths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            cluster_root: PathBuf::from(".klei/DoNotStarveTogether"),
            files_dir: PathBuf::from("dmp_files"),
            game_dir: PathBuf::from("dst"),
            steamcmd_dir: PathBuf::from("steamcmd"),
            logs_dir: PathBuf::from("logs"),
            steam_log: PathBuf::from("Steam/logs/bootstrap_log.txt"),
        }
    }
}

impl PlatformPaths {
    /// Default layout under `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    fn abs(&self, p: &Path) -> PathBuf {
        self.root.join(p)
    }

    pub fn cluster_root(&self) -> PathBuf {
        self.abs(&self.cluster_root)
    }

    pub fn game_dir(&self) -> PathBuf {
        self.abs(&self.game_dir)
    }

    pub fn steamcmd_dir(&self) -> PathBuf {
        self.abs(&self.steamcmd_dir)
    }

    /// `dedicated_server_mods_setup.lua`, read by the game on start.
    pub fn mod_setup_file(&self) -> PathBuf {
        self.game_dir().join("mods/dedicated_server_mods_setup.lua")
    }

    /// Directory of non-UGC mods (`workshop-<id>` subdirectories).
    pub fn local_mods_dir(&self) -> PathBuf {
        self.game_dir().join("mods")
    }

    pub fn version_file(&self) -> PathBuf {
        self.game_dir().join("version.txt")
    }

    /// Root of all temporary UGC downloads.
    pub fn ugc_download_root(&self) -> PathBuf {
        self.abs(&self.files_dir).join("mods/ugc")
    }

    pub fn access_log(&self) -> PathBuf {
        self.abs(&self.logs_dir).join("access.log")
    }

    pub fn runtime_log(&self) -> PathBuf {
        self.abs(&self.logs_dir).join("runtime.log")
    }

    pub fn steam_log(&self) -> PathBuf {
        self.abs(&self.steam_log)
    }

    pub fn room(&self, room_id: i64) -> RoomPaths {
        let cluster = cluster_dir_name(room_id);
        let cluster_dir = self.cluster_root().join(&cluster);
        RoomPaths {
            cluster_ini: cluster_dir.join("cluster.ini"),
            cluster_token: cluster_dir.join("cluster_token.txt"),
            adminlist: cluster_dir.join("adminlist.txt"),
            blocklist: cluster_dir.join("blocklist.txt"),
            whitelist: cluster_dir.join("whitelist.txt"),
            snapshot_json: cluster_dir.join("dmp.json"),
            backup_dir: self.abs(&self.files_dir).join("backup").join(room_id.to_string()),
            ugc_dir: self.game_dir().join("ugc_mods").join(&cluster),
            ugc_download_dir: self.ugc_download_root().join(&cluster),
            cluster_dir,
        }
    }
}

/// Paths of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPaths {
    pub cluster_dir: PathBuf,
    pub cluster_ini: PathBuf,
    pub cluster_token: PathBuf,
    pub adminlist: PathBuf,
    pub blocklist: PathBuf,
    pub whitelist: PathBuf,
    pub snapshot_json: PathBuf,
    pub backup_dir: PathBuf,
    /// Per-world UGC mod installs (`<world>/content/322330/<id>`).
    pub ugc_dir: PathBuf,
    /// steamcmd's install dir for this room's downloads.
    pub ugc_download_dir: PathBuf,
}

impl RoomPaths {
    pub fn world(&self, world_name: &str) -> WorldPaths {
        let dir = self.cluster_dir.join(world_name);
        let save_dir = dir.join("save");
        let ugc = self.ugc_dir.join(world_name);
        WorldPaths {
            server_ini: dir.join("server.ini"),
            level_data: dir.join("leveldataoverride.lua"),
            mod_overrides: dir.join("modoverrides.lua"),
            session_dir: save_dir.join("session"),
            shard_index: save_dir.join("shardindex"),
            server_log: dir.join("server_log.txt"),
            chat_log: dir.join("server_chat_log.txt"),
            log_history: dir.join("backup/server_log"),
            chat_history: dir.join("backup/server_chat_log"),
            manifest: ugc.join(format!("appworkshop_{GAME_APP_ID}.acf")),
            ugc_content: ugc.join("content").join(GAME_APP_ID),
            save_dir,
            dir,
        }
    }

    /// Manifest written by steamcmd into the download dir.
    pub fn downloaded_manifest(&self) -> PathBuf {
        self.ugc_download_dir
            .join(format!("steamapps/workshop/appworkshop_{GAME_APP_ID}.acf"))
    }

    /// Content downloaded by steamcmd for one item.
    pub fn downloaded_content(&self, mod_id: u64) -> PathBuf {
        self.ugc_download_dir
            .join("steamapps/workshop/content")
            .join(GAME_APP_ID)
            .join(mod_id.to_string())
    }
}

/// Paths of one world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldPaths {
    pub dir: PathBuf,
    pub server_ini: PathBuf,
    pub level_data: PathBuf,
    pub mod_overrides: PathBuf,
    pub save_dir: PathBuf,
    pub session_dir: PathBuf,
    pub shard_index: PathBuf,
    pub server_log: PathBuf,
    pub chat_log: PathBuf,
    pub log_history: PathBuf,
    pub chat_history: PathBuf,
    pub manifest: PathBuf,
    pub ugc_content: PathBuf,
}
