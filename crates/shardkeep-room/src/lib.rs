//! Room control for Shardkeep.
//!
//! A room is one game cluster made of one or more worlds (shards). This
//! crate turns a room's stored records into files on disk and running
//! sessions, and answers questions about them.
//!
//! # Key types
//!
//! - [`GameController`]: one room's records bound to the shared
//!   [`Platform`]. Every room operation is a method on it.
//! - [`PlatformPaths`] / [`RoomPaths`] / [`WorldPaths`]: where things live.
//! - [`LockRegistry`]: per-room locks, one per file [`Concern`].
//! - [`OperationOutcome`]: what an outside caller gets back.
//!
//! # How it fits in the stack
//!
//! ```text
//! Jobs and daemon (above)  ← build a controller per room, persist edits
//!     ↕
//! Room layer (this crate)  ← config files, lifecycle, backups, mods, logs
//!     ↕
//! Session / console / codec (below)  ← screen sessions, log scraping, formats
//! ```

#![allow(async_fn_in_trait)]

mod backup;
mod config_files;
mod controller;
mod error;
mod fsutil;
mod lifecycle;
mod locks;
mod logs;
mod model;
mod mods;
mod paths;
mod players;
mod queries;
mod session_info;
mod snapshot;

pub use backup::BackupFile;
pub use config_files::{cluster_game_mode, cluster_ini, generate_cluster_key, server_ini};
pub use controller::{GameController, Platform};
pub use error::{OperationOutcome, RoomError};
pub use locks::{Concern, DownloadGuard, DownloadTracker, LockRegistry};
pub use logs::{CleanLogs, LogKind, LogSizes};
pub use model::{
    Announcement, BackupSlot, GlobalSetting, Room, RoomSetting, RoomSnapshot, StartStopTimes, World,
};
pub use mods::DownloadedMod;
pub use paths::{PlatformPaths, RoomPaths, WorldPaths};
pub use players::PlayerListKind;
pub use session_info::{SeasonLength, SessionInfo, latest_meta_file};
pub use snapshot::{SnapshotFile, session_id};
