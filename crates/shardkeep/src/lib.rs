//! # Shardkeep
//!
//! Control daemon for dedicated game server clusters.
//!
//! Shardkeep keeps a set of rooms (clusters of worlds) running: it writes
//! their config files, starts and stops their screen sessions, talks to
//! their consoles, and runs the recurring jobs their settings ask for
//! (backups, restarts, keepalive checks, announcements), plus a few global
//! ones (player polls, host metrics, game updates).
//!
//! ```text
//! shardkeepd
//!     │
//!     ▼
//! App ──── JobRegistry ──── timers (one per job name)
//!  │  └─── RoomStore     ── rooms, worlds, settings
//!  ▼
//! GameController (per room) ── sessions, console, codec
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shardkeep::prelude::*;
//!
//! # async fn run() -> Result<(), ShardkeepError> {
//! let config = ControlConfig::from_env()?;
//! let store = Arc::new(JsonFileStore::open(config.state_path()).await?);
//! let sessions = SessionController::new(
//!     Arc::new(BashRunner::new(&config.paths.root)),
//!     Arc::new(SysinfoTable::new()),
//!     config.session.clone(),
//! );
//! let host = SysinfoHost::new(&config.paths.root);
//! let app = App::new(config, sessions, store, host)?;
//! app.start().await?;
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod app;
mod config;
mod error;
mod host;
mod jobs;
mod public_ip;
mod stats;
mod store;
mod version;

pub use app::App;
pub use config::{ControlConfig, DEFAULT_VERSION_URL, IpProvider};
pub use error::{ShardkeepError, outcome};
pub use host::{HostSampler, SysinfoHost};
pub use jobs::{BACKUP_CLEAN_AT, GlobalJob, RoomJob, RoomJobPlan};
pub use public_ip::PublicIp;
pub use stats::{MetricsRing, OnlineTime, PlayerSnapshot, PlayerStatistics, SystemMetrics};
pub use store::{JsonFileStore, MemoryStore, RoomStore, StoreState, UidEntry};
pub use version::{local_version, server_version};

pub use shardkeep_codec as codec;
pub use shardkeep_console as console;
pub use shardkeep_room as room;
pub use shardkeep_scheduler as scheduler;
pub use shardkeep_session as session;

pub mod prelude {
    pub use crate::{
        App, ControlConfig, GlobalJob, HostSampler, JsonFileStore, MemoryStore, RoomJob, RoomStore,
        ShardkeepError, SysinfoHost,
    };
    pub use shardkeep_room::{GameController, GlobalSetting, OperationOutcome, Room, RoomSetting, World};
    pub use shardkeep_scheduler::{Cadence, JobRegistry};
    pub use shardkeep_session::{BashRunner, SessionController, SysinfoTable};
}
