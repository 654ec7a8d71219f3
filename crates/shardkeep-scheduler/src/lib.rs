//! Named recurring jobs for Shardkeep.
//!
//! The registry holds one timer task per job name. Jobs can be added,
//! replaced and removed while the daemon runs; nothing here is persisted,
//! so the full set is rebuilt from settings at startup.
//!
//! # Job names
//!
//! ```text
//! 42-0-Backup        room 42, backup slot 0
//! 42-Restart         room 42, daily restart
//! 42-9f1c...-Announce room 42, one announcement (id with '-' removed)
//! onlinePlayerGet    global job
//! ```
//!
//! # Cadences
//!
//! - [`Cadence::Every`]: fixed period, first fire immediately, missed ticks
//!   skipped.
//! - [`Cadence::DailyAt`]: once a day at a local `HH:MM:SS`.

#![allow(async_fn_in_trait)]

mod cadence;
mod error;
mod job;
mod registry;

pub use cadence::{Cadence, IntervalUnit, parse_time_of_day, until_next};
pub use error::SchedulerError;
pub use job::{FnJob, Job};
pub use registry::{JobInfo, JobRegistry};
