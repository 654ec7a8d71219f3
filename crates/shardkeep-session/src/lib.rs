//! Server session management for Shardkeep.
//!
//! Every running world lives in its own detached terminal session named
//! `DMP_Cluster_<room>_<world>`. This crate owns that mapping:
//!
//! 1. **Commands**: the [`CommandRunner`] trait runs shell lines
//!    ([`BashRunner`] in production, a recording fake in tests).
//! 2. **Sessions**: [`SessionController`] starts, stops and probes
//!    sessions by name, never by holding a child handle, so state survives
//!    a restart of the control daemon.
//! 3. **Sampling**: the [`ProcessTable`] trait turns a PID into CPU and
//!    memory figures ([`SysinfoTable`] in production).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room controller (above)  ← decides which worlds run
//!     ↕
//! Session layer (this crate)  ← screen sessions, ps lookups, sampling
//!     ↕
//! Operating system (below)  ← bash, screen, the game binary
//! ```

#![allow(async_fn_in_trait)]

mod controller;
mod error;
mod naming;
mod probe;
mod runner;

pub use controller::{PerformanceSample, SessionConfig, SessionController, StartOutcome, WorldSession};
pub use error::SessionError;
pub use naming::{SessionName, StartVariant, cluster_dir_name, session_prefix};
pub use probe::{ProcessSample, ProcessTable, SysinfoTable, dir_size};
pub use runner::{BashRunner, CommandOutput, CommandRunner};
