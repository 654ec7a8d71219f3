//! Error types for the scheduler.

/// Errors raised while building a cadence.
///
/// These are configuration errors: they are surfaced to whoever supplied
/// the schedule and the job is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The cadence kind is not one of `second`, `minute`, `hour`, `day`.
    #[error("unknown cadence kind: {0}")]
    UnknownCadence(String),

    /// An interval cadence with a zero period.
    #[error("{kind} interval must be at least 1, got {interval}")]
    InvalidInterval { kind: &'static str, interval: u64 },

    /// A daily time that is not `HH:MM:SS` or `HH:MM`.
    #[error("invalid time of day: {0:?}")]
    InvalidTime(String),
}
