//! Unified error type for the Shardkeep daemon.

use std::path::PathBuf;

use shardkeep_codec::CodecError;
use shardkeep_console::ConsoleError;
use shardkeep_room::{OperationOutcome, RoomError};
use shardkeep_scheduler::SchedulerError;
use shardkeep_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert layer errors
/// without ceremony.
#[derive(Debug, thiserror::Error)]
pub enum ShardkeepError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    /// A job could not be registered: unknown cadence or malformed time.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// The store has no room with this id.
    #[error("room {0} not found")]
    RoomNotFound(i64),

    /// A settings field holds JSON that does not decode.
    #[error("invalid setting {field}: {source}")]
    Setting {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The daemon configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Every public-IP provider failed.
    #[error("public ip unavailable: {0}")]
    PublicIp(String),
}

impl ShardkeepError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// `true` when the caller can fix the input or retry later.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Room(e) => e.is_recoverable(),
            Self::Session(e) => matches!(e, SessionError::CommandFailed { .. }),
            Self::Console(_)
            | Self::Scheduler(_)
            | Self::RoomNotFound(_)
            | Self::Setting { .. }
            | Self::Http(_)
            | Self::PublicIp(_) => true,
            Self::Codec(_) | Self::Config(_) | Self::Io { .. } | Self::Json(_) => false,
        }
    }
}

/// Converts a daemon result into what an outside caller sees.
pub fn outcome<T>(result: Result<T, ShardkeepError>) -> OperationOutcome<T> {
    match result {
        Ok(value) => OperationOutcome::Success(value),
        // Room errors carry their own classification and logging.
        Err(ShardkeepError::Room(e)) => OperationOutcome::from(Err::<T, RoomError>(e)),
        Err(e) if e.is_recoverable() => {
            tracing::warn!(error = %e, "operation failed");
            OperationOutcome::Recoverable(e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "operation failed");
            OperationOutcome::Fatal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_room_error() {
        let err: ShardkeepError = RoomError::WorldNotFound(3).into();
        assert!(matches!(err, ShardkeepError::Room(_)));
        assert!(err.to_string().contains("world 3"));
    }

    #[test]
    fn test_from_scheduler_error() {
        let err: ShardkeepError = SchedulerError::UnknownCadence("week".into()).into();
        assert!(matches!(err, ShardkeepError::Scheduler(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_outcome_keeps_room_classification() {
        let fatal = outcome::<()>(Err(RoomError::NoWorlds(1).into()));
        assert!(matches!(fatal, OperationOutcome::Fatal(_)));

        let retry = outcome::<()>(Err(ShardkeepError::RoomNotFound(9)));
        assert_eq!(retry, OperationOutcome::Recoverable("room 9 not found".into()));

        assert_eq!(outcome(Ok(5)), OperationOutcome::Success(5));
    }
}
