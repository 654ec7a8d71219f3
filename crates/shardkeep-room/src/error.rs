//! Error types for the room layer.

use std::path::PathBuf;

use shardkeep_codec::CodecError;
use shardkeep_console::ConsoleError;
use shardkeep_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room has no world with this id.
    #[error("world {0} not found")]
    WorldNotFound(i64),

    /// The room has no worlds at all.
    #[error("room {0} has no worlds")]
    NoWorlds(i64),

    /// A player list name other than `adminlist`, `blocklist`, `whitelist`.
    #[error("unknown player list {0:?}")]
    UnknownListType(String),

    /// Every world rejected a console line, usually because none is running.
    #[error("no running world accepted the command")]
    NoWorldAccepted,

    /// A backup file name that does not exist or does not decode.
    #[error("invalid backup {0:?}")]
    InvalidBackup(String),

    /// The installed manifest lists more items than it has details for.
    #[error("inconsistent workshop manifest: {0}")]
    ManifestConflict(String),

    /// The mod has no entry in the override table.
    #[error("mod {0} is not enabled")]
    ModNotEnabled(u64),

    /// A mod archive could not be fetched.
    #[error("mod download failed: {0}")]
    Download(String),

    /// Some steps of a multi-world operation failed.
    #[error("{0}")]
    Partial(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RoomError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// `true` when retrying later, or with different input, can succeed.
    ///
    /// Failures of the platform itself (disk, broken files, a shell that
    /// cannot be spawned) are fatal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::WorldNotFound(_)
            | Self::UnknownListType(_)
            | Self::NoWorldAccepted
            | Self::InvalidBackup(_)
            | Self::ModNotEnabled(_)
            | Self::Download(_)
            | Self::Partial(_)
            | Self::Console(_)
            | Self::Http(_) => true,
            Self::Session(e) => matches!(e, SessionError::CommandFailed { .. }),
            Self::NoWorlds(_)
            | Self::ManifestConflict(_)
            | Self::Codec(_)
            | Self::Json(_)
            | Self::Io { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// OperationOutcome
// ---------------------------------------------------------------------------

/// Result of a public operation as seen by an outside caller.
///
/// Callers never see a panic or a raw error type. They get either the
/// value, a message worth showing to an operator who may retry, or a
/// message saying the platform itself is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome<T> {
    Success(T),
    Recoverable(String),
    Fatal(String),
}

impl<T> OperationOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Recoverable(msg) | Self::Fatal(msg) => Some(msg),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationOutcome<U> {
        match self {
            Self::Success(value) => OperationOutcome::Success(f(value)),
            Self::Recoverable(msg) => OperationOutcome::Recoverable(msg),
            Self::Fatal(msg) => OperationOutcome::Fatal(msg),
        }
    }
}

impl<T> From<Result<T, RoomError>> for OperationOutcome<T> {
    fn from(result: Result<T, RoomError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "operation failed");
                Self::Recoverable(e.to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, "operation failed");
                Self::Fatal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let ok: OperationOutcome<u8> = Ok(3).into();
        assert_eq!(ok, OperationOutcome::Success(3));

        let missing: OperationOutcome<u8> = Err(RoomError::WorldNotFound(9)).into();
        assert_eq!(missing, OperationOutcome::Recoverable("world 9 not found".into()));

        let disk: OperationOutcome<u8> = Err(RoomError::Io {
            path: "/x".into(),
            source: std::io::Error::other("full"),
        })
        .into();
        assert!(matches!(disk, OperationOutcome::Fatal(m) if m == "/x: full"));
    }

    #[test]
    fn test_unknown_variant_is_fatal() {
        let err = RoomError::Session(SessionError::UnknownStartVariant("arm".into()));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_outcome_map_and_message() {
        let out: OperationOutcome<u8> = OperationOutcome::Recoverable("later".into());
        assert_eq!(out.message(), Some("later"));
        assert_eq!(out.map(|v| v + 1), OperationOutcome::Recoverable("later".into()));
        assert_eq!(OperationOutcome::Success(1).map(|v| v * 2).success(), Some(2));
    }
}
