//! Error types for the console layer.

use std::path::PathBuf;

use shardkeep_session::SessionError;

/// Why a console query produced no result.
///
/// Every variant means "no answer for this one query". Batch queries
/// (prefab census, player positions) log these and move on.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// The command could not be typed into the session, usually because
    /// the world is not running.
    #[error("command injection failed: {0}")]
    Inject(#[from] SessionError),

    /// The server log could not be read.
    #[error("cannot read log {path}: {source}")]
    LogUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log was read, but the expected output was not in the window.
    #[error("no result in log: {0}")]
    NoResult(String),
}
