//! Error types for the session layer.

/// Errors that can occur while driving server sessions.
///
/// Note what is *not* here: "the session is not running". A stop against
/// a dead session, or a process lookup that finds nothing, is normal state
/// and is reported through return values, never through this enum.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The room asks for a binary variant we do not know how to launch.
    #[error("unknown start variant {0:?} (expected 32-bit, 64-bit or luajit)")]
    UnknownStartVariant(String),

    /// The shell could not be spawned at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}
