//! Error types for the codec layer.
//!
//! Every text format Shardkeep reads or writes (workshop manifests, Lua
//! table literals, backup file names) reports failures through
//! [`CodecError`]. Nothing in this crate touches the filesystem, so a
//! `CodecError` always means "the text was wrong", never "the disk was".

/// Errors that can occur while decoding or encoding a text format.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The workshop manifest could not be read.
    #[error("malformed workshop manifest: {0}")]
    Manifest(String),

    /// A Lua table literal failed to lex or parse.
    ///
    /// `line` is 1-based and points at the token where parsing stopped.
    #[error("lua syntax error at line {line}: {message}")]
    Lua { line: usize, message: String },

    /// A Lua literal parsed, but its shape is not what the caller expected
    /// (e.g. the mod override file returned a string instead of a table).
    #[error("unexpected lua value: {0}")]
    LuaShape(String),

    /// A backup file name did not decode to `game`, `cycles`, `timestamp`.
    #[error("invalid backup name: {0}")]
    BackupName(String),

    /// The requested workshop item is not present in the source manifest.
    #[error("workshop item {0} not found in manifest")]
    MissingItem(String),
}
