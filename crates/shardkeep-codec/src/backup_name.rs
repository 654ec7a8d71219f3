//! Reversible backup archive names.
//!
//! A backup file name carries the game name, the in-game day count and the
//! creation time, so listing backups never has to open the archives:
//!
//! ```text
//! base64url("<game>\x10<cycles>\x10<unix millis>") + ".zip"
//! ```
//!
//! The URL-safe alphabet without padding keeps the name valid on every
//! filesystem and free of `.` inside the encoded part.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

const SEPARATOR: char = '\x10';
const EXTENSION: &str = ".zip";

/// Metadata encoded in a backup archive's file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupName {
    pub game_name: String,
    /// In-game day count at backup time. Kept as text since the game
    /// reports `-1` when the session could not be read.
    pub cycles: String,
    pub timestamp_ms: i64,
}

impl BackupName {
    pub fn new(game_name: impl Into<String>, cycles: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            game_name: game_name.into(),
            cycles: cycles.into(),
            timestamp_ms,
        }
    }

    /// Encodes to a file name, extension included.
    pub fn file_name(&self) -> String {
        let raw = format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.game_name, self.cycles, self.timestamp_ms
        );
        format!("{}{EXTENSION}", URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decodes a file name produced by [`file_name`](Self::file_name).
    pub fn decode(file_name: &str) -> Result<Self, CodecError> {
        let invalid = |why: &str| CodecError::BackupName(format!("{file_name}: {why}"));

        let encoded = file_name
            .strip_suffix(EXTENSION)
            .ok_or_else(|| invalid("missing .zip extension"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| invalid(&e.to_string()))?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid("not utf-8"))?;

        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        let [game_name, cycles, timestamp] = parts.as_slice() else {
            return Err(invalid("expected three fields"));
        };
        let timestamp_ms = timestamp
            .parse::<i64>()
            .map_err(|_| invalid("timestamp is not an integer"))?;

        Ok(Self::new(*game_name, *cycles, timestamp_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_has_zip_extension() {
        let name = BackupName::new("MyServer", "7", 1_700_000_000_000).file_name();
        assert!(name.ends_with(".zip"));
        assert!(!name.trim_end_matches(".zip").contains('.'));
    }

    #[test]
    fn test_decode_rejects_foreign_files() {
        assert!(BackupName::decode("notes.txt").is_err());
        assert!(BackupName::decode("!!!.zip").is_err());
        // Valid base64 of "a\x10b" has only two fields.
        let two = format!("{}.zip", URL_SAFE_NO_PAD.encode("a\x10b"));
        assert!(BackupName::decode(&two).is_err());
    }

    #[test]
    fn test_decode_rejects_non_numeric_timestamp() {
        let bad = format!("{}.zip", URL_SAFE_NO_PAD.encode("a\x10b\x10c"));
        assert!(matches!(BackupName::decode(&bad), Err(CodecError::BackupName(_))));
    }
}
