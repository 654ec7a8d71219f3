//! Rollback snapshots kept by the game inside each world's session.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use shardkeep_session::{CommandRunner, ProcessTable};

use crate::fsutil::{self, blocking};
use crate::{GameController, RoomError};

static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"session_id="(.+)","#).expect("valid regex"));

/// One snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
}

/// Extracts the session id from a `shardindex` file body.
pub fn session_id(shard_index: &str) -> Option<String> {
    SESSION_ID
        .captures(shard_index)
        .map(|caps| caps[1].to_owned())
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    /// Snapshots of the first world. `.meta` companions are not listed.
    pub async fn snapshots(&self) -> Result<Vec<SnapshotFile>, RoomError> {
        let world = self.world_paths(self.first_world()?);
        blocking(move || {
            let Some(id) = fsutil::read_optional(&world.shard_index)?.and_then(|t| session_id(&t))
            else {
                return Ok(Vec::new());
            };
            let dir = world.session_dir.join(id);
            let mut files = Vec::new();
            for name in fsutil::file_names(&dir)? {
                if name.to_ascii_lowercase().ends_with(".meta") {
                    continue;
                }
                let path = dir.join(&name);
                let Some(modified) = fsutil::modified(&path) else {
                    continue;
                };
                files.push(SnapshotFile {
                    size: fsutil::file_size(&path),
                    mod_time: modified.into(),
                    name,
                });
            }
            Ok(files)
        })
        .await
    }

    /// Deletes a snapshot and its `.meta` in every world.
    ///
    /// Worlds whose session cannot be found are skipped; the call fails
    /// when no world had the snapshot.
    pub async fn delete_snapshot(&self, name: &str) -> Result<(), RoomError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(RoomError::Partial(format!("invalid snapshot name {name:?}")));
        }
        let worlds: Vec<_> = self.worlds.iter().map(|w| self.world_paths(w)).collect();
        let name = name.to_owned();
        let room_id = self.room.id;
        blocking(move || {
            let mut deleted = 0;
            for world in &worlds {
                let Some(id) = fsutil::read_optional(&world.shard_index)?.and_then(|t| session_id(&t))
                else {
                    continue;
                };
                let dir = world.session_dir.join(id);
                let file = dir.join(&name);
                if !file.exists() {
                    continue;
                }
                fsutil::remove_file_if_exists(&file)?;
                fsutil::remove_file_if_exists(&dir.join(format!("{name}.meta")))?;
                deleted += 1;
            }
            tracing::info!(room_id, snapshot = %name, worlds = deleted, "snapshot deleted");
            if deleted == 0 {
                Err(RoomError::Partial(format!("snapshot {name} not found")))
            } else {
                Ok(())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_from_shard_index() {
        let text = r#"return { id="1", session_id="A1B2C3D4E5", enabled_mods={} }"#;
        assert_eq!(session_id(text).as_deref(), Some("A1B2C3D4E5"));
        assert_eq!(session_id("return {}"), None);
    }
}
