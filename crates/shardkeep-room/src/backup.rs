//! Cluster backups: zip archives named after the game, day and time.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use shardkeep_codec::BackupName;
use shardkeep_session::{CommandRunner, ProcessTable};

use crate::fsutil::{self, blocking};
use crate::{GameController, RoomError, RoomSnapshot};

/// A backup archive on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub game_name: String,
    pub cycles: String,
    pub timestamp: i64,
    pub size: u64,
    pub file_name: String,
}

/// `true` for names that stay inside the backup directory.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

fn quote(path: &std::path::Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room: self.room.clone(),
            worlds: self.worlds.clone(),
            room_setting: self.setting.clone(),
        }
    }

    /// Archives the cluster directory, `dmp.json` included.
    pub async fn backup(&self) -> Result<BackupName, RoomError> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        let paths = self.paths.clone();
        blocking(move || {
            fsutil::write_file(&paths.snapshot_json, &json)?;
            fsutil::ensure_dir(&paths.backup_dir)
        })
        .await?;

        let cycles = self.session_info().await.cycles;
        let name = BackupName::new(
            self.room.game_name.clone(),
            cycles.to_string(),
            chrono::Utc::now().timestamp_millis(),
        );
        let target = self.paths.backup_dir.join(name.file_name());
        let cluster = shardkeep_session::cluster_dir_name(self.room.id);
        let command = format!(
            "cd {} && zip -q -r {} {cluster}",
            quote(&self.platform.paths.cluster_root()),
            quote(&target)
        );
        self.platform.sessions.runner().run(&command).await?.check(&command)?;
        tracing::info!(room_id = self.room.id, file = %name.file_name(), "backup created");
        Ok(name)
    }

    /// Replaces the cluster with the contents of a backup.
    ///
    /// All worlds are stopped first. Returns the records stored in the
    /// archive so the caller can restore them too.
    pub async fn restore(&self, file_name: &str) -> Result<RoomSnapshot, RoomError> {
        let archive = self.paths.backup_dir.join(file_name);
        if !is_plain_name(file_name) || !archive.is_file() {
            return Err(RoomError::InvalidBackup(file_name.to_owned()));
        }
        let runner = self.platform.sessions.runner();
        let cluster = shardkeep_session::cluster_dir_name(self.room.id);
        let extracted = self.paths.backup_dir.join(&cluster);

        let unzip = format!(
            "unzip -q -o {} -d {}",
            quote(&archive),
            quote(&self.paths.backup_dir)
        );
        runner.run(&unzip).await?.check(&unzip)?;

        let json_path = extracted.join("dmp.json");
        let json = blocking(move || fsutil::read_optional(&json_path)).await?;
        let snapshot: RoomSnapshot = match json {
            Some(text) => serde_json::from_str(&text)?,
            None => {
                let dir = extracted.clone();
                blocking(move || fsutil::remove_dir_if_exists(&dir)).await?;
                return Err(RoomError::InvalidBackup(file_name.to_owned()));
            }
        };

        self.stop_all().await;
        let replace = format!(
            "rm -rf {} && cp -r {} {}",
            quote(&self.paths.cluster_dir),
            quote(&extracted),
            quote(&self.platform.paths.cluster_root())
        );
        runner.run(&replace).await?.check(&replace)?;
        blocking(move || fsutil::remove_dir_if_exists(&extracted)).await?;

        tracing::info!(room_id = self.room.id, file = %file_name, "backup restored");
        Ok(snapshot)
    }

    /// Decodable backups, oldest first. Undecodable names are skipped.
    pub async fn backups(&self) -> Result<Vec<BackupFile>, RoomError> {
        let dir = self.paths.backup_dir.clone();
        blocking(move || {
            let mut files: Vec<BackupFile> = fsutil::file_names(&dir)?
                .into_iter()
                .filter_map(|file_name| {
                    let name = match BackupName::decode(&file_name) {
                        Ok(name) => name,
                        Err(e) => {
                            tracing::debug!(error = %e, "backup listing skipped a file");
                            return None;
                        }
                    };
                    Some(BackupFile {
                        size: fsutil::file_size(&dir.join(&file_name)),
                        game_name: name.game_name,
                        cycles: name.cycles,
                        timestamp: name.timestamp_ms,
                        file_name,
                    })
                })
                .collect();
            files.sort_by_key(|f| f.timestamp);
            Ok(files)
        })
        .await
    }

    /// Deletes backups by file name. Returns how many names were handled;
    /// a failed removal is logged and still counted.
    pub async fn delete_backups(&self, file_names: &[String]) -> usize {
        let dir = self.paths.backup_dir.clone();
        let names = file_names.to_vec();
        blocking(move || {
            let mut handled = 0;
            for name in &names {
                if !is_plain_name(name) {
                    tracing::warn!(file = %name, "backup name rejected");
                    continue;
                }
                if let Err(e) = fsutil::remove_file_if_exists(&dir.join(name)) {
                    tracing::error!(file = %name, error = %e, "backup not deleted");
                }
                handled += 1;
            }
            Ok(handled)
        })
        .await
        .unwrap_or_default()
    }

    /// Deletes backups last modified more than `days` days ago.
    pub async fn clean_backups(&self, days: u32) -> Result<usize, RoomError> {
        let dir = self.paths.backup_dir.clone();
        let max_age = Duration::from_secs(u64::from(days) * 86_400);
        let removed = blocking(move || {
            let now = SystemTime::now();
            let mut removed = 0;
            for name in fsutil::file_names(&dir)? {
                let path = dir.join(&name);
                let old = fsutil::modified(&path)
                    .and_then(|t| now.duration_since(t).ok())
                    .is_some_and(|age| age > max_age);
                if old {
                    fsutil::remove_file_if_exists(&path)?;
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await?;
        tracing::info!(room_id = self.room.id, removed, days, "old backups cleaned");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("TXlTZXJ2ZXI.zip"));
        assert!(!is_plain_name("../secrets.zip"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name(""));
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote(std::path::Path::new("/a b/it's")), r"'/a b/it'\''s'");
    }
}
