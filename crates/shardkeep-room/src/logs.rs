//! Server, chat and platform log files.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shardkeep_console::tail_lines;
use shardkeep_session::{CommandRunner, ProcessTable, dir_size};

use crate::fsutil::{self, blocking};
use crate::paths::WorldPaths;
use crate::{GameController, RoomError};

/// Which per-world log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Game,
    Chat,
}

impl FromStr for LogKind {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "game" => Ok(Self::Game),
            "chat" => Ok(Self::Chat),
            other => Err(RoomError::Partial(format!("unknown log type {other:?}"))),
        }
    }
}

impl LogKind {
    fn current(self, world: &WorldPaths) -> PathBuf {
        match self {
            Self::Game => world.server_log.clone(),
            Self::Chat => world.chat_log.clone(),
        }
    }

    fn history(self, world: &WorldPaths) -> PathBuf {
        match self {
            Self::Game => world.log_history.clone(),
            Self::Chat => world.chat_history.clone(),
        }
    }
}

/// Sizes in bytes of every log family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSizes {
    /// Archived server logs of all worlds.
    pub game: u64,
    /// Archived chat logs of all worlds.
    pub chat: u64,
    pub steam: u64,
    pub access: u64,
    pub runtime: u64,
}

/// Which log families [`GameController::clean_logs`] empties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanLogs {
    pub game: bool,
    pub chat: bool,
    pub steam: bool,
    pub access: bool,
    pub runtime: bool,
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    /// The last `lines` lines of a world's current log.
    ///
    /// The chat log is read from the first running world, since only one
    /// world carries chat; when none runs the first world is used.
    pub async fn log_tail(&self, kind: LogKind, world_id: i64, lines: usize) -> Result<Vec<String>, RoomError> {
        let world = match kind {
            LogKind::Game => self.world(world_id)?,
            LogKind::Chat => self.chat_world().await?,
        };
        let path = kind.current(&self.world_paths(world));
        blocking(move || match tail_lines(&path, lines) {
            Ok(lines) => Ok(lines),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(RoomError::io(&path)(e)),
        })
        .await
    }

    async fn chat_world(&self) -> Result<&crate::World, RoomError> {
        for world in &self.worlds {
            if self.platform.sessions.status(&self.world_session(world).name()).await {
                return Ok(world);
            }
        }
        self.first_world()
    }

    /// Archived log files of a world, sorted by name.
    pub async fn history_files(&self, kind: LogKind, world_id: i64) -> Result<Vec<String>, RoomError> {
        let dir = kind.history(&self.world_paths(self.world(world_id)?));
        blocking(move || fsutil::file_names(&dir)).await
    }

    pub async fn history_content(&self, kind: LogKind, world_id: i64, file_name: &str) -> Result<String, RoomError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(RoomError::Partial(format!("invalid log file name {file_name:?}")));
        }
        let path = kind.history(&self.world_paths(self.world(world_id)?)).join(file_name);
        blocking(move || std::fs::read_to_string(&path).map_err(RoomError::io(&path))).await
    }

    pub async fn log_sizes(&self) -> LogSizes {
        let worlds: Vec<WorldPaths> = self.worlds.iter().map(|w| self.world_paths(w)).collect();
        let paths = self.platform.paths.clone();
        tokio::task::spawn_blocking(move || LogSizes {
            game: worlds.iter().map(|w| dir_size(&w.log_history)).sum(),
            chat: worlds.iter().map(|w| dir_size(&w.chat_history)).sum(),
            steam: fsutil::file_size(&paths.steam_log()),
            access: fsutil::file_size(&paths.access_log()),
            runtime: fsutil::file_size(&paths.runtime_log()),
        })
        .await
        .unwrap_or_default()
    }

    /// Deletes archived world logs and truncates platform logs.
    pub async fn clean_logs(&self, which: CleanLogs) -> Result<(), RoomError> {
        let worlds: Vec<WorldPaths> = self.worlds.iter().map(|w| self.world_paths(w)).collect();
        let paths = self.platform.paths.clone();
        blocking(move || {
            for world in &worlds {
                if which.game {
                    fsutil::remove_dir_if_exists(&world.log_history)?;
                }
                if which.chat {
                    fsutil::remove_dir_if_exists(&world.chat_history)?;
                }
            }
            let files = [
                (which.steam, paths.steam_log()),
                (which.access, paths.access_log()),
                (which.runtime, paths.runtime_log()),
            ];
            for (_, path) in files.iter().filter(|(on, path)| *on && path.exists()) {
                std::fs::write(path, "").map_err(RoomError::io(path))?;
            }
            Ok(())
        })
        .await?;
        tracing::info!(room_id = self.room.id, ?which, "logs cleaned");
        Ok(())
    }

    /// Current log files an operator may download. Platform logs are only
    /// listed for administrators.
    pub fn log_files(&self, admin: bool) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .worlds
            .iter()
            .map(|w| self.world_paths(w).server_log)
            .collect();
        if admin {
            files.push(self.platform.paths.access_log());
            files.push(self.platform.paths.runtime_log());
        }
        files
    }
}
