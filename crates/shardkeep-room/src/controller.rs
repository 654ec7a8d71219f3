//! The game controller: one room's configuration bound to the platform.
//!
//! A controller is cheap to build and holds no live state of its own. The
//! caller loads the room, its worlds and its settings from the store,
//! builds a controller, runs one or more operations and, when an operation
//! edits the records (mod changes, a generated cluster key), writes them
//! back from [`GameController::room`] and [`GameController::worlds`].
//!
//! Operations are spread over several modules by concern; this one holds
//! the shared context and the config file writer.

use std::sync::Arc;
use std::time::Duration;

use shardkeep_console::{ConsoleProtocol, ProtocolTiming, ScreenTransport};
use shardkeep_session::{CommandRunner, ProcessTable, SessionController, WorldSession};

use crate::config_files::{cluster_ini, generate_cluster_key, server_ini};
use crate::fsutil::{self, blocking};
use crate::locks::{Concern, DownloadTracker, LockRegistry};
use crate::paths::{PlatformPaths, RoomPaths, WorldPaths};
use crate::{Room, RoomError, RoomSetting, World};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Everything a controller shares with every other controller.
pub struct Platform<R, P> {
    pub sessions: SessionController<R, P>,
    pub paths: Arc<PlatformPaths>,
    pub locks: Arc<LockRegistry>,
    pub downloads: Arc<DownloadTracker>,
    pub http: reqwest::Client,
    pub console: ProtocolTiming,
}

impl<R, P> Clone for Platform<R, P> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            paths: Arc::clone(&self.paths),
            locks: Arc::clone(&self.locks),
            downloads: Arc::clone(&self.downloads),
            http: self.http.clone(),
            console: self.console.clone(),
        }
    }
}

impl<R: CommandRunner, P: ProcessTable> Platform<R, P> {
    /// Builds the shared context. `http_timeout` bounds every outbound
    /// request made through [`Platform::http`].
    pub fn new(
        sessions: SessionController<R, P>,
        paths: PlatformPaths,
        console: ProtocolTiming,
        http_timeout: Duration,
    ) -> Result<Self, RoomError> {
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            sessions,
            paths: Arc::new(paths),
            locks: Arc::new(LockRegistry::new()),
            downloads: Arc::new(DownloadTracker::new()),
            http,
            console,
        })
    }
}

// ---------------------------------------------------------------------------
// GameController
// ---------------------------------------------------------------------------

/// Operations on one room.
pub struct GameController<R, P> {
    pub(crate) platform: Platform<R, P>,
    pub(crate) room: Room,
    pub(crate) worlds: Vec<World>,
    pub(crate) setting: RoomSetting,
    pub(crate) lang: String,
    pub(crate) paths: RoomPaths,
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    pub fn new(
        platform: Platform<R, P>,
        room: Room,
        worlds: Vec<World>,
        setting: RoomSetting,
        lang: impl Into<String>,
    ) -> Self {
        let paths = platform.paths.room(room.id);
        Self {
            platform,
            room,
            worlds,
            setting,
            lang: lang.into(),
            paths,
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    pub fn setting(&self) -> &RoomSetting {
        &self.setting
    }

    pub fn paths(&self) -> &RoomPaths {
        &self.paths
    }

    pub fn platform(&self) -> &Platform<R, P> {
        &self.platform
    }

    /// Gives the edited records back to the caller for persisting.
    pub fn into_parts(self) -> (Room, Vec<World>, RoomSetting) {
        (self.room, self.worlds, self.setting)
    }

    // -- world lookup -------------------------------------------------------

    pub fn world(&self, world_id: i64) -> Result<&World, RoomError> {
        self.worlds
            .iter()
            .find(|w| w.id == world_id)
            .ok_or(RoomError::WorldNotFound(world_id))
    }

    pub(crate) fn first_world(&self) -> Result<&World, RoomError> {
        self.worlds.first().ok_or(RoomError::NoWorlds(self.room.id))
    }

    pub fn world_paths(&self, world: &World) -> WorldPaths {
        self.paths.world(&world.world_name)
    }

    pub fn world_session(&self, world: &World) -> WorldSession {
        WorldSession {
            room_id: self.room.id,
            world_name: world.world_name.clone(),
            world_dir: self.world_paths(world).dir,
        }
    }

    /// Console queries against one world.
    pub fn console(&self, world_id: i64) -> Result<ConsoleProtocol<ScreenTransport<R, P>>, RoomError> {
        let world = self.world(world_id)?;
        let transport = ScreenTransport::new(
            self.platform.sessions.clone(),
            self.world_session(world).name(),
            self.world_paths(world).server_log,
        );
        Ok(ConsoleProtocol::new(transport, self.platform.console.clone()))
    }

    // -- config files -------------------------------------------------------

    /// Writes every config file of the room and removes worlds that no
    /// longer belong to it.
    ///
    /// An empty cluster key is replaced by a generated one first; read it
    /// back from [`room`](Self::room) to persist it.
    pub async fn save_all(&mut self) -> Result<(), RoomError> {
        if self.room.cluster_key.is_empty() {
            self.room.cluster_key = generate_cluster_key();
            tracing::info!(room_id = self.room.id, "cluster key generated");
        }
        self.write_room_files().await?;
        self.write_world_files().await
    }

    /// `cluster.ini`, the cluster token and the backup directory.
    pub(crate) async fn write_room_files(&self) -> Result<(), RoomError> {
        let _guard = self.platform.locks.lock(self.room.id, Concern::RoomConfig).await;
        let whitelist = crate::players::read_list(&self.paths.whitelist)?;
        let ini = cluster_ini(&self.room, &self.setting, whitelist.len(), &self.lang).to_string();
        let token = self.room.token.clone();
        let paths = self.paths.clone();

        blocking(move || {
            fsutil::ensure_dir(&paths.cluster_dir)?;
            fsutil::write_file(&paths.cluster_ini, &ini)?;
            fsutil::write_file(&paths.cluster_token, &token)?;
            fsutil::ensure_dir(&paths.backup_dir)
        })
        .await?;
        tracing::debug!(room_id = self.room.id, "cluster files written");
        Ok(())
    }

    /// Per-world `server.ini`, level data and mod overrides, then removal
    /// of world directories (and sessions) not in the room any more.
    pub(crate) async fn write_world_files(&self) -> Result<(), RoomError> {
        let _guard = self.platform.locks.lock(self.room.id, Concern::RoomConfig).await;

        let files: Vec<(WorldPaths, String, String, String)> = self
            .worlds
            .iter()
            .map(|w| {
                (
                    self.world_paths(w),
                    server_ini(w).to_string(),
                    w.level_data.clone(),
                    self.mod_overrides_text(w).to_owned(),
                )
            })
            .collect();
        let cluster_dir = self.paths.cluster_dir.clone();
        let keep: Vec<String> = self.worlds.iter().map(|w| w.world_name.clone()).collect();

        let stale = blocking(move || {
            for (paths, server, level, mods) in &files {
                fsutil::ensure_dir(&paths.dir)?;
                fsutil::write_file(&paths.server_ini, server)?;
                fsutil::write_file(&paths.level_data, level)?;
                fsutil::write_file(&paths.mod_overrides, mods)?;
            }
            let mut stale = Vec::new();
            for name in fsutil::dir_names(&cluster_dir)? {
                if keep.contains(&name) {
                    continue;
                }
                if let Err(e) = fsutil::remove_dir_if_exists(&cluster_dir.join(&name)) {
                    tracing::warn!(world = %name, error = %e, "stale world directory not removed");
                }
                stale.push(name);
            }
            Ok(stale)
        })
        .await?;

        for name in stale {
            let session = shardkeep_session::SessionName::new(self.room.id, &name);
            if let Err(e) = self.platform.sessions.quit(&session).await {
                tracing::debug!(session = %session, error = %e, "stale world session not running");
            }
            tracing::info!(room_id = self.room.id, world = %name, "stale world removed");
        }
        Ok(())
    }

    /// The override text a world runs with.
    pub(crate) fn mod_overrides_text<'a>(&'a self, world: &'a World) -> &'a str {
        if self.room.mod_in_one {
            &self.room.mod_data
        } else {
            &world.mod_data
        }
    }
}
