//! Starting, stopping and talking to a room's worlds.

use shardkeep_codec::ModOverrideCollection;
use shardkeep_session::{
    CommandRunner, PerformanceSample, ProcessTable, SessionName, StartOutcome, StartVariant,
};

use crate::fsutil::{self, blocking};
use crate::locks::Concern;
use crate::{GameController, RoomError};

const REGENERATE: &str = "c_regenerateworld()";

/// Removes both quote characters so text fits inside a single-quoted Lua
/// string.
fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\'' | '"')).collect()
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    fn start_variant(&self) -> Result<StartVariant, RoomError> {
        Ok(self.setting.start_variant()?)
    }

    /// Starts one world unless it is already running.
    pub async fn start_world(&self, world_id: i64) -> Result<StartOutcome, RoomError> {
        let variant = self.start_variant()?;
        let world = self.world(world_id)?;
        self.write_mod_setup().await?;

        let outcome = self
            .platform
            .sessions
            .start(&self.world_session(world), variant)
            .await?;
        self.clear_download_dir().await;
        Ok(outcome)
    }

    /// Starts every world that is not running, in order. The first launch
    /// failure stops the sequence.
    pub async fn start_all(&self) -> Result<usize, RoomError> {
        let variant = self.start_variant()?;
        self.write_mod_setup().await?;

        let mut spawned = 0;
        for world in &self.worlds {
            let outcome = self
                .platform
                .sessions
                .start(&self.world_session(world), variant)
                .await?;
            if outcome == StartOutcome::Spawned {
                spawned += 1;
            }
        }
        self.clear_download_dir().await;
        tracing::info!(room_id = self.room.id, spawned, "room started");
        Ok(spawned)
    }

    pub async fn stop_world(&self, world_id: i64) -> Result<(), RoomError> {
        let world = self.world(world_id)?;
        self.platform.sessions.stop(&self.world_session(world).name()).await;
        Ok(())
    }

    /// Stops every world, one after the other.
    pub async fn stop_all(&self) {
        for world in &self.worlds {
            self.platform.sessions.stop(&self.world_session(world).name()).await;
        }
        tracing::info!(room_id = self.room.id, "room stopped");
    }

    pub async fn world_status(&self, world_id: i64) -> Result<bool, RoomError> {
        let world = self.world(world_id)?;
        Ok(self.platform.sessions.status(&self.world_session(world).name()).await)
    }

    pub async fn performance(&self, world_id: i64) -> Result<PerformanceSample, RoomError> {
        let world = self.world(world_id)?;
        Ok(self.platform.sessions.performance_sample(&self.world_session(world)).await)
    }

    /// Session names of this room's running worlds.
    pub async fn running_sessions(&self) -> Vec<SessionName> {
        self.platform.sessions.running_sessions(self.room.id).await
    }

    /// Regenerates the world.
    ///
    /// A soft reset asks the first world to regenerate itself. A forced
    /// reset stops everything, deletes every save directory and starts
    /// again; the start runs even when a save could not be removed.
    pub async fn reset(&self, force: bool) -> Result<(), RoomError> {
        if !force {
            let world = self.first_world()?;
            self.platform
                .sessions
                .send_line(&self.world_session(world).name(), REGENERATE)
                .await?;
            return Ok(());
        }

        self.stop_all().await;
        let saves: Vec<_> = self.worlds.iter().map(|w| self.world_paths(w).save_dir).collect();
        let removed = blocking(move || {
            let mut failed = 0;
            for save in &saves {
                if let Err(e) = fsutil::remove_dir_if_exists(save) {
                    tracing::error!(error = %e, "save directory not removed");
                    failed += 1;
                }
            }
            Ok(failed)
        })
        .await;
        let started = self.start_all().await;

        match removed? {
            0 => started.map(|_| ()),
            failed => Err(RoomError::Partial(format!("{failed} save directories not removed"))),
        }
    }

    /// Shows an in-game announcement.
    pub async fn announce(&self, message: &str) -> Result<(), RoomError> {
        self.broadcast(&format!("c_announce('{}')", strip_quotes(message))).await
    }

    /// Posts a system message to the chat.
    pub async fn system_message(&self, message: &str) -> Result<(), RoomError> {
        self.broadcast(&format!("TheNet:SystemMessage('{}')", strip_quotes(message)))
            .await
    }

    /// Sends a line to the worlds in order until one accepts it.
    async fn broadcast(&self, line: &str) -> Result<(), RoomError> {
        for world in &self.worlds {
            let name = self.world_session(world).name();
            match self.platform.sessions.send_line(&name, line).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!(session = %name, error = %e, "world did not accept line"),
            }
        }
        Err(RoomError::NoWorldAccepted)
    }

    /// Runs a raw console command on one world. Double quotes become
    /// single quotes.
    pub async fn console_command(&self, world_id: i64, command: &str) -> Result<(), RoomError> {
        let world = self.world(world_id)?;
        let line = command.replace('"', "'");
        self.platform
            .sessions
            .send_line(&self.world_session(world).name(), &line)
            .await?;
        Ok(())
    }

    /// Stops a world and deletes its saves.
    pub async fn delete_world(&self, world_id: i64) -> Result<(), RoomError> {
        let world = self.world(world_id)?;
        self.platform.sessions.stop(&self.world_session(world).name()).await;
        let save = self.world_paths(world).save_dir;
        blocking(move || fsutil::remove_dir_if_exists(&save)).await?;
        tracing::info!(room_id = self.room.id, world = %world.world_name, "world saves deleted");
        Ok(())
    }

    /// Stops every world and deletes the cluster, its UGC mods and its
    /// backups.
    pub async fn delete_room(&self) -> Result<(), RoomError> {
        self.stop_all().await;
        let paths = self.paths.clone();
        blocking(move || {
            fsutil::remove_dir_if_exists(&paths.cluster_dir)?;
            fsutil::remove_dir_if_exists(&paths.ugc_dir)?;
            fsutil::remove_dir_if_exists(&paths.backup_dir)
        })
        .await?;
        self.platform.locks.forget_room(self.room.id);
        tracing::info!(room_id = self.room.id, "room deleted");
        Ok(())
    }

    /// Writes the server mod setup file with one `ServerModSetup` line per
    /// workshop mod the room runs. No mods writes an empty file.
    pub async fn write_mod_setup(&self) -> Result<(), RoomError> {
        let text = if self.room.mod_in_one {
            self.room.mod_data.as_str()
        } else {
            self.worlds.first().map(|w| w.mod_data.as_str()).unwrap_or_default()
        };
        let mods = ModOverrideCollection::parse(text)?;
        let setup: String = mods
            .mods
            .keys()
            .filter_map(|key| key.strip_prefix("workshop-"))
            .map(|id| format!("ServerModSetup(\"{id}\")\n"))
            .collect();

        let path = self.platform.paths.mod_setup_file();
        blocking(move || fsutil::write_file(&path, &setup)).await
    }

    /// Removes this room's temporary mod downloads once a world has
    /// started with them.
    async fn clear_download_dir(&self) {
        let _guard = self.platform.locks.lock(self.room.id, Concern::Manifest).await;
        let dir = self.paths.ugc_download_dir.clone();
        if let Err(e) = blocking(move || fsutil::remove_dir_if_exists(&dir)).await {
            tracing::warn!(room_id = self.room.id, error = %e, "temporary mod downloads not removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes(r#"it's "fine""#), "its fine");
    }
}
