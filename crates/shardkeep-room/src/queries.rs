//! Console queries against running worlds.

use shardkeep_console::{Coordinate, Landmark, OnlinePlayer, PlayerPosition, PrefabCount};
use shardkeep_session::{CommandRunner, ProcessTable};

use crate::{GameController, RoomError};

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    /// Players connected to the room.
    ///
    /// Every shard shares one client table, so the first running world
    /// that answers is enough. `None` when no world answered.
    pub async fn online_players(&self) -> Option<Vec<OnlinePlayer>> {
        for world in &self.worlds {
            if !self.platform.sessions.status(&self.world_session(world).name()).await {
                continue;
            }
            let console = match self.console(world.id) {
                Ok(console) => console,
                Err(e) => {
                    tracing::debug!(world = %world.world_name, error = %e, "no console");
                    continue;
                }
            };
            match console.online_players().await {
                Ok(players) => return Some(players),
                Err(e) => tracing::debug!(world = %world.world_name, error = %e, "player list scrape missed"),
            }
        }
        None
    }

    /// Clock time of the newest line in a world's log, after a keepalive
    /// print.
    pub async fn last_alive(&self, world_id: i64) -> Result<String, RoomError> {
        Ok(self.console(world_id)?.last_alive().await?)
    }

    /// Stores the last observed keepalive time of a world.
    pub fn set_last_alive(&mut self, world_id: i64, time: String) -> Result<(), RoomError> {
        let world = self
            .worlds
            .iter_mut()
            .find(|w| w.id == world_id)
            .ok_or(RoomError::WorldNotFound(world_id))?;
        world.last_alive_time = time;
        Ok(())
    }

    pub async fn coordinate(&self, world_id: i64, prefab: &str) -> Result<Coordinate, RoomError> {
        Ok(self.console(world_id)?.coordinate_of(prefab).await?)
    }

    pub async fn landmarks(&self, world_id: i64) -> Result<Vec<Landmark>, RoomError> {
        Ok(self.console(world_id)?.landmarks().await)
    }

    pub async fn count_prefabs(&self, world_id: i64) -> Result<Vec<PrefabCount>, RoomError> {
        Ok(self.console(world_id)?.count_prefabs().await?)
    }

    /// Positions of every connected player in one world.
    pub async fn player_positions(&self, world_id: i64) -> Result<Vec<PlayerPosition>, RoomError> {
        let console = self.console(world_id)?;
        let players = console.online_players().await?;
        Ok(console.player_positions(&players).await)
    }
}
