//! Where rooms, worlds and settings live between runs.
//!
//! The daemon only needs a handful of reads and writes, so storage is a
//! trait. [`MemoryStore`] keeps everything in memory; [`JsonFileStore`]
//! does the same and rewrites a JSON file after every change.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shardkeep_room::{GlobalSetting, Room, RoomSetting, World};

use crate::ShardkeepError;

/// A player's last known nickname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UidEntry {
    pub uid: String,
    pub nickname: String,
    #[serde(rename = "roomID")]
    pub room_id: i64,
}

/// Data access used by the daemon.
pub trait RoomStore: Send + Sync + 'static {
    fn rooms(&self) -> impl Future<Output = Result<Vec<Room>, ShardkeepError>> + Send;

    fn room(&self, room_id: i64) -> impl Future<Output = Result<Option<Room>, ShardkeepError>> + Send;

    /// Worlds of a room, ordered by id.
    fn worlds(&self, room_id: i64) -> impl Future<Output = Result<Vec<World>, ShardkeepError>> + Send;

    /// Settings of a room; a room without a row gets the defaults.
    fn room_setting(&self, room_id: i64) -> impl Future<Output = Result<RoomSetting, ShardkeepError>> + Send;

    fn global_setting(&self) -> impl Future<Output = Result<GlobalSetting, ShardkeepError>> + Send;

    fn save_room(&self, room: Room) -> impl Future<Output = Result<(), ShardkeepError>> + Send;

    /// Replaces every world of a room.
    fn save_worlds(&self, room_id: i64, worlds: Vec<World>) -> impl Future<Output = Result<(), ShardkeepError>> + Send;

    fn save_room_setting(&self, setting: RoomSetting) -> impl Future<Output = Result<(), ShardkeepError>> + Send;

    fn save_global_setting(&self, setting: GlobalSetting) -> impl Future<Output = Result<(), ShardkeepError>> + Send;

    /// Removes a room together with its worlds and settings.
    fn delete_room(&self, room_id: i64) -> impl Future<Output = Result<(), ShardkeepError>> + Send;

    fn upsert_uid(&self, entry: UidEntry) -> impl Future<Output = Result<(), ShardkeepError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// The whole persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreState {
    pub rooms: BTreeMap<i64, Room>,
    pub worlds: BTreeMap<i64, Vec<World>>,
    pub room_settings: BTreeMap<i64, RoomSetting>,
    pub global_setting: GlobalSetting,
    pub uid_map: BTreeMap<String, UidEntry>,
}

/// A store that forgets everything when dropped.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    fn edit(&self, f: impl FnOnce(&mut StoreState)) {
        f(&mut self.state.write());
    }
}

impl RoomStore for MemoryStore {
    async fn rooms(&self) -> Result<Vec<Room>, ShardkeepError> {
        Ok(self.state.read().rooms.values().cloned().collect())
    }

    async fn room(&self, room_id: i64) -> Result<Option<Room>, ShardkeepError> {
        Ok(self.state.read().rooms.get(&room_id).cloned())
    }

    async fn worlds(&self, room_id: i64) -> Result<Vec<World>, ShardkeepError> {
        let mut worlds = self.state.read().worlds.get(&room_id).cloned().unwrap_or_default();
        worlds.sort_by_key(|w| w.id);
        Ok(worlds)
    }

    async fn room_setting(&self, room_id: i64) -> Result<RoomSetting, ShardkeepError> {
        Ok(self
            .state
            .read()
            .room_settings
            .get(&room_id)
            .cloned()
            .unwrap_or_else(|| RoomSetting {
                room_id,
                ..RoomSetting::default()
            }))
    }

    async fn global_setting(&self) -> Result<GlobalSetting, ShardkeepError> {
        Ok(self.state.read().global_setting.clone())
    }

    async fn save_room(&self, room: Room) -> Result<(), ShardkeepError> {
        self.edit(|s| {
            s.rooms.insert(room.id, room);
        });
        Ok(())
    }

    async fn save_worlds(&self, room_id: i64, worlds: Vec<World>) -> Result<(), ShardkeepError> {
        self.edit(|s| {
            s.worlds.insert(room_id, worlds);
        });
        Ok(())
    }

    async fn save_room_setting(&self, setting: RoomSetting) -> Result<(), ShardkeepError> {
        self.edit(|s| {
            s.room_settings.insert(setting.room_id, setting);
        });
        Ok(())
    }

    async fn save_global_setting(&self, setting: GlobalSetting) -> Result<(), ShardkeepError> {
        self.edit(|s| s.global_setting = setting);
        Ok(())
    }

    async fn delete_room(&self, room_id: i64) -> Result<(), ShardkeepError> {
        self.edit(|s| {
            s.rooms.remove(&room_id);
            s.worlds.remove(&room_id);
            s.room_settings.remove(&room_id);
        });
        Ok(())
    }

    async fn upsert_uid(&self, entry: UidEntry) -> Result<(), ShardkeepError> {
        self.edit(|s| {
            s.uid_map.insert(entry.uid.clone(), entry);
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// A [`MemoryStore`] mirrored to a JSON file.
///
/// Every write rewrites the whole file through a temporary file and a
/// rename, so a crash never leaves half a document behind.
pub struct JsonFileStore {
    memory: MemoryStore,
    path: PathBuf,
    flush: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Opens the file, or starts empty when it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ShardkeepError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(ShardkeepError::io(&path)(e)),
        };
        tracing::info!(path = %path.display(), "state file loaded");
        Ok(Self {
            memory: MemoryStore::with_state(state),
            path,
            flush: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> StoreState {
        self.memory.snapshot()
    }

    async fn persist(&self) -> Result<(), ShardkeepError> {
        let _guard = self.flush.lock().await;
        let json = serde_json::to_string_pretty(&self.memory.snapshot())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ShardkeepError::io(parent))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(ShardkeepError::io(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(ShardkeepError::io(&self.path))
    }
}

impl RoomStore for JsonFileStore {
    async fn rooms(&self) -> Result<Vec<Room>, ShardkeepError> {
        self.memory.rooms().await
    }

    async fn room(&self, room_id: i64) -> Result<Option<Room>, ShardkeepError> {
        self.memory.room(room_id).await
    }

    async fn worlds(&self, room_id: i64) -> Result<Vec<World>, ShardkeepError> {
        self.memory.worlds(room_id).await
    }

    async fn room_setting(&self, room_id: i64) -> Result<RoomSetting, ShardkeepError> {
        self.memory.room_setting(room_id).await
    }

    async fn global_setting(&self) -> Result<GlobalSetting, ShardkeepError> {
        self.memory.global_setting().await
    }

    async fn save_room(&self, room: Room) -> Result<(), ShardkeepError> {
        self.memory.save_room(room).await?;
        self.persist().await
    }

    async fn save_worlds(&self, room_id: i64, worlds: Vec<World>) -> Result<(), ShardkeepError> {
        self.memory.save_worlds(room_id, worlds).await?;
        self.persist().await
    }

    async fn save_room_setting(&self, setting: RoomSetting) -> Result<(), ShardkeepError> {
        self.memory.save_room_setting(setting).await?;
        self.persist().await
    }

    async fn save_global_setting(&self, setting: GlobalSetting) -> Result<(), ShardkeepError> {
        self.memory.save_global_setting(setting).await?;
        self.persist().await
    }

    async fn delete_room(&self, room_id: i64) -> Result<(), ShardkeepError> {
        self.memory.delete_room(room_id).await?;
        self.persist().await
    }

    async fn upsert_uid(&self, entry: UidEntry) -> Result<(), ShardkeepError> {
        self.memory.upsert_uid(entry).await?;
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(id: i64, name: &str) -> World {
        World {
            id,
            room_id: 4,
            world_name: name.to_owned(),
            ..World::default()
        }
    }

    #[tokio::test]
    async fn test_memory_store_orders_worlds_and_defaults_settings() {
        let store = MemoryStore::new();
        store.save_worlds(4, vec![world(9, "Caves"), world(2, "Master")]).await.unwrap();

        let names: Vec<String> = store.worlds(4).await.unwrap().into_iter().map(|w| w.world_name).collect();
        assert_eq!(names, vec!["Master", "Caves"]);

        let setting = store.room_setting(4).await.unwrap();
        assert_eq!(setting.room_id, 4);
        assert_eq!(setting.restart_setting, "06:00:00");
        assert!(store.room(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/shardkeep.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .save_room(Room {
                id: 4,
                game_name: "Night".to_owned(),
                ..Room::default()
            })
            .await
            .unwrap();
        store.save_worlds(4, vec![world(1, "Master")]).await.unwrap();
        store
            .upsert_uid(UidEntry {
                uid: "KU_a".to_owned(),
                nickname: "wes".to_owned(),
                room_id: 4,
            })
            .await
            .unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.snapshot(), store.snapshot());
        assert_eq!(reopened.room(4).await.unwrap().unwrap().game_name, "Night");

        reopened.delete_room(4).await.unwrap();
        assert!(reopened.rooms().await.unwrap().is_empty());
        assert!(reopened.worlds(4).await.unwrap().is_empty());
    }
}
