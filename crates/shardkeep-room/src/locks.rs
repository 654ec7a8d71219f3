//! Per-room, per-concern exclusion.
//!
//! Two controllers for the same room may exist at once (an API call and a
//! scheduled job, say). Each file family a room owns gets its own async
//! mutex, keyed by `(room, concern)`, so unrelated edits never wait on
//! each other while edits of the same file never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

/// A family of files guarded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    /// `cluster.ini`, `cluster_token.txt` and the world config files.
    RoomConfig,
    /// Workshop manifests of every world.
    Manifest,
    /// `modoverrides.lua` of every world.
    ModOverrides,
    /// `adminlist.txt`, `blocklist.txt`, `whitelist.txt`.
    PlayerLists,
}

/// Lazily created async mutexes, one per `(room, concern)`.
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<(i64, Concern), Arc<tokio::sync::Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to one concern of a room.
    pub async fn lock(&self, room_id: i64, concern: Concern) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry((room_id, concern)).or_default())
        };
        mutex.lock_owned().await
    }

    /// Drops every lock of a deleted room. Holders keep their guards.
    pub fn forget_room(&self, room_id: i64) {
        self.locks.lock().retain(|(id, _), _| *id != room_id);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// DownloadTracker
// ---------------------------------------------------------------------------

/// Counts mod downloads in progress across all rooms.
///
/// The temporary download cleanup job skips its run while the count is
/// non-zero.
#[derive(Debug, Default)]
pub struct DownloadTracker {
    active: AtomicUsize,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a download as started until the guard is dropped.
    pub fn begin(self: &Arc<Self>) -> DownloadGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        DownloadGuard(Arc::clone(self))
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the download count on drop.
#[derive(Debug)]
pub struct DownloadGuard(Arc<DownloadTracker>);

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_same_concern_is_exclusive() {
        let locks = Arc::new(LockRegistry::new());
        let guard = locks.lock(1, Concern::Manifest).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock(1, Concern::Manifest).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_other_concerns_and_rooms_do_not_block() {
        let locks = LockRegistry::new();
        let _a = locks.lock(1, Concern::Manifest).await;
        let _b = locks.lock(1, Concern::PlayerLists).await;
        let _c = locks.lock(2, Concern::Manifest).await;
        assert_eq!(locks.len(), 3);

        locks.forget_room(1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_download_guard_counts() {
        let tracker = Arc::new(DownloadTracker::new());
        let a = tracker.begin();
        let b = tracker.begin();
        assert_eq!(tracker.active(), 2);
        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
    }
}
