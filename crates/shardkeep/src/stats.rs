//! Process-wide statistics: online players, online time, host metrics.
//!
//! Each collection owns its lock. Readers get clones, never guards.

use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shardkeep_console::OnlinePlayer;

const SECONDS_PER_DAY: u64 = 86_400;

// ---------------------------------------------------------------------------
// Ring
// ---------------------------------------------------------------------------

/// Bounded queue evicting its oldest entry when full.
#[derive(Debug, Clone)]
struct Ring<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, item: T) {
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Player statistics
// ---------------------------------------------------------------------------

/// Players online in one room at one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub players: Vec<OnlinePlayer>,
}

/// One day of player polls per room.
pub struct PlayerStatistics {
    rooms: RwLock<HashMap<i64, Ring<PlayerSnapshot>>>,
    capacity: RwLock<usize>,
}

impl PlayerStatistics {
    /// Sized for one day of polls every `interval_secs`.
    pub fn new(interval_secs: u64) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity: RwLock::new(Self::capacity_for(interval_secs)),
        }
    }

    fn capacity_for(interval_secs: u64) -> usize {
        (SECONDS_PER_DAY / interval_secs.max(1)) as usize
    }

    pub fn capacity(&self) -> usize {
        *self.capacity.read()
    }

    /// Resizes every room's ring after the poll interval changed.
    pub fn set_interval(&self, interval_secs: u64) {
        let capacity = Self::capacity_for(interval_secs);
        *self.capacity.write() = capacity;
        for ring in self.rooms.write().values_mut() {
            ring.set_capacity(capacity);
        }
    }

    pub fn record(&self, room_id: i64, snapshot: PlayerSnapshot) {
        let capacity = self.capacity();
        self.rooms
            .write()
            .entry(room_id)
            .or_insert_with(|| Ring::new(capacity))
            .push(snapshot);
    }

    /// Oldest first.
    pub fn history(&self, room_id: i64) -> Vec<PlayerSnapshot> {
        self.rooms.read().get(&room_id).map(Ring::to_vec).unwrap_or_default()
    }

    pub fn latest(&self, room_id: i64) -> Option<PlayerSnapshot> {
        self.rooms.read().get(&room_id).and_then(|r| r.items.back().cloned())
    }

    pub fn drop_room(&self, room_id: i64) {
        self.rooms.write().remove(&room_id);
    }
}

// ---------------------------------------------------------------------------
// Online time
// ---------------------------------------------------------------------------

/// Seconds each nickname has been seen online, per room.
#[derive(Default)]
pub struct OnlineTime {
    rooms: RwLock<HashMap<i64, BTreeMap<String, u64>>>,
}

impl OnlineTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, room_id: i64, nickname: &str, seconds: u64) {
        *self
            .rooms
            .write()
            .entry(room_id)
            .or_default()
            .entry(nickname.to_owned())
            .or_default() += seconds;
    }

    pub fn of_room(&self, room_id: i64) -> BTreeMap<String, u64> {
        self.rooms.read().get(&room_id).cloned().unwrap_or_default()
    }

    pub fn remove_room(&self, room_id: i64) {
        self.rooms.write().remove(&room_id);
    }
}

// ---------------------------------------------------------------------------
// System metrics
// ---------------------------------------------------------------------------

/// One host sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// Unix milliseconds.
    pub timestamp: i64,
    /// Percent.
    pub cpu: f64,
    /// Percent.
    pub memory: f64,
    /// KB/s.
    pub net_uplink: f64,
    /// KB/s.
    pub net_downlink: f64,
    /// Percent of the disk holding the platform root.
    pub disk: f64,
}

/// Minute samples covering the last `hours`.
pub struct MetricsRing {
    ring: RwLock<Ring<SystemMetrics>>,
}

impl MetricsRing {
    pub fn new(hours: u64) -> Self {
        Self {
            ring: RwLock::new(Ring::new(Self::capacity_for(hours))),
        }
    }

    fn capacity_for(hours: u64) -> usize {
        (hours * 60) as usize
    }

    pub fn set_hours(&self, hours: u64) {
        self.ring.write().set_capacity(Self::capacity_for(hours));
    }

    pub fn capacity(&self) -> usize {
        self.ring.read().capacity
    }

    pub fn record(&self, sample: SystemMetrics) {
        self.ring.write().push(sample);
    }

    pub fn samples(&self) -> Vec<SystemMetrics> {
        self.ring.read().to_vec()
    }

    pub fn clear(&self) {
        self.ring.write().items.clear();
    }
}
