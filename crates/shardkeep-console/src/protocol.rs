//! Typed console queries built on a [`ConsoleTransport`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::parse::{
    Coordinate, OnlinePlayer, PrefabCount, census_between, coordinate_after,
    last_clock, player_list, position_between,
};
use crate::{ConsoleError, ConsoleTransport};

/// Prefabs counted by [`ConsoleProtocol::count_prefabs`].
pub const CENSUS_PREFABS: [&str; 4] = ["walrus_camp", "wasphive", "ruins_statue_mage", "archive_moon_statue"];

/// Landmarks located by [`ConsoleProtocol::landmarks`].
pub const LANDMARK_PREFABS: [&str; 8] = [
    "pigking",
    "multiplayer_portal",
    "moonbase",
    "lava_pond",
    "oasislake",
    "antlion",
    "oceanwhirlbigportal",
    "beequeenhivegrown",
];

const CENSUS_START: &str = "=== world prefabs counting start ===";
const CENSUS_FINISH: &str = "=== world prefabs counting finish ===";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Delays and window sizes for console round-trips.
///
/// The server gives no completion signal, so each query sleeps for a fixed
/// time after injecting and then reads whatever has been flushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolTiming {
    /// Wait after a single-shot query before reading the log.
    pub flush: Duration,

    /// Pause between consecutive lines of a multi-line query.
    pub step: Duration,

    /// Wait after the census finish marker.
    pub census_flush: Duration,

    /// Wait for the player-list loop to print every client.
    pub player_list: Duration,

    /// Wait for the keepalive print.
    pub keepalive: Duration,

    /// Lines read for coordinate and census queries.
    pub window_lines: usize,

    /// Lines read for one per-player position query.
    pub position_lines: usize,

    /// Bytes read for the player list.
    pub player_list_bytes: u64,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            flush: Duration::from_millis(100),
            step: Duration::from_millis(50),
            census_flush: Duration::from_millis(100),
            player_list: Duration::from_secs(2),
            keepalive: Duration::from_secs(1),
            window_lines: 1000,
            position_lines: 100,
            player_list_bytes: 4096,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A located landmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmark {
    pub prefab: String,
    pub coordinate: Coordinate,
}

/// A player and, when the scrape succeeded, their world position.
///
/// `coordinate` is `None` when the position lines were not found. A
/// position with a zero component is still a real position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPosition {
    #[serde(flatten)]
    pub player: OnlinePlayer,
    pub coordinate: Option<Coordinate>,
}

// ---------------------------------------------------------------------------
// ConsoleProtocol
// ---------------------------------------------------------------------------

/// Request/response queries against one world's console.
///
/// Queries against the same world must not overlap: single-shot framing
/// takes the most recent echo of the command.
pub struct ConsoleProtocol<T> {
    transport: T,
    timing: ProtocolTiming,
}

impl<T: ConsoleTransport> ConsoleProtocol<T> {
    pub fn new(transport: T, timing: ProtocolTiming) -> Self {
        Self { transport, timing }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn timing(&self) -> &ProtocolTiming {
        &self.timing
    }

    /// Injects one raw console line.
    pub async fn send(&self, line: &str) -> Result<(), ConsoleError> {
        self.transport.inject(line).await?;
        tracing::debug!(line, "console line injected");
        Ok(())
    }

    /// World position of the next instance of `prefab`.
    pub async fn coordinate_of(&self, prefab: &str) -> Result<Coordinate, ConsoleError> {
        let command = format!("print(c_findnext('{prefab}').Transform:GetWorldPosition())");
        self.send(&command).await?;
        tokio::time::sleep(self.timing.flush).await;

        let lines = self.transport.tail_lines(self.timing.window_lines).await?;
        coordinate_after(&lines, &command).inspect_err(|e| {
            tracing::debug!(prefab, error = %e, "coordinate scrape missed");
        })
    }

    /// Locates every landmark in [`LANDMARK_PREFABS`].
    ///
    /// Landmarks that are absent from the world, or whose lookup fails, are
    /// left out of the result.
    pub async fn landmarks(&self) -> Vec<Landmark> {
        let mut found = Vec::new();
        for prefab in LANDMARK_PREFABS {
            match self.coordinate_of(prefab).await {
                Ok(coordinate) => found.push(Landmark {
                    prefab: prefab.to_owned(),
                    coordinate,
                }),
                Err(e) => tracing::debug!(prefab, error = %e, "landmark skipped"),
            }
        }
        found
    }

    /// Counts the prefabs in [`CENSUS_PREFABS`].
    ///
    /// All count commands share one start/finish bracket. A count command
    /// that cannot be injected leaves that prefab at zero.
    pub async fn count_prefabs(&self) -> Result<Vec<PrefabCount>, ConsoleError> {
        self.send(&format!("print('{CENSUS_START}')")).await?;
        for code in CENSUS_PREFABS {
            if let Err(e) = self.send(&format!("c_countprefabs('{code}')")).await {
                tracing::warn!(prefab = code, error = %e, "census command not delivered");
            }
            tokio::time::sleep(self.timing.step).await;
        }
        self.send(&format!("print('{CENSUS_FINISH}')")).await?;
        tokio::time::sleep(self.timing.census_flush).await;

        let lines = self.transport.tail_lines(self.timing.window_lines).await?;
        census_between(&lines, CENSUS_START, CENSUS_FINISH, &CENSUS_PREFABS)
            .ok_or_else(|| ConsoleError::NoResult("census bracket not found".to_owned()))
    }

    /// Positions of the given players.
    ///
    /// Every player is queried with its own sentinel pair. A failed query
    /// yields `coordinate: None` for that player and the batch continues.
    pub async fn player_positions(&self, players: &[OnlinePlayer]) -> Vec<PlayerPosition> {
        let mut positions = Vec::with_capacity(players.len());
        for player in players {
            let coordinate = match self.position_of(&player.uid).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(uid = %player.uid, error = %e, "player position skipped");
                    None
                }
            };
            positions.push(PlayerPosition {
                player: player.clone(),
                coordinate,
            });
        }
        positions
    }

    async fn position_of(&self, uid: &str) -> Result<Option<Coordinate>, ConsoleError> {
        let nonce = next_nonce();
        let start = format!("==== DMP Start {uid} [{nonce}] Start DMP ====");
        let end = format!("==== DMP End {uid} [{nonce}] End DMP ====");

        for line in [
            format!("print('{start}')"),
            format!("print(UserToPlayer('{uid}').Transform:GetWorldPosition())"),
            format!("print('{end}')"),
        ] {
            self.send(&line).await?;
            tokio::time::sleep(self.timing.step).await;
        }

        let lines = self.transport.tail_lines(self.timing.position_lines).await?;
        Ok(position_between(&lines, &start, &end))
    }

    /// Players currently connected, host excluded.
    pub async fn online_players(&self) -> Result<Vec<OnlinePlayer>, ConsoleError> {
        let command = "for i, v in ipairs(TheNet:GetClientTable()) do print(string.format('playerlist %s [%d] %s <-@dmp@-> %s <-@dmp@-> %s', 99999999, i-1, v.userid, v.name, v.prefab)) end";
        self.send(command).await?;
        tokio::time::sleep(self.timing.player_list).await;

        let lines = self.transport.tail_bytes(self.timing.player_list_bytes).await?;
        player_list(&lines)
    }

    /// Clock time (`HH:MM:SS`) of the newest log line after a keepalive
    /// print. Two equal answers in a row mean the world stopped ticking.
    ///
    /// The log is read even when the print cannot be injected: a dead
    /// session still leaves its last clock behind.
    pub async fn last_alive(&self) -> Result<String, ConsoleError> {
        if let Err(e) = self.send("print('DMP Keepalive')").await {
            tracing::debug!(error = %e, "keepalive print not injected, reading log anyway");
        }
        tokio::time::sleep(self.timing.keepalive).await;

        let lines = self.transport.tail_lines(self.timing.position_lines).await?;
        last_clock(&lines).ok_or_else(|| ConsoleError::NoResult("no timestamped line".to_owned()))
    }
}

static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Wall-clock nanoseconds, bumped when needed so no two queries share one.
fn next_nonce() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let prev = LAST_NONCE
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
        .unwrap_or_else(|prev| prev);
    now.max(prev + 1)
}
