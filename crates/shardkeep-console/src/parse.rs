//! Pure scanners over log windows.
//!
//! Every function here takes lines oldest-first, exactly as the transport
//! returns them, and performs no I/O. The protocol layer owns the timing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ConsoleError;

static CENSUS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"There are\s+(\d+)\s+(\w+)\s+in the world").expect("valid regex"));

static POSITION_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s+([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s+(-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)",
    )
    .expect("valid regex")
});

static PLAYER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"playerlist 99999999 \[[0-9]+\] (KU_.+) <-@dmp@-> (.*) <-@dmp@-> (.+)?").expect("valid regex")
});

static LOG_CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d{2}:\d{2}:\d{2})]").expect("valid regex"));

/// Marker printed before the first player-list entry.
pub const PLAYER_LIST_MARKER: &str = "playerlist 99999999 [0]";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A point in world units, or in pixels after [`coordinate_to_px`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i64,
    pub y: i64,
}

/// Result of one prefab census entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefabCount {
    pub code: String,
    pub count: u32,
}

/// A connected player as reported by the game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OnlinePlayer {
    pub uid: String,
    pub nickname: String,
    pub prefab: String,
}

// ---------------------------------------------------------------------------
// Coordinate transform
// ---------------------------------------------------------------------------

/// Maps world units onto the rendered map image.
///
/// `size` is half the map edge in tiles. Integer division truncates
/// toward zero, matching how the map image was laid out.
pub fn coordinate_to_px(size: i64, x: i64, y: i64) -> Coordinate {
    Coordinate {
        x: ((size * 2 - x) * 323) / 1310,
        y: ((size * 2 + y) * 235) / 938,
    }
}

/// Parses an integer or decimal field and truncates it.
fn truncate_number(text: &str) -> Option<i64> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let f = text.parse::<f64>().ok()?;
    f.is_finite().then(|| f.trunc() as i64)
}

// ---------------------------------------------------------------------------
// Scanners
// ---------------------------------------------------------------------------

/// Finds the last line echoing `command` and reads the position printed
/// three lines later (`[clock]: x y z`, fields 1 and 3).
pub fn coordinate_after(lines: &[String], command: &str) -> Result<Coordinate, ConsoleError> {
    let index = lines
        .iter()
        .rposition(|l| l.contains(command))
        .ok_or_else(|| ConsoleError::NoResult(format!("command echo not found: {command}")))?;

    let line = lines
        .get(index + 3)
        .ok_or_else(|| ConsoleError::NoResult("position line not yet written".to_owned()))?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(ConsoleError::NoResult(format!("unexpected position line: {line}")));
    }
    match (truncate_number(fields[1]), truncate_number(fields[3])) {
        (Some(x), Some(y)) => Ok(Coordinate { x, y }),
        _ => Err(ConsoleError::NoResult(format!("unparsable position line: {line}"))),
    }
}

/// Sums census lines bracketed by the most recent `start`/`finish` pair.
///
/// Each prefab's count comes from a `There are N <code>s in the world`
/// line. Lines outside the bracket are ignored. Returns `None` when the
/// bracket is incomplete.
pub fn census_between(
    lines: &[String],
    start: &str,
    finish: &str,
    prefabs: &[&str],
) -> Option<Vec<PrefabCount>> {
    let finish_at = lines.iter().rposition(|l| l.contains(finish))?;
    let start_at = lines[..finish_at].iter().rposition(|l| l.contains(start))?;

    let mut counts: Vec<PrefabCount> = prefabs
        .iter()
        .map(|code| PrefabCount {
            code: (*code).to_owned(),
            count: 0,
        })
        .collect();

    for line in &lines[start_at + 1..finish_at] {
        let Some(caps) = CENSUS_LINE.captures(line) else {
            continue;
        };
        let plural = &caps[2];
        let n: u32 = caps[1].parse().unwrap_or(0);
        if let Some(entry) = counts.iter_mut().find(|c| format!("{}s", c.code) == plural) {
            entry.count = n;
        }
    }
    Some(counts)
}

/// Reads the position printed between a player's start and end sentinels.
///
/// Scans newest-first: the end sentinel must be seen before the start
/// sentinel, and the first number triple in between wins. Returns `None`
/// when either sentinel is outside the window or no triple was printed.
pub fn position_between(lines: &[String], start: &str, end: &str) -> Option<Coordinate> {
    let mut seen_end = false;
    let mut found = None;
    for line in lines.iter().rev() {
        if line.contains(end) {
            seen_end = true;
            continue;
        }
        if !seen_end {
            continue;
        }
        if line.contains(start) {
            return found;
        }
        if found.is_none() {
            if let Some(caps) = POSITION_TRIPLE.captures(line) {
                if let (Some(x), Some(y)) = (truncate_number(&caps[1]), truncate_number(&caps[3])) {
                    found = Some(Coordinate { x, y });
                }
            }
        }
    }
    None
}

/// Extracts the player list printed after the last `[0]` marker.
///
/// Host entries are skipped, tabs are stripped and duplicates removed in
/// first-seen order.
pub fn player_list(lines: &[String]) -> Result<Vec<OnlinePlayer>, ConsoleError> {
    let start = lines
        .iter()
        .rposition(|l| l.contains(PLAYER_LIST_MARKER))
        .ok_or_else(|| ConsoleError::NoResult("player list marker not found".to_owned()))?;

    let mut players: Vec<OnlinePlayer> = Vec::new();
    for line in &lines[start..] {
        if line.contains("[Host]") {
            continue;
        }
        let Some(caps) = PLAYER_LINE.captures(line) else {
            continue;
        };
        let clean = |i: usize| {
            caps.get(i)
                .map(|m| m.as_str().replace('\t', ""))
                .unwrap_or_default()
        };
        let player = OnlinePlayer {
            uid: clean(1),
            nickname: clean(2),
            prefab: clean(3),
        };
        if !players.contains(&player) {
            players.push(player);
        }
    }
    Ok(players)
}

/// Returns the clock prefix (`HH:MM:SS`) of the newest timestamped line.
pub fn last_clock(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .rev()
        .find_map(|l| LOG_CLOCK.captures(l).map(|c| c[1].to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_coordinate_to_px_vectors() {
        assert_eq!(coordinate_to_px(100, 0, 0), Coordinate { x: 49, y: 50 });
        assert_eq!(coordinate_to_px(425, 0, 0), Coordinate { x: 209, y: 212 });
        assert_eq!(coordinate_to_px(425, 100, -200), Coordinate { x: 184, y: 162 });
        assert_eq!(coordinate_to_px(300, -600, 600), Coordinate { x: 295, y: 300 });
    }

    #[test]
    fn test_truncate_number() {
        assert_eq!(truncate_number("42"), Some(42));
        assert_eq!(truncate_number("-12.9"), Some(-12));
        assert_eq!(truncate_number("1e2"), Some(100));
        assert_eq!(truncate_number("x"), None);
    }

    #[test]
    fn test_coordinate_after_uses_last_echo() {
        let log = lines(&[
            "[00:00:01]: print(c_findnext('pigking').Transform:GetWorldPosition())",
            "[00:00:01]: a",
            "[00:00:01]: b",
            "[00:00:01]: 1 0 1",
            "[00:00:09]: print(c_findnext('pigking').Transform:GetWorldPosition())",
            "[00:00:09]: Finding next pigking",
            "[00:00:09]: Found",
            "[00:00:09]: 120.5 0.00 -33.75",
        ]);
        let c = coordinate_after(&log, "print(c_findnext('pigking')").unwrap();
        assert_eq!(c, Coordinate { x: 120, y: -33 });
    }

    #[test]
    fn test_coordinate_after_truncated_window() {
        let log = lines(&["[00:00:09]: print(c_findnext('moonbase'))", "[00:00:09]: x"]);
        assert!(matches!(
            coordinate_after(&log, "c_findnext('moonbase')"),
            Err(ConsoleError::NoResult(_))
        ));
    }

    #[test]
    fn test_census_ignores_lines_outside_bracket() {
        let log = lines(&[
            "[00:00:01]: There are 9 walrus_camps in the world.",
            "[00:00:02]: === world prefabs counting start ===",
            "[00:00:02]: There are 3 walrus_camps in the world.",
            "[00:00:02]: There are 12 wasphives in the world.",
            "[00:00:02]: === world prefabs counting finish ===",
            "[00:00:03]: There are 99 wasphives in the world.",
        ]);
        let counts = census_between(
            &log,
            "=== world prefabs counting start ===",
            "=== world prefabs counting finish ===",
            &["walrus_camp", "wasphive", "ruins_statue_mage"],
        )
        .unwrap();
        assert_eq!(counts[0].count, 3);
        assert_eq!(counts[1].count, 12);
        assert_eq!(counts[2].count, 0);
    }

    #[test]
    fn test_census_without_start_is_none() {
        let log = lines(&["There are 3 walrus_camps in the world.", "=== finish ==="]);
        assert!(census_between(&log, "=== start ===", "=== finish ===", &["walrus_camp"]).is_none());
    }

    #[test]
    fn test_position_between_sentinels() {
        let start = "==== DMP Start KU_a [77] Start DMP ====";
        let end = "==== DMP End KU_a [77] End DMP ====";
        let log = lines(&[
            "[00:01:00]: ==== DMP Start KU_a [77] Start DMP ====",
            "[00:01:00]: unrelated 1 2 3 from another actor",
            "[00:01:00]: -35.2 0 410.9",
            "[00:01:00]: ==== DMP End KU_a [77] End DMP ====",
            "[00:01:01]: 5 5 5",
        ]);
        assert_eq!(position_between(&log, start, end), Some(Coordinate { x: -35, y: 410 }));
    }

    #[test]
    fn test_position_with_zero_y_is_kept() {
        let log = lines(&["S", "[00:01:00]: 12 0 0", "E"]);
        assert_eq!(position_between(&log, "S", "E"), Some(Coordinate { x: 12, y: 0 }));
    }

    #[test]
    fn test_position_missing_start_is_none() {
        let log = lines(&["[00:01:00]: 1 2 3", "E"]);
        assert_eq!(position_between(&log, "S", "E"), None);
    }

    #[test]
    fn test_player_list_skips_host_and_duplicates() {
        let log = lines(&[
            "[00:00:01]: playerlist 99999999 [0] KU_old <-@dmp@-> Old <-@dmp@-> wilson",
            "[00:00:05]: playerlist 99999999 [0] KU_host <-@dmp@-> [Host] <-@dmp@-> ",
            "[00:00:05]: playerlist 99999999 [1] KU_abc <-@dmp@-> Alice\t <-@dmp@-> wendy",
            "[00:00:05]: playerlist 99999999 [2] KU_def <-@dmp@-> Bob <-@dmp@-> wx78",
            "[00:00:05]: playerlist 99999999 [2] KU_def <-@dmp@-> Bob <-@dmp@-> wx78",
        ]);
        let players = player_list(&log).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].uid, "KU_abc");
        assert_eq!(players[0].nickname, "Alice ");
        assert_eq!(players[1].prefab, "wx78");
    }

    #[test]
    fn test_player_list_without_marker_errors() {
        assert!(player_list(&lines(&["nothing here"])).is_err());
    }

    #[test]
    fn test_last_clock() {
        let log = lines(&["[12:00:01]: a", "no clock", "[12:00:07]: DMP Keepalive", "trailing"]);
        assert_eq!(last_clock(&log).as_deref(), Some("12:00:07"));
        assert_eq!(last_clock(&lines(&["none"])), None);
    }
}
