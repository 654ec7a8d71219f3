//! Day, phase and season read from the newest save metadata.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use shardkeep_codec::{LuaValue, parse_literal_lenient};
use shardkeep_session::{CommandRunner, ProcessTable};

use crate::fsutil::{self, blocking};
use crate::GameController;

/// Length of each season in days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonLength {
    pub summer: i64,
    pub autumn: i64,
    pub spring: i64,
    pub winter: i64,
}

/// In-game clock of a room.
///
/// Fields that could not be read keep their defaults: `cycles` is `-1`
/// and the text fields read `"error"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub cycles: i64,
    pub phase: String,
    pub season: String,
    pub elapsed_days: i64,
    pub season_length: SeasonLength,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            cycles: -1,
            phase: "error".to_owned(),
            season: "error".to_owned(),
            elapsed_days: 0,
            season_length: SeasonLength::default(),
        }
    }
}

impl SessionInfo {
    /// Reads a `.meta` file body. The game writes a trailing NUL after the
    /// table; it is ignored, and so is anything that is not a literal.
    pub fn from_meta(text: &str) -> Self {
        let mut info = Self::default();
        let Ok(root) = parse_literal_lenient(text.trim_end_matches('\0')) else {
            return info;
        };

        let int = |v: Option<&LuaValue>| v.and_then(LuaValue::as_f64).map(|n| n as i64);
        let text = |v: Option<&LuaValue>| v.and_then(LuaValue::as_str).map(str::to_owned);

        if let Some(clock) = root.get("clock") {
            if let Some(cycles) = int(clock.get("cycles")) {
                info.cycles = cycles;
            }
            if let Some(phase) = text(clock.get("phase")) {
                info.phase = phase;
            }
        }
        if let Some(seasons) = root.get("seasons") {
            if let Some(season) = text(seasons.get("season")) {
                info.season = season;
            }
            if let Some(days) = int(seasons.get("elapseddaysinseason")) {
                info.elapsed_days = days;
            }
            if let Some(lengths) = seasons.get("lengths") {
                let len = |name| int(lengths.get(name)).unwrap_or_default();
                info.season_length = SeasonLength {
                    summer: len("summer"),
                    autumn: len("autumn"),
                    spring: len("spring"),
                    winter: len("winter"),
                };
            }
        }
        info
    }
}

/// The most recently modified `.meta` file one level below `session_dir`.
pub fn latest_meta_file(session_dir: &Path) -> Option<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for sub in fsutil::dir_names(session_dir).ok()? {
        let sub = session_dir.join(sub);
        for name in fsutil::file_names(&sub).unwrap_or_default() {
            if !name.ends_with(".meta") {
                continue;
            }
            let path = sub.join(name);
            let Some(mtime) = fsutil::modified(&path) else {
                continue;
            };
            if latest.as_ref().is_none_or(|(t, _)| mtime > *t) {
                latest = Some((mtime, path));
            }
        }
    }
    latest.map(|(_, path)| path)
}

impl<R: CommandRunner, P: ProcessTable> GameController<R, P> {
    /// Clock of the first world that has any save metadata.
    pub async fn session_info(&self) -> SessionInfo {
        let sessions: Vec<PathBuf> = self
            .worlds
            .iter()
            .map(|w| self.world_paths(w).session_dir)
            .collect();

        blocking(move || {
            let Some(meta) = sessions.iter().find_map(|dir| latest_meta_file(dir)) else {
                return Ok(SessionInfo::default());
            };
            Ok(fsutil::read_optional(&meta)?
                .map(|text| SessionInfo::from_meta(&text))
                .unwrap_or_default())
        })
        .await
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = concat!(
        "return { clock={ cycles=41, phase=\"dusk\", remainingtimeinphase=12.5 }, ",
        "seasons={ season=\"autumn\", elapseddaysinseason=3, ",
        "lengths={ summer=15, autumn=20, spring=20, winter=15 } }, ",
        "ents = {} }\0"
    );

    #[test]
    fn test_from_meta_reads_clock_and_seasons() {
        let info = SessionInfo::from_meta(META);
        assert_eq!(info.cycles, 41);
        assert_eq!(info.phase, "dusk");
        assert_eq!(info.season, "autumn");
        assert_eq!(info.elapsed_days, 3);
        assert_eq!(info.season_length.autumn, 20);
    }

    #[test]
    fn test_from_meta_garbage_keeps_defaults() {
        let info = SessionInfo::from_meta("not lua at all {");
        assert_eq!(info, SessionInfo::default());
        assert_eq!(info.cycles, -1);
    }

    #[test]
    fn test_latest_meta_file_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("AAA/0000000001.meta");
        let new = dir.path().join("BBB/0000000002.meta");
        fsutil::write_file(&old, "return {}").unwrap();
        fsutil::write_file(&dir.path().join("BBB/0000000002"), "").unwrap();
        fsutil::write_file(&new, "return {}").unwrap();

        let past = SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        assert_eq!(latest_meta_file(dir.path()), Some(new));
        assert_eq!(latest_meta_file(&dir.path().join("missing")), None);
    }
}
