//! Console queries against a scripted game console.
//!
//! `FakeConsole` plays the game's part: every injected line is echoed into
//! an in-memory log and answered the way the server would answer it. The
//! protocol under test only ever sees the log through the transport trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shardkeep_console::{
    CENSUS_PREFABS, ConsoleError, ConsoleProtocol, ConsoleTransport, Coordinate, OnlinePlayer,
    ProtocolTiming, ScreenTransport, coordinate_to_px,
};
use shardkeep_session::{
    CommandOutput, CommandRunner, ProcessSample, ProcessTable, SessionConfig, SessionController,
    SessionError, SessionName,
};

// =========================================================================
// Helpers
// =========================================================================

#[derive(Default)]
struct FakeConsole {
    log: Mutex<Vec<String>>,
    injected: Mutex<Vec<String>>,
    clock: Mutex<u32>,
    landmarks: HashMap<&'static str, &'static str>,
    counts: HashMap<&'static str, u32>,
    positions: HashMap<&'static str, &'static str>,
    clients: Vec<(&'static str, &'static str, &'static str)>,
    dead: bool,
    frozen: bool,
}

fn quoted(line: &str) -> Option<&str> {
    let start = line.find('\'')? + 1;
    let end = start + line[start..].find('\'')?;
    Some(&line[start..end])
}

impl FakeConsole {
    fn push(&self, text: &str) {
        let mut clock = self.clock.lock();
        if !self.frozen {
            *clock += 1;
        }
        let stamp = format!("[00:{:02}:{:02}]: ", *clock / 60, *clock % 60);
        self.log.lock().push(format!("{stamp}{text}"));
    }

    fn preload(&self, lines: &[&str]) {
        self.log.lock().extend(lines.iter().map(|l| (*l).to_owned()));
    }

    fn injected(&self) -> Vec<String> {
        self.injected.lock().clone()
    }
}

impl ConsoleTransport for FakeConsole {
    async fn inject(&self, line: &str) -> Result<(), ConsoleError> {
        if self.dead {
            return Err(ConsoleError::Inject(SessionError::CommandFailed {
                command: line.to_owned(),
                stderr: "No screen session found.".to_owned(),
            }));
        }
        self.injected.lock().push(line.to_owned());
        self.push(&format!("RemoteCommandInput: \"{line}\""));

        if line.starts_with("print(c_findnext(") {
            let prefab = quoted(line).unwrap_or_default();
            match self.landmarks.get(prefab) {
                Some(position) => {
                    self.push(&format!("Finding next {prefab}"));
                    self.push(&format!("Found {prefab}"));
                    self.push(position);
                }
                None => self.push("[string \"print(c_findnext(...\"]:1: attempt to index a nil value"),
            }
        } else if line.starts_with("print(UserToPlayer(") {
            let uid = quoted(line).unwrap_or_default();
            match self.positions.get(uid) {
                Some(position) => self.push(position),
                None => self.push("[string \"print(UserToPlayer(...\"]:1: attempt to index a nil value"),
            }
        } else if line.starts_with("c_countprefabs(") {
            let code = quoted(line).unwrap_or_default();
            let n = self.counts.get(code).copied().unwrap_or(0);
            self.push(&format!("There are {n} {code}s in the world."));
        } else if line.starts_with("for i, v in ipairs(TheNet:GetClientTable())") {
            self.push("playerlist 99999999 [0] KU_host <-@dmp@-> [Host] <-@dmp@-> ");
            for (i, (uid, name, prefab)) in self.clients.iter().enumerate() {
                self.push(&format!("playerlist 99999999 [{}] {uid} <-@dmp@-> {name} <-@dmp@-> {prefab}", i + 1));
            }
        } else if line.starts_with("print('") {
            self.push(quoted(line).unwrap_or_default());
        }
        Ok(())
    }

    async fn tail_lines(&self, n: usize) -> Result<Vec<String>, ConsoleError> {
        let log = self.log.lock();
        let start = log.len().saturating_sub(n);
        Ok(log[start..].to_vec())
    }

    async fn tail_bytes(&self, n: u64) -> Result<Vec<String>, ConsoleError> {
        let log = self.log.lock();
        let mut budget = n as usize;
        let mut lines = Vec::new();
        for line in log.iter().rev() {
            if line.len() + 1 > budget {
                break;
            }
            budget -= line.len() + 1;
            lines.push(line.clone());
        }
        lines.reverse();
        Ok(lines)
    }
}

fn protocol(console: FakeConsole) -> ConsoleProtocol<FakeConsole> {
    ConsoleProtocol::new(console, ProtocolTiming::default())
}

fn player(uid: &str) -> OnlinePlayer {
    OnlinePlayer {
        uid: uid.to_owned(),
        nickname: uid.to_lowercase(),
        prefab: "wilson".to_owned(),
    }
}

// =========================================================================
// Coordinate transform
// =========================================================================

#[test]
fn test_coordinate_to_px_literal_vectors() {
    let cases = [
        ((100, 0, 0), (49, 50)),
        ((425, 0, 0), (209, 212)),
        ((425, 100, -200), (184, 162)),
        ((300, -600, 600), (295, 300)),
    ];
    for ((size, x, y), (px, py)) in cases {
        assert_eq!(coordinate_to_px(size, x, y), Coordinate { x: px, y: py }, "size={size} x={x} y={y}");
    }
}

// =========================================================================
// Single-shot framing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_coordinate_of_reads_third_line_after_echo() {
    let protocol = protocol(FakeConsole {
        landmarks: HashMap::from([("pigking", "-120.25 0.00 86.9")]),
        ..FakeConsole::default()
    });
    let c = protocol.coordinate_of("pigking").await.unwrap();
    assert_eq!(c, Coordinate { x: -120, y: 86 });
}

#[tokio::test(start_paused = true)]
async fn test_coordinate_of_missing_prefab_is_no_result() {
    let protocol = protocol(FakeConsole::default());
    let err = protocol.coordinate_of("moonbase").await.unwrap_err();
    assert!(matches!(err, ConsoleError::NoResult(_)));
}

#[tokio::test(start_paused = true)]
async fn test_landmarks_skip_absent_prefabs() {
    let protocol = protocol(FakeConsole {
        landmarks: HashMap::from([("pigking", "10 0 20"), ("oasislake", "-5.5 0 7")]),
        ..FakeConsole::default()
    });
    let found = protocol.landmarks().await;
    let names: Vec<&str> = found.iter().map(|l| l.prefab.as_str()).collect();
    assert_eq!(names, vec!["pigking", "oasislake"]);
    assert_eq!(found[1].coordinate, Coordinate { x: -5, y: 7 });
    assert_eq!(protocol.transport().injected().len(), 8);
}

// =========================================================================
// Bracketed census
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_census_ignores_stale_output() {
    let console = FakeConsole {
        counts: HashMap::from([("walrus_camp", 3), ("wasphive", 11)]),
        ..FakeConsole::default()
    };
    console.preload(&[
        "[00:00:00]: === world prefabs counting start ===",
        "[00:00:00]: There are 40 walrus_camps in the world.",
        "[00:00:00]: === world prefabs counting finish ===",
        "[00:00:00]: There are 77 wasphives in the world.",
    ]);
    let protocol = protocol(console);

    let counts = protocol.count_prefabs().await.unwrap();
    let by_code: HashMap<&str, u32> = counts.iter().map(|c| (c.code.as_str(), c.count)).collect();
    assert_eq!(by_code["walrus_camp"], 3);
    assert_eq!(by_code["wasphive"], 11);
    assert_eq!(by_code["ruins_statue_mage"], 0);
    assert_eq!(counts.len(), CENSUS_PREFABS.len());
    // start marker, one command per prefab, finish marker
    assert_eq!(protocol.transport().injected().len(), CENSUS_PREFABS.len() + 2);
}

#[tokio::test(start_paused = true)]
async fn test_census_on_dead_session_fails() {
    let protocol = protocol(FakeConsole {
        dead: true,
        ..FakeConsole::default()
    });
    assert!(matches!(protocol.count_prefabs().await, Err(ConsoleError::Inject(_))));
}

// =========================================================================
// Sentinel framing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_player_positions_continue_past_misses() {
    let protocol = protocol(FakeConsole {
        positions: HashMap::from([("KU_a", "12.7 0 -0.4"), ("KU_c", "-300 0 0")]),
        ..FakeConsole::default()
    });
    let players = [player("KU_a"), player("KU_b"), player("KU_c")];

    let positions = protocol.player_positions(&players).await;
    assert_eq!(positions.len(), 3);
    assert_eq!(positions[0].coordinate, Some(Coordinate { x: 12, y: 0 }));
    assert_eq!(positions[1].coordinate, None);
    assert_eq!(positions[2].coordinate, Some(Coordinate { x: -300, y: 0 }));
    assert_eq!(positions[1].player.uid, "KU_b");
    assert_eq!(protocol.transport().injected().len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_player_positions_use_fresh_nonces() {
    let protocol = protocol(FakeConsole::default());
    protocol.player_positions(&[player("KU_a")]).await;
    protocol.player_positions(&[player("KU_a")]).await;

    let starts: Vec<String> = protocol
        .transport()
        .injected()
        .into_iter()
        .filter(|l| l.contains("DMP Start"))
        .collect();
    assert_eq!(starts.len(), 2);
    assert_ne!(starts[0], starts[1]);
}

// =========================================================================
// Player list and keepalive
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_online_players_excludes_host() {
    let protocol = protocol(FakeConsole {
        clients: vec![("KU_abc", "Alice", "wendy"), ("KU_def", "Bob", "wx78")],
        ..FakeConsole::default()
    });
    let players = protocol.online_players().await.unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].nickname, "Alice");
    assert_eq!(players[1].prefab, "wx78");
}

#[tokio::test(start_paused = true)]
async fn test_online_players_waits_for_flush() {
    let protocol = protocol(FakeConsole::default());
    let before = tokio::time::Instant::now();
    protocol.online_players().await.unwrap();
    assert!(before.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_last_alive_changes_while_ticking() {
    let protocol = protocol(FakeConsole::default());
    let first = protocol.last_alive().await.unwrap();
    let second = protocol.last_alive().await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_last_alive_repeats_when_frozen() {
    let protocol = protocol(FakeConsole {
        frozen: true,
        ..FakeConsole::default()
    });
    let first = protocol.last_alive().await.unwrap();
    let second = protocol.last_alive().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "00:00:00");
}

#[tokio::test(start_paused = true)]
async fn test_last_alive_reads_log_of_dead_session() {
    let console = FakeConsole {
        dead: true,
        ..FakeConsole::default()
    };
    console.preload(&["[00:01:02]: last words"]);
    let protocol = protocol(console);
    assert_eq!(protocol.last_alive().await.unwrap(), "00:01:02");
}

#[tokio::test(start_paused = true)]
async fn test_last_alive_without_timestamp_is_no_result() {
    let protocol = protocol(FakeConsole {
        dead: true,
        ..FakeConsole::default()
    });
    assert!(matches!(protocol.last_alive().await, Err(ConsoleError::NoResult(_))));
}

// =========================================================================
// Screen transport
// =========================================================================

#[derive(Default)]
struct RecordingShell {
    commands: Mutex<Vec<String>>,
}

impl CommandRunner for RecordingShell {
    async fn run(&self, command: &str) -> Result<CommandOutput, SessionError> {
        self.commands.lock().push(command.to_owned());
        Ok(CommandOutput {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct NoProcesses;

impl ProcessTable for NoProcesses {
    async fn sample(&self, _pid: u32) -> Option<ProcessSample> {
        None
    }
}

#[tokio::test]
async fn test_screen_transport_injects_and_tails() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("server_log.txt");
    std::fs::write(&log_path, "[00:00:01]: one\n[00:00:02]: two\n[00:00:03]: three\n").unwrap();

    let shell = Arc::new(RecordingShell::default());
    let sessions = SessionController::new(Arc::clone(&shell), Arc::new(NoProcesses), SessionConfig::default());
    let transport = ScreenTransport::new(sessions, SessionName::new(7, "Master"), log_path);

    transport.inject("c_save()").await.unwrap();
    let commands = shell.commands.lock().clone();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].contains("-S \"DMP_Cluster_7_Master\""));
    assert!(commands[0].contains("c_save()"));

    let lines = transport.tail_lines(2).await.unwrap();
    assert_eq!(lines, vec!["[00:00:02]: two", "[00:00:03]: three"]);
}

#[tokio::test]
async fn test_screen_transport_missing_log() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionController::new(
        Arc::new(RecordingShell::default()),
        Arc::new(NoProcesses),
        SessionConfig::default(),
    );
    let transport = ScreenTransport::new(sessions, SessionName::new(1, "Caves"), dir.path().join("nope.txt"));
    assert!(matches!(
        transport.tail_lines(10).await,
        Err(ConsoleError::LogUnavailable { .. })
    ));
}
