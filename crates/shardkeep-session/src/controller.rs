//! The session controller: start, stop and probe world sessions by name.
//!
//! Nothing here keeps a handle to a spawned process. `screen -d -m`
//! detaches immediately, so the only source of truth is the process table,
//! queried fresh for every decision. That keeps the controller stateless:
//! it can be cloned freely and survives a restart of the daemon without
//! losing track of running worlds.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::dir_size;
use crate::{
    CommandRunner, ProcessTable, SessionError, SessionName, StartVariant, cluster_dir_name,
    session_prefix,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for session control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Wait between the in-game shutdown command and the forced quit.
    pub stop_grace: Duration,

    /// Game install directory, relative to the runner's working directory.
    pub game_dir: String,

    /// Scrollback lines kept by each terminal session.
    pub scrollback: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(1),
            game_dir: "dst".to_owned(),
            scrollback: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Everything needed to launch or probe one world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSession {
    pub room_id: i64,
    pub world_name: String,
    /// Absolute path of the world directory inside the cluster.
    pub world_dir: PathBuf,
}

impl WorldSession {
    pub fn name(&self) -> SessionName {
        SessionName::new(self.room_id, &self.world_name)
    }

    pub fn cluster(&self) -> String {
        cluster_dir_name(self.room_id)
    }
}

/// What [`SessionController::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Spawned,
    /// A session with the same name was already up; nothing was launched.
    AlreadyRunning,
}

/// Resource footprint of one world.
///
/// `disk_bytes` is always filled in. The process figures stay zero when
/// the world is not running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub running: bool,
    pub cpu: f64,
    pub mem_percent: f64,
    pub rss_mb: f64,
    pub disk_bytes: u64,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

const SERVER_BINARY: &str = "dontstarve_dedicated_server_nullrenderer";

/// Starts, stops and inspects detached world sessions.
pub struct SessionController<R, P> {
    runner: Arc<R>,
    table: Arc<P>,
    config: SessionConfig,
}

impl<R, P> Clone for SessionController<R, P> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            table: Arc::clone(&self.table),
            config: self.config.clone(),
        }
    }
}

impl<R: CommandRunner, P: ProcessTable> SessionController<R, P> {
    pub fn new(runner: Arc<R>, table: Arc<P>, config: SessionConfig) -> Self {
        Self {
            runner,
            table,
            config,
        }
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Builds the shell line that launches `world` inside a new session.
    pub fn launch_command(&self, world: &WorldSession, variant: StartVariant) -> String {
        format!(
            "cd {game}/{bin}/ && screen -L -Logfile {log} -d -h {scrollback} -m -S {name} ./{exe} -console -cluster {cluster} -shard {shard}",
            game = self.config.game_dir,
            bin = variant.bin_dir(),
            log = world.world_dir.join("screen_startup.log").display(),
            scrollback = self.config.scrollback,
            name = world.name(),
            exe = variant.executable(),
            cluster = world.cluster(),
            shard = world.world_name,
        )
    }

    /// Starts `world` unless its session is already up.
    ///
    /// Dead session sockets are wiped first so a crashed world does not
    /// block its own restart.
    pub async fn start(
        &self,
        world: &WorldSession,
        variant: StartVariant,
    ) -> Result<StartOutcome, SessionError> {
        let name = world.name();
        self.wipe().await;

        if self.status(&name).await {
            tracing::info!(session = %name, "session already running, start skipped");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let command = self.launch_command(world, variant);
        self.runner.run(&command).await?.check(&command)?;
        tracing::info!(session = %name, %variant, "session started");
        Ok(StartOutcome::Spawned)
    }

    /// Shuts a world down: in-game shutdown, grace period, forced quit.
    ///
    /// Never fails. A session that is already gone makes both steps fail,
    /// which is exactly the state a stop wants to reach.
    pub async fn stop(&self, name: &SessionName) {
        if let Err(e) = self.send_line(name, "c_shutdown()").await {
            tracing::debug!(session = %name, error = %e, "shutdown command not delivered");
        }
        tokio::time::sleep(self.config.stop_grace).await;
        if let Err(e) = self.quit(name).await {
            tracing::debug!(session = %name, error = %e, "session quit failed");
        }
        tracing::info!(session = %name, "session stopped");
    }

    /// Returns `true` when a process carrying the session name is alive.
    pub async fn status(&self, name: &SessionName) -> bool {
        let command = format!("ps -ef | grep -w -- {name} | grep -v grep");
        match self.runner.run(&command).await {
            Ok(out) => out.success,
            Err(e) => {
                tracing::warn!(session = %name, error = %e, "status probe failed");
                false
            }
        }
    }

    /// Types one line into the session's console.
    pub async fn send_line(&self, name: &SessionName, line: &str) -> Result<(), SessionError> {
        let command = format!(
            "screen -S \"{name}\" -p 0 -X stuff \"{}\\n\"",
            escape_double_quoted(line)
        );
        self.runner.run(&command).await?.check(&command)?;
        tracing::debug!(session = %name, line, "console line sent");
        Ok(())
    }

    /// Force-quits the session.
    pub async fn quit(&self, name: &SessionName) -> Result<(), SessionError> {
        let command = format!("screen -S {name} -X quit");
        self.runner.run(&command).await?.check(&command)?;
        Ok(())
    }

    /// Removes dead session sockets. Failures are ignored: `screen -wipe`
    /// exits non-zero whenever there was nothing to wipe.
    pub async fn wipe(&self) {
        if let Err(e) = self.runner.run("screen -wipe").await {
            tracing::debug!(error = %e, "screen -wipe failed");
        }
    }

    /// Session names of every running world of a room.
    pub async fn running_sessions(&self, room_id: i64) -> Vec<SessionName> {
        let prefix = format!("{}_", session_prefix(room_id));
        let command = format!("ps -eo args | grep -- '-S {prefix}' | grep {SERVER_BINARY} | grep -v grep");
        let out = match self.runner.run(&command).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(room_id, error = %e, "running session lookup failed");
                return Vec::new();
            }
        };

        let mut names: Vec<SessionName> = Vec::new();
        for line in out.stdout.lines() {
            let mut words = line.split_whitespace();
            while let Some(word) = words.next() {
                if word != "-S" {
                    continue;
                }
                if let Some(name) = words.next().filter(|n| n.starts_with(&prefix)) {
                    let name = SessionName::from_raw(name);
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    /// PID of the world's server process, skipping the session wrapper
    /// itself and luajit helper processes.
    pub async fn find_pid(&self, world: &WorldSession) -> Option<u32> {
        let command = format!(
            "ps -ef | grep {SERVER_BINARY} | grep -w {cluster} | grep -w -- {shard} | grep -v luajit | grep -vi screen | grep -v grep | awk '{{print $2}}'",
            cluster = world.cluster(),
            shard = world.world_name,
        );
        let out = self.runner.run(&command).await.ok()?;
        out.stdout
            .lines()
            .find_map(|line| line.trim().parse::<u32>().ok())
    }

    /// Samples disk usage, and CPU and memory when the world is running.
    pub async fn performance_sample(&self, world: &WorldSession) -> PerformanceSample {
        let dir = world.world_dir.clone();
        let disk_bytes = tokio::task::spawn_blocking(move || dir_size(&dir))
            .await
            .unwrap_or_default();

        let mut sample = PerformanceSample {
            disk_bytes,
            ..PerformanceSample::default()
        };
        if !self.status(&world.name()).await {
            return sample;
        }
        sample.running = true;

        let Some(pid) = self.find_pid(world).await else {
            return sample;
        };
        if let Some(process) = self.table.sample(pid).await {
            sample.cpu = process.cpu;
            sample.mem_percent = process.mem_percent;
            sample.rss_mb = process.rss_mb;
        }
        sample
    }
}

/// Escapes text for use inside a double-quoted bash word.
fn escape_double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
