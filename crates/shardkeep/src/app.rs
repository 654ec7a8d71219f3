//! The daemon core: the job registry, the statistics and every job body.
//!
//! [`App`] is a cheap handle around shared state. Each registered job owns
//! a clone and calls back into it on every fire. Room records are read from
//! the [`RoomStore`] on each run, so edits made between fires are picked
//! up without re-registering anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use shardkeep_codec::SERVER_APP_ID;
use shardkeep_room::{GameController, GlobalSetting, OperationOutcome, Platform, Room, RoomSetting};
use shardkeep_scheduler::{FnJob, JobRegistry};
use shardkeep_session::{CommandRunner, ProcessTable, SessionController};
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::host::HostSampler;
use crate::jobs::{GlobalJob, RoomJob, RoomJobPlan};
use crate::public_ip::{self, PublicIp};
use crate::stats::{MetricsRing, OnlineTime, PlayerSnapshot, PlayerStatistics};
use crate::store::{RoomStore, UidEntry};
use crate::{ShardkeepError, outcome, version};

/// Pause between two rooms restarted after a game update.
const UPDATE_RESTART_GAP: Duration = Duration::from_secs(5);

const RESTART_NOTICE_ZH: &str = "自动重启任务触发：将在1分钟后重启服务器，在线玩家请在5分钟后重连";
const RESTART_NOTICE_EN: &str =
    "Automatic restart task triggered: The server will restart in 1 minute. Online players, please reconnect after 5 minutes";
const STOP_NOTICE_ZH: &str = "自动关机任务触发：将在1分钟后关闭服务器";
const STOP_NOTICE_EN: &str = "Automatic shutdown task triggered: The server will restart in 1 minute";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

struct Inner<R, P, S, H> {
    config: ControlConfig,
    platform: Platform<R, P>,
    store: Arc<S>,
    host: H,
    jobs: Arc<JobRegistry>,
    players: PlayerStatistics,
    online_time: OnlineTime,
    metrics: MetricsRing,
    public_ip: PublicIp,
    updating: AtomicBool,
}

/// Shared daemon state.
pub struct App<R, P, S, H> {
    inner: Arc<Inner<R, P, S, H>>,
}

impl<R, P, S, H> Clone for App<R, P, S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: CommandRunner, P: ProcessTable, S: RoomStore, H: HostSampler> App<R, P, S, H> {
    pub fn new(
        config: ControlConfig,
        sessions: SessionController<R, P>,
        store: Arc<S>,
        host: H,
    ) -> Result<Self, ShardkeepError> {
        let platform = Platform::new(
            sessions,
            config.paths.clone(),
            config.console.clone(),
            config.http_timeout(),
        )?;
        let defaults = GlobalSetting::default();
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                platform,
                store,
                host,
                jobs: Arc::new(JobRegistry::new()),
                players: PlayerStatistics::new(defaults.player_get_frequency),
                online_time: OnlineTime::new(),
                metrics: MetricsRing::new(defaults.sys_metrics_setting),
                public_ip: PublicIp::new(),
                updating: AtomicBool::new(false),
            }),
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &ControlConfig {
        &self.inner.config
    }

    pub fn platform(&self) -> &Platform<R, P> {
        &self.inner.platform
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.inner.jobs
    }

    pub fn players(&self) -> &PlayerStatistics {
        &self.inner.players
    }

    pub fn online_time(&self) -> &OnlineTime {
        &self.inner.online_time
    }

    pub fn metrics(&self) -> &MetricsRing {
        &self.inner.metrics
    }

    pub fn public_ip(&self) -> String {
        self.inner.public_ip.get()
    }

    // -- startup ------------------------------------------------------------

    /// Registers the global jobs and the jobs of every active room.
    ///
    /// A room whose settings do not validate is skipped with a warning;
    /// the other rooms still get their jobs.
    pub async fn start(&self) -> Result<(), ShardkeepError> {
        self.register_global_jobs().await?;
        for room in self.active_rooms().await? {
            if let Err(e) = self.sync_room_jobs(room.id).await {
                warn!(room_id = room.id, error = %e, "room jobs not registered");
            }
        }
        info!(jobs = self.inner.jobs.len(), "scheduler started");
        Ok(())
    }

    /// Cancels every job. Runs in progress finish on their own.
    pub fn shutdown(&self) {
        self.inner.jobs.clear();
    }

    async fn active_rooms(&self) -> Result<Vec<Room>, ShardkeepError> {
        let mut rooms = self.inner.store.rooms().await?;
        rooms.retain(|r| r.status);
        Ok(rooms)
    }

    // -- controllers --------------------------------------------------------

    /// A controller over the stored records of a room.
    pub async fn controller(&self, room_id: i64) -> Result<GameController<R, P>, ShardkeepError> {
        let room = self
            .inner
            .store
            .room(room_id)
            .await?
            .ok_or(ShardkeepError::RoomNotFound(room_id))?;
        self.controller_for(room).await
    }

    async fn controller_for(&self, room: Room) -> Result<GameController<R, P>, ShardkeepError> {
        let worlds = self.inner.store.worlds(room.id).await?;
        let setting = self.inner.store.room_setting(room.id).await?;
        Ok(GameController::new(
            self.inner.platform.clone(),
            room,
            worlds,
            setting,
            self.inner.config.lang.clone(),
        ))
    }

    /// Writes back the records a controller may have edited.
    pub async fn persist(&self, controller: GameController<R, P>) -> Result<(), ShardkeepError> {
        let (room, worlds, setting) = controller.into_parts();
        let room_id = room.id;
        self.inner.store.save_room(room).await?;
        self.inner.store.save_worlds(room_id, worlds).await?;
        self.inner.store.save_room_setting(setting).await
    }

    // -----------------------------------------------------------------------
    // Global jobs
    // -----------------------------------------------------------------------

    /// Registers every global job the stored settings enable.
    pub async fn register_global_jobs(&self) -> Result<(), ShardkeepError> {
        let setting = self.inner.store.global_setting().await?;
        let jobs = GlobalJob::enabled(&setting);
        for job in &jobs {
            job.cadence()?;
        }
        self.inner.players.set_interval(setting.player_get_frequency);
        self.inner.metrics.set_hours(setting.sys_metrics_setting);
        for job in jobs {
            self.schedule_global_job(job)?;
        }
        Ok(())
    }

    fn schedule_global_job(&self, job: GlobalJob) -> Result<(), ShardkeepError> {
        let cadence = job.cadence()?;
        let name = job.name();
        let app = self.clone();
        let job = Arc::new(job);
        self.inner.jobs.upsert(
            name,
            FnJob(move || {
                let app = app.clone();
                let job = Arc::clone(&job);
                async move {
                    if let Err(e) = app.run_global_job(&job).await {
                        warn!(job = name, error = %e, "job run failed");
                    }
                }
            }),
            cadence,
        );
        Ok(())
    }

    /// One run of a global job.
    pub async fn run_global_job(&self, job: &GlobalJob) -> Result<(), ShardkeepError> {
        match job {
            GlobalJob::OnlinePlayers { interval, track_uids } => self.poll_online_players(*interval, *track_uids).await,
            GlobalJob::SystemMetrics => {
                self.sample_system_metrics().await;
                Ok(())
            }
            GlobalJob::GameUpdate { restart, .. } => self.check_game_update(*restart).await.map(|_| ()),
            GlobalJob::PublicIp => self.refresh_public_ip().await.map(|_| ()),
            GlobalJob::ModDownloadClean => self.clean_mod_downloads().await.map(|_| ()),
        }
    }

    /// Records who is online in each active room.
    ///
    /// Every player seen adds `interval` seconds to their online time.
    /// A room where no world answered is recorded with no players.
    pub async fn poll_online_players(&self, interval: u64, track_uids: bool) -> Result<(), ShardkeepError> {
        let timestamp = now_millis();
        for room in self.active_rooms().await? {
            let room_id = room.id;
            let controller = match self.controller_for(room).await {
                Ok(controller) => controller,
                Err(e) => {
                    warn!(room_id, error = %e, "room skipped in player poll");
                    continue;
                }
            };
            let players = controller.online_players().await.unwrap_or_default();
            for player in &players {
                self.inner.online_time.add(room_id, &player.nickname, interval);
                if track_uids {
                    self.inner
                        .store
                        .upsert_uid(UidEntry {
                            uid: player.uid.clone(),
                            nickname: player.nickname.clone(),
                            room_id,
                        })
                        .await?;
                }
            }
            debug!(room_id, players = players.len(), "players polled");
            self.inner.players.record(room_id, PlayerSnapshot { timestamp, players });
        }
        Ok(())
    }

    pub async fn sample_system_metrics(&self) {
        match self.inner.host.sample().await {
            Some(sample) => self.inner.metrics.record(sample),
            None => debug!("system metrics sample skipped"),
        }
    }

    /// Updates the game when the published build is newer than the
    /// installed one. Returns `true` when an update ran.
    ///
    /// Only one check runs at a time; a second caller returns `false`.
    pub async fn check_game_update(&self, restart: bool) -> Result<bool, ShardkeepError> {
        if self.inner.updating.swap(true, Ordering::AcqRel) {
            info!("game update already running");
            return Ok(false);
        }
        let result = self.update_if_outdated(restart).await;
        self.inner.updating.store(false, Ordering::Release);
        result
    }

    async fn update_if_outdated(&self, restart: bool) -> Result<bool, ShardkeepError> {
        let platform = &self.inner.platform;
        let local = version::local_version(&platform.paths.version_file()).await?;
        let latest = version::server_version(&platform.http, &self.inner.config.version_url).await?;
        if local >= latest {
            debug!(local, latest, "game is up to date");
            return Ok(false);
        }

        info!(local, latest, "game update found");
        self.update_game().await?;
        if restart {
            self.restart_active_rooms().await?;
        }
        Ok(true)
    }

    /// Runs steamcmd over the game install.
    pub async fn update_game(&self) -> Result<(), ShardkeepError> {
        let paths = &self.inner.platform.paths;
        let command = format!(
            "cd {} && ./steamcmd.sh +login anonymous +force_install_dir {} +app_update {SERVER_APP_ID} validate +quit",
            paths.steamcmd_dir().display(),
            paths.game_dir().display(),
        );
        self.inner.platform.sessions.runner().run(&command).await?.check(&command)?;
        info!("game updated");
        Ok(())
    }

    /// Stops and starts each active room, one room at a time.
    async fn restart_active_rooms(&self) -> Result<(), ShardkeepError> {
        for (i, room) in self.active_rooms().await?.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(UPDATE_RESTART_GAP).await;
            }
            let room_id = room.id;
            if let Err(e) = self.restart_room(room_id).await {
                warn!(room_id, error = %e, "room not restarted after update");
            }
        }
        Ok(())
    }

    pub async fn refresh_public_ip(&self) -> Result<String, ShardkeepError> {
        let ip = public_ip::lookup(&self.inner.platform.http, &self.inner.config.ip_providers).await?;
        if ip != self.inner.public_ip.get() {
            info!(ip = %ip, "public ip changed");
        }
        self.inner.public_ip.set(ip.clone());
        Ok(ip)
    }

    /// Removes leftover UGC downloads. Skipped while any download runs.
    /// Returns `true` when something was removed.
    pub async fn clean_mod_downloads(&self) -> Result<bool, ShardkeepError> {
        let active = self.inner.platform.downloads.active();
        if active > 0 {
            debug!(active, "downloads running, cleanup skipped");
            return Ok(false);
        }
        let dir = self.inner.platform.paths.ugc_download_root();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "temporary mod downloads removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShardkeepError::io(dir)(e)),
        }
    }

    /// Saves new global settings and brings the global jobs in line.
    pub async fn update_global_settings(&self, setting: GlobalSetting) -> OperationOutcome<()> {
        outcome(self.apply_global_settings(setting).await)
    }

    async fn apply_global_settings(&self, setting: GlobalSetting) -> Result<(), ShardkeepError> {
        let jobs = GlobalJob::enabled(&setting);
        for job in &jobs {
            job.cadence()?;
        }
        let previous = self.inner.store.global_setting().await?;
        self.inner.store.save_global_setting(setting.clone()).await?;

        for job in jobs {
            match job {
                GlobalJob::OnlinePlayers { .. }
                    if previous.player_get_frequency == setting.player_get_frequency
                        && previous.uid_maintain_enable == setting.uid_maintain_enable
                        && self.inner.jobs.contains(GlobalJob::ONLINE_PLAYERS) => {}
                GlobalJob::OnlinePlayers { .. } => {
                    self.inner.players.set_interval(setting.player_get_frequency);
                    self.schedule_global_job(job)?;
                }
                GlobalJob::SystemMetrics => {
                    self.inner.metrics.set_hours(setting.sys_metrics_setting);
                    self.schedule_global_job(job)?;
                }
                GlobalJob::GameUpdate { .. } => self.schedule_global_job(job)?,
                GlobalJob::PublicIp | GlobalJob::ModDownloadClean => {}
            }
        }
        if !setting.sys_metrics_enable {
            self.inner.jobs.delete(GlobalJob::SYSTEM_METRICS);
            self.inner.metrics.clear();
        }
        if !setting.auto_update_enable {
            self.inner.jobs.delete(GlobalJob::GAME_UPDATE);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Room jobs
    // -----------------------------------------------------------------------

    /// Brings the registered jobs of a room in line with its settings.
    ///
    /// Settings are validated first; an invalid schedule leaves the
    /// registry untouched.
    pub async fn sync_room_jobs(&self, room_id: i64) -> Result<(), ShardkeepError> {
        let setting = self.inner.store.room_setting(room_id).await?;
        let plan = RoomJobPlan::from_setting(&setting)?;
        let jobs = &self.inner.jobs;

        let wanted: Vec<String> = plan.backups.iter().map(|j| j.name(room_id)).collect();
        for job in plan.backups {
            self.schedule_room_job(room_id, job)?;
        }
        for name in jobs.jobs_by_type(room_id, "-Backup") {
            if !wanted.contains(&name) {
                jobs.delete(&name);
            }
        }

        for (kind, job) in [
            ("BackupClean", plan.backup_clean),
            ("Restart", plan.restart),
            ("ScheduledStart", plan.scheduled_start),
            ("ScheduledStop", plan.scheduled_stop),
            ("Keepalive", plan.keepalive),
        ] {
            match job {
                Some(job) => self.schedule_room_job(room_id, job)?,
                None => {
                    jobs.delete(&format!("{room_id}-{kind}"));
                }
            }
        }

        for name in jobs.jobs_by_type(room_id, "-Announce") {
            jobs.delete(&name);
        }
        for job in plan.announcements {
            self.schedule_room_job(room_id, job)?;
        }

        debug!(room_id, jobs = jobs.jobs_by_room(room_id).len(), "room jobs synced");
        Ok(())
    }

    fn schedule_room_job(&self, room_id: i64, job: RoomJob) -> Result<(), ShardkeepError> {
        let cadence = job.cadence()?;
        let name = job.name(room_id);
        let app = self.clone();
        let job = Arc::new(job);
        let job_name: Arc<str> = Arc::from(name.as_str());
        self.inner.jobs.upsert(
            name,
            FnJob(move || {
                let app = app.clone();
                let job = Arc::clone(&job);
                let name = Arc::clone(&job_name);
                async move {
                    if let Err(e) = app.run_room_job(room_id, &job).await {
                        warn!(job = %name, error = %e, "job run failed");
                    }
                }
            }),
            cadence,
        );
        Ok(())
    }

    fn remove_room_jobs(&self, room_id: i64) -> usize {
        let names = self.inner.jobs.jobs_by_room(room_id);
        for name in &names {
            self.inner.jobs.delete(name);
        }
        names.len()
    }

    /// One run of a room job.
    pub async fn run_room_job(&self, room_id: i64, job: &RoomJob) -> Result<(), ShardkeepError> {
        match job {
            RoomJob::Backup { .. } => {
                let name = self.controller(room_id).await?.backup().await?;
                info!(room_id, file = %name.file_name(), "scheduled backup written");
            }
            RoomJob::BackupClean { days } => {
                let removed = self.controller(room_id).await?.clean_backups(*days).await?;
                info!(room_id, removed, days, "old backups cleaned");
            }
            RoomJob::Restart { .. } => {
                let controller = self.controller(room_id).await?;
                notify(&controller, &[RESTART_NOTICE_ZH, RESTART_NOTICE_EN]).await;
                self.after_delay(room_id, RoomAction::Restart);
            }
            RoomJob::ScheduledStart { .. } => {
                self.controller(room_id).await?.start_all().await?;
            }
            RoomJob::ScheduledStop { .. } => {
                let controller = self.controller(room_id).await?;
                notify(&controller, &[STOP_NOTICE_ZH, STOP_NOTICE_EN]).await;
                self.after_delay(room_id, RoomAction::Stop);
            }
            RoomJob::Keepalive { .. } => {
                self.keepalive(room_id).await?;
            }
            RoomJob::Announce { content, .. } => {
                self.controller(room_id).await?.announce(content).await?;
            }
        }
        Ok(())
    }

    /// Runs `action` once the restart delay has passed, without holding up
    /// the job that asked for it.
    fn after_delay(&self, room_id: i64, action: RoomAction) {
        let app = self.clone();
        let delay = self.inner.config.restart_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = match action {
                RoomAction::Restart => app.restart_room(room_id).await,
                RoomAction::Stop => app.stop_room(room_id).await,
            };
            if let Err(e) = result {
                warn!(room_id, ?action, error = %e, "delayed room action failed");
            }
        });
    }

    async fn restart_room(&self, room_id: i64) -> Result<(), ShardkeepError> {
        let controller = self.controller(room_id).await?;
        controller.stop_all().await;
        controller.start_all().await?;
        Ok(())
    }

    async fn stop_room(&self, room_id: i64) -> Result<(), ShardkeepError> {
        self.controller(room_id).await?.stop_all().await;
        Ok(())
    }

    /// Restarts every world whose log clock has not moved since the last
    /// check. Returns how many worlds were restarted.
    ///
    /// The clock comes from the world's log, so a world whose session died
    /// still reports its last clock and is restarted once that clock stops
    /// moving. Only worlds without a timestamped log line are skipped. A
    /// failed restart is logged and the pass goes on; new clock values are
    /// always stored for the next check.
    pub async fn keepalive(&self, room_id: i64) -> Result<usize, ShardkeepError> {
        let mut controller = self.controller(room_id).await?;
        let known: Vec<(i64, String)> = controller
            .worlds()
            .iter()
            .map(|w| (w.id, w.last_alive_time.clone()))
            .collect();

        let mut restarted = 0;
        let mut changed = false;
        for (world_id, stored) in known {
            let seen = match controller.last_alive(world_id).await {
                Ok(seen) => seen,
                Err(e) => {
                    debug!(room_id, world_id, error = %e, "no keepalive answer");
                    continue;
                }
            };
            if seen == stored {
                warn!(room_id, world_id, last_alive = %seen, "world stalled, restarting");
                if let Err(e) = controller.stop_world(world_id).await {
                    warn!(room_id, world_id, error = %e, "stalled world did not stop");
                }
                match controller.start_world(world_id).await {
                    Ok(_) => restarted += 1,
                    Err(e) => warn!(room_id, world_id, error = %e, "stalled world did not start"),
                }
            } else {
                controller.set_last_alive(world_id, seen)?;
                changed = true;
            }
        }

        if changed {
            let worlds = controller.worlds().to_vec();
            self.inner.store.save_worlds(room_id, worlds).await?;
        }
        Ok(restarted)
    }

    // -----------------------------------------------------------------------
    // Room lifecycle
    // -----------------------------------------------------------------------

    /// Marks a room active, writes its config files and registers its jobs.
    pub async fn activate_room(&self, room_id: i64) -> OperationOutcome<()> {
        outcome(self.activate(room_id).await)
    }

    async fn activate(&self, room_id: i64) -> Result<(), ShardkeepError> {
        let setting = self.inner.store.room_setting(room_id).await?;
        RoomJobPlan::from_setting(&setting)?;

        let mut controller = self.controller(room_id).await?;
        controller.save_all().await?;
        let (mut room, worlds, setting) = controller.into_parts();
        room.status = true;
        self.inner.store.save_room(room).await?;
        self.inner.store.save_worlds(room_id, worlds).await?;
        self.inner.store.save_room_setting(setting).await?;

        self.sync_room_jobs(room_id).await?;
        info!(room_id, "room activated");
        Ok(())
    }

    /// Stops every world, drops the room's jobs and statistics and marks it
    /// inactive.
    pub async fn deactivate_room(&self, room_id: i64) -> OperationOutcome<()> {
        outcome(self.deactivate(room_id).await)
    }

    async fn deactivate(&self, room_id: i64) -> Result<(), ShardkeepError> {
        let controller = self.controller(room_id).await?;
        controller.stop_all().await;
        let removed = self.remove_room_jobs(room_id);
        self.inner.players.drop_room(room_id);

        let (mut room, _, _) = controller.into_parts();
        room.status = false;
        self.inner.store.save_room(room).await?;
        info!(room_id, jobs = removed, "room deactivated");
        Ok(())
    }

    /// Deactivates a room, then deletes its files, records and counters.
    pub async fn remove_room(&self, room_id: i64) -> OperationOutcome<()> {
        outcome(self.remove(room_id).await)
    }

    async fn remove(&self, room_id: i64) -> Result<(), ShardkeepError> {
        let controller = self.controller(room_id).await?;
        self.remove_room_jobs(room_id);
        self.inner.players.drop_room(room_id);
        controller.delete_room().await?;

        self.inner.store.delete_room(room_id).await?;
        self.inner.online_time.remove_room(room_id);
        info!(room_id, "room removed");
        Ok(())
    }

    /// Saves new room settings and, for an active room, re-syncs its jobs.
    pub async fn update_room_settings(&self, setting: RoomSetting) -> OperationOutcome<()> {
        outcome(self.apply_room_settings(setting).await)
    }

    async fn apply_room_settings(&self, setting: RoomSetting) -> Result<(), ShardkeepError> {
        RoomJobPlan::from_setting(&setting)?;
        let room_id = setting.room_id;
        let room = self
            .inner
            .store
            .room(room_id)
            .await?
            .ok_or(ShardkeepError::RoomNotFound(room_id))?;
        self.inner.store.save_room_setting(setting).await?;
        if room.status {
            self.sync_room_jobs(room_id).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum RoomAction {
    Restart,
    Stop,
}

/// Posts each notice as a system message. A room with no running world
/// has nobody to tell, so failures are only logged.
async fn notify<R: CommandRunner, P: ProcessTable>(controller: &GameController<R, P>, notices: &[&str]) {
    for notice in notices {
        if let Err(e) = controller.system_message(notice).await {
            debug!(room_id = controller.room().id, error = %e, "notice not delivered");
        }
    }
}
