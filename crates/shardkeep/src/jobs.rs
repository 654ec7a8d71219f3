//! Typed job descriptions.
//!
//! Settings rows hold schedules as free text. They are turned into
//! [`RoomJob`] and [`GlobalJob`] values here, and every cadence is checked
//! before anything reaches the registry.

use shardkeep_room::{GlobalSetting, RoomSetting};
use shardkeep_scheduler::Cadence;

use crate::ShardkeepError;

/// Daily time of the backup clean job.
pub const BACKUP_CLEAN_AT: &str = "05:16:27";

/// Minutes between temporary mod download cleanups.
const MOD_DOWNLOAD_CLEAN_MINUTES: u64 = 1;

/// Minutes between system metric samples.
const SYSTEM_METRICS_MINUTES: u64 = 1;

/// Hours between public-IP refreshes.
const PUBLIC_IP_HOURS: u64 = 6;

// ---------------------------------------------------------------------------
// Room jobs
// ---------------------------------------------------------------------------

/// Scheduled work belonging to one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomJob {
    Backup { slot: usize, at: String },
    BackupClean { days: u32 },
    Restart { at: String },
    ScheduledStart { at: String },
    ScheduledStop { at: String },
    Keepalive { minutes: u64 },
    Announce { id: String, interval: u64, content: String },
}

impl RoomJob {
    /// The last segment of the job name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backup { .. } => "Backup",
            Self::BackupClean { .. } => "BackupClean",
            Self::Restart { .. } => "Restart",
            Self::ScheduledStart { .. } => "ScheduledStart",
            Self::ScheduledStop { .. } => "ScheduledStop",
            Self::Keepalive { .. } => "Keepalive",
            Self::Announce { .. } => "Announce",
        }
    }

    /// Registry name: `<room>-<slot>-Backup`, `<room>-<id>-Announce` (id
    /// without dashes) or `<room>-<kind>`.
    pub fn name(&self, room_id: i64) -> String {
        match self {
            Self::Backup { slot, .. } => format!("{room_id}-{slot}-Backup"),
            Self::Announce { id, .. } => format!("{room_id}-{}-Announce", id.replace('-', "")),
            other => format!("{room_id}-{}", other.kind()),
        }
    }

    pub fn cadence(&self) -> Result<Cadence, ShardkeepError> {
        let cadence = match self {
            Self::Backup { at, .. }
            | Self::Restart { at }
            | Self::ScheduledStart { at }
            | Self::ScheduledStop { at } => Cadence::daily_at(at)?,
            Self::BackupClean { .. } => Cadence::daily_at(BACKUP_CLEAN_AT)?,
            Self::Keepalive { minutes } => Cadence::minutes(*minutes)?,
            Self::Announce { interval, .. } => Cadence::seconds(*interval)?,
        };
        Ok(cadence)
    }
}

/// The jobs a room's settings ask for, grouped per kind.
///
/// Disabled kinds come out empty so the caller knows to delete them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomJobPlan {
    pub backups: Vec<RoomJob>,
    pub backup_clean: Option<RoomJob>,
    pub restart: Option<RoomJob>,
    pub scheduled_start: Option<RoomJob>,
    pub scheduled_stop: Option<RoomJob>,
    pub keepalive: Option<RoomJob>,
    pub announcements: Vec<RoomJob>,
}

impl RoomJobPlan {
    /// Decodes the settings and validates every cadence.
    pub fn from_setting(setting: &RoomSetting) -> Result<Self, ShardkeepError> {
        let mut plan = Self::default();

        if setting.backup_enable {
            let slots = setting.backup_slots().map_err(|source| ShardkeepError::Setting {
                field: "backupSetting",
                source,
            })?;
            plan.backups = slots
                .into_iter()
                .enumerate()
                .map(|(slot, s)| RoomJob::Backup { slot, at: s.time })
                .collect();
        }
        if setting.backup_clean_enable {
            plan.backup_clean = Some(RoomJob::BackupClean {
                days: setting.backup_clean_setting,
            });
        }
        if setting.restart_enable {
            plan.restart = Some(RoomJob::Restart {
                at: setting.restart_setting.clone(),
            });
        }
        if setting.scheduled_start_stop_enable {
            let times = setting.start_stop().map_err(|source| ShardkeepError::Setting {
                field: "scheduledStartStopSetting",
                source,
            })?;
            plan.scheduled_start = Some(RoomJob::ScheduledStart { at: times.start });
            plan.scheduled_stop = Some(RoomJob::ScheduledStop { at: times.stop });
        }
        if setting.keepalive_enable {
            plan.keepalive = Some(RoomJob::Keepalive {
                minutes: setting.keepalive_setting,
            });
        }
        let announcements = setting.announcements().map_err(|source| ShardkeepError::Setting {
            field: "announceSetting",
            source,
        })?;
        plan.announcements = announcements
            .into_iter()
            .filter(|a| a.status)
            .map(|a| RoomJob::Announce {
                id: a.id,
                interval: a.interval,
                content: a.content,
            })
            .collect();

        for job in plan.all() {
            job.cadence()?;
        }
        Ok(plan)
    }

    /// Every job the plan enables.
    pub fn all(&self) -> impl Iterator<Item = &RoomJob> {
        self.backups
            .iter()
            .chain(self.backup_clean.iter())
            .chain(self.restart.iter())
            .chain(self.scheduled_start.iter())
            .chain(self.scheduled_stop.iter())
            .chain(self.keepalive.iter())
            .chain(self.announcements.iter())
    }
}

// ---------------------------------------------------------------------------
// Global jobs
// ---------------------------------------------------------------------------

/// Scheduled work not tied to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalJob {
    /// `track_uids` also records each player's nickname in the store.
    OnlinePlayers { interval: u64, track_uids: bool },
    SystemMetrics,
    /// `restart` restarts every active room after an update.
    GameUpdate { at: String, restart: bool },
    PublicIp,
    ModDownloadClean,
}

impl GlobalJob {
    pub const ONLINE_PLAYERS: &'static str = "onlinePlayerGet";
    pub const SYSTEM_METRICS: &'static str = "systemMetricsGet";
    pub const GAME_UPDATE: &'static str = "gameUpdate";
    pub const PUBLIC_IP: &'static str = "InternetIPUpdate";
    pub const MOD_DOWNLOAD_CLEAN: &'static str = "ModDownloadClean";

    pub fn name(&self) -> &'static str {
        match self {
            Self::OnlinePlayers { .. } => Self::ONLINE_PLAYERS,
            Self::SystemMetrics => Self::SYSTEM_METRICS,
            Self::GameUpdate { .. } => Self::GAME_UPDATE,
            Self::PublicIp => Self::PUBLIC_IP,
            Self::ModDownloadClean => Self::MOD_DOWNLOAD_CLEAN,
        }
    }

    pub fn cadence(&self) -> Result<Cadence, ShardkeepError> {
        let cadence = match self {
            Self::OnlinePlayers { interval, .. } => Cadence::seconds(*interval)?,
            Self::SystemMetrics => Cadence::minutes(SYSTEM_METRICS_MINUTES)?,
            Self::GameUpdate { at, .. } => Cadence::daily_at(at)?,
            Self::PublicIp => Cadence::hours(PUBLIC_IP_HOURS)?,
            Self::ModDownloadClean => Cadence::minutes(MOD_DOWNLOAD_CLEAN_MINUTES)?,
        };
        Ok(cadence)
    }

    /// The global jobs `setting` enables. The public-IP and download
    /// cleanup jobs always run.
    pub fn enabled(setting: &GlobalSetting) -> Vec<Self> {
        let mut jobs = vec![Self::OnlinePlayers {
            interval: setting.player_get_frequency,
            track_uids: setting.uid_maintain_enable,
        }];
        if setting.sys_metrics_enable {
            jobs.push(Self::SystemMetrics);
        }
        if setting.auto_update_enable {
            jobs.push(Self::GameUpdate {
                at: setting.auto_update_setting.clone(),
                restart: setting.auto_update_restart,
            });
        }
        jobs.push(Self::PublicIp);
        jobs.push(Self::ModDownloadClean);
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting() -> RoomSetting {
        RoomSetting {
            room_id: 42,
            backup_enable: true,
            backup_setting: r#"[{"time":"06:00:00"},{"time":"18:00:00"}]"#.into(),
            restart_enable: true,
            keepalive_enable: true,
            announce_setting: r#"[
                {"id":"ab-cd","status":true,"interval":600,"content":"hello"},
                {"id":"ef","status":false,"interval":60,"content":"off"}
            ]"#
            .into(),
            ..RoomSetting::default()
        }
    }

    #[test]
    fn test_room_job_names() {
        assert_eq!(RoomJob::Backup { slot: 1, at: "06:00:00".into() }.name(42), "42-1-Backup");
        assert_eq!(RoomJob::Keepalive { minutes: 5 }.name(42), "42-Keepalive");
        let announce = RoomJob::Announce {
            id: "9f1c-22-ab".into(),
            interval: 60,
            content: String::new(),
        };
        assert_eq!(announce.name(7), "7-9f1c22ab-Announce");
    }

    #[test]
    fn test_plan_from_setting() {
        let plan = RoomJobPlan::from_setting(&setting()).unwrap();
        assert_eq!(plan.backups.len(), 2);
        assert!(plan.restart.is_some());
        assert!(plan.backup_clean.is_none());
        assert!(plan.scheduled_start.is_none());
        assert_eq!(plan.announcements.len(), 1);

        let names: Vec<String> = plan.all().map(|j| j.name(42)).collect();
        assert_eq!(
            names,
            vec!["42-0-Backup", "42-1-Backup", "42-Restart", "42-Keepalive", "42-abcd-Announce"]
        );
    }

    #[test]
    fn test_plan_rejects_bad_time() {
        let bad = RoomSetting {
            restart_setting: "25:00:00".into(),
            ..setting()
        };
        let err = RoomJobPlan::from_setting(&bad).unwrap_err();
        assert!(matches!(err, ShardkeepError::Scheduler(_)));
    }

    #[test]
    fn test_plan_rejects_zero_interval() {
        let bad = RoomSetting {
            keepalive_setting: 0,
            ..setting()
        };
        assert!(RoomJobPlan::from_setting(&bad).is_err());
    }

    #[test]
    fn test_plan_rejects_bad_json() {
        let bad = RoomSetting {
            backup_setting: "{not json".into(),
            ..setting()
        };
        let err = RoomJobPlan::from_setting(&bad).unwrap_err();
        assert!(matches!(err, ShardkeepError::Setting { field: "backupSetting", .. }));
    }

    #[test]
    fn test_global_jobs_follow_setting() {
        let names: Vec<&str> = GlobalJob::enabled(&GlobalSetting::default()).iter().map(GlobalJob::name).collect();
        assert_eq!(names, vec!["onlinePlayerGet", "systemMetricsGet", "InternetIPUpdate", "ModDownloadClean"]);

        let setting = GlobalSetting {
            sys_metrics_enable: false,
            auto_update_enable: true,
            ..GlobalSetting::default()
        };
        let names: Vec<&str> = GlobalJob::enabled(&setting).iter().map(GlobalJob::name).collect();
        assert!(names.contains(&"gameUpdate"));
        assert!(!names.contains(&"systemMetricsGet"));
    }
}
