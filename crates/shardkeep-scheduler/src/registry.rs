//! The job registry: one timer task per job name.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::{Cadence, Job};

/// A live job: its cadence, a cancel handle and a fire counter.
struct ScheduledJob {
    cadence: Cadence,
    fires: Arc<AtomicU64>,
    // Dropping the sender resolves the receiver, which stops the timer.
    _cancel: oneshot::Sender<()>,
}

/// Snapshot of one registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub name: String,
    pub cadence: Cadence,
    pub fires: u64,
}

/// Named recurring jobs with hot add, replace and remove.
///
/// Room jobs are named `<roomID>-<discriminator>-<type>` or
/// `<roomID>-<type>`; [`jobs_by_room`](Self::jobs_by_room) and
/// [`jobs_by_type`](Self::jobs_by_type) rely on that convention. Global jobs
/// use names without a numeric first segment.
///
/// Cancelling a job (by replacing or deleting it) stops future fires. A run
/// already in progress is allowed to finish.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job` under `name`, cancelling any job already there.
    ///
    /// Returns `true` when an existing job was replaced. Must be called
    /// from within a Tokio runtime.
    pub fn upsert<J: Job>(&self, name: impl Into<String>, job: J, cadence: Cadence) -> bool {
        let name = name.into();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let fires = Arc::new(AtomicU64::new(0));

        let mut jobs = self.jobs.lock();
        let replaced = jobs
            .insert(
                name.clone(),
                ScheduledJob {
                    cadence,
                    fires: Arc::clone(&fires),
                    _cancel: cancel_tx,
                },
            )
            .is_some();
        drop(jobs);

        if replaced {
            debug!(job = %name, "existing job replaced");
        }
        info!(job = %name, %cadence, "job scheduled");
        tokio::spawn(drive(name, job, cadence, fires, cancel_rx));
        replaced
    }

    /// Cancels and removes a job. Unknown names are a no-op.
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.jobs.lock().remove(name).is_some();
        if removed {
            info!(job = %name, "job deleted");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// All job names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn info(&self, name: &str) -> Option<JobInfo> {
        self.jobs.lock().get(name).map(|job| JobInfo {
            name: name.to_owned(),
            cadence: job.cadence,
            fires: job.fires.load(Ordering::Relaxed),
        })
    }

    /// Names of every job belonging to `room_id`, sorted.
    ///
    /// The first `-` separated segment must equal the id exactly, so room
    /// 42 never matches room 420.
    pub fn jobs_by_room(&self, room_id: i64) -> Vec<String> {
        let id = room_id.to_string();
        let mut names: Vec<String> = self
            .jobs
            .lock()
            .keys()
            .filter(|name| room_segment(name) == id)
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Names of the jobs of `room_id` whose name ends with `job_type`.
    pub fn jobs_by_type(&self, room_id: i64, job_type: &str) -> Vec<String> {
        self.jobs_by_room(room_id)
            .into_iter()
            .filter(|name| name.ends_with(job_type))
            .collect()
    }

    /// Cancels every job.
    pub fn clear(&self) {
        let count = {
            let mut jobs = self.jobs.lock();
            let count = jobs.len();
            jobs.clear();
            count
        };
        info!(count, "all jobs cancelled");
    }
}

fn room_segment(name: &str) -> &str {
    name.split('-').next().unwrap_or_default()
}

/// Timer loop for one job. Ends when the cancel sender is dropped.
async fn drive<J: Job>(
    name: String,
    job: J,
    cadence: Cadence,
    fires: Arc<AtomicU64>,
    mut cancel: oneshot::Receiver<()>,
) {
    let mut ticker = cadence.period().map(|period| {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    loop {
        let next = async {
            match (&mut ticker, cadence) {
                (Some(interval), _) => {
                    interval.tick().await;
                }
                (None, Cadence::DailyAt(at)) => time::sleep(Cadence::until_next_daily(at)).await,
                (None, Cadence::Every { .. }) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = &mut cancel => break,
            () = next => {}
        }

        let count = fires.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(job = %name, count, "job fired");
        job.run().await;
    }
    debug!(job = %name, "job timer stopped");
}
