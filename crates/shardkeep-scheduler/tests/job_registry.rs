//! Integration tests for the job registry.
//!
//! Time is paused and auto-advanced, so interval jobs fire on exact
//! boundaries and tests can count fires deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use shardkeep_scheduler::{Cadence, FnJob, Job, JobRegistry};

// =========================================================================
// Helpers
// =========================================================================

struct Counter(Arc<AtomicUsize>);

impl Job for Counter {
    async fn run(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn counter() -> (Counter, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    (Counter(Arc::clone(&hits)), hits)
}

fn every(secs: u64) -> Cadence {
    Cadence::seconds(secs).unwrap()
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_interval_fires_immediately_then_periodically() {
    let registry = JobRegistry::new();
    let (job, hits) = counter();
    registry.upsert("onlinePlayerGet", job, every(10));

    tokio::time::sleep(Duration::from_secs(35)).await;
    // t = 0, 10, 20, 30
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(registry.info("onlinePlayerGet").unwrap().fires, 4);
}

#[tokio::test(start_paused = true)]
async fn test_fn_job_adapter() {
    let registry = JobRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    registry.upsert(
        "ModDownloadClean",
        FnJob(move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }),
        Cadence::minutes(1).unwrap(),
    );

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

// =========================================================================
// Upsert and delete
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_double_upsert_leaves_one_timer() {
    let registry = JobRegistry::new();
    let (first, first_hits) = counter();
    let (second, second_hits) = counter();

    assert!(!registry.upsert("42-Keepalive", first, every(10)));
    assert!(registry.upsert("42-Keepalive", second, every(10)));
    assert_eq!(registry.len(), 1);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(first_hits.load(Ordering::SeqCst), 0);
    assert_eq!(second_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_stops_future_fires() {
    let registry = JobRegistry::new();
    let (job, hits) = counter();
    registry.upsert("7-0-Backup", job, every(10));

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(registry.delete("7-0-Backup"));
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(!registry.contains("7-0-Backup"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_unknown_is_noop() {
    let registry = JobRegistry::new();
    let (job, _) = counter();
    registry.upsert("1-Restart", job, Cadence::daily_at("06:30:00").unwrap());

    assert!(!registry.delete("no-such-job"));
    assert_eq!(registry.names(), vec!["1-Restart"]);
}

struct Slow {
    finished: Arc<AtomicBool>,
}

impl Job for Slow {
    async fn run(&self) {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.finished.store(true, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_run_finishes_after_delete() {
    let registry = JobRegistry::new();
    let finished = Arc::new(AtomicBool::new(false));
    registry.upsert(
        "3-Restart",
        Slow {
            finished: Arc::clone(&finished),
        },
        every(60),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    registry.delete("3-Restart");
    assert!(!finished.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(finished.load(Ordering::SeqCst));
}

// =========================================================================
// Lookups by naming convention
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_room_lookup_is_exact() {
    let registry = JobRegistry::new();
    for name in ["42-0-Backup", "42-1-Backup", "42-Restart", "420-0-Backup", "4-Restart", "onlinePlayerGet"] {
        let (job, _) = counter();
        registry.upsert(name, job, Cadence::hours(1).unwrap());
    }

    assert_eq!(registry.jobs_by_room(42), vec!["42-0-Backup", "42-1-Backup", "42-Restart"]);
    assert_eq!(registry.jobs_by_type(42, "Backup"), vec!["42-0-Backup", "42-1-Backup"]);
    assert_eq!(registry.jobs_by_room(420), vec!["420-0-Backup"]);
    assert!(registry.jobs_by_room(9).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clear_cancels_everything() {
    let registry = JobRegistry::new();
    let (a, a_hits) = counter();
    let (b, b_hits) = counter();
    registry.upsert("1-Keepalive", a, every(10));
    registry.upsert("2-Keepalive", b, every(10));
    tokio::time::sleep(Duration::from_secs(1)).await;

    registry.clear();
    assert!(registry.is_empty());
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    assert_eq!(b_hits.load(Ordering::SeqCst), 1);
}
