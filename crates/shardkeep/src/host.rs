//! Host-wide resource sampling.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, System};

use crate::stats::SystemMetrics;

/// Window over which network throughput is measured.
const NET_WINDOW: Duration = Duration::from_millis(500);

/// Produces one [`SystemMetrics`] sample. `None` when sampling failed.
pub trait HostSampler: Send + Sync + 'static {
    fn sample(&self) -> impl Future<Output = Option<SystemMetrics>> + Send;
}

/// [`HostSampler`] backed by `sysinfo`.
///
/// A sample blocks for about half a second to measure network rates, so
/// it runs on the blocking pool.
#[derive(Clone)]
pub struct SysinfoHost {
    system: Arc<Mutex<System>>,
    disk_path: PathBuf,
}

impl SysinfoHost {
    /// Disk usage is reported for the mount holding `disk_path`.
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            disk_path: disk_path.into(),
        }
    }
}

impl HostSampler for SysinfoHost {
    async fn sample(&self) -> Option<SystemMetrics> {
        let system = Arc::clone(&self.system);
        let disk_path = self.disk_path.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock();
            sys.refresh_cpu();
            let mut networks = Networks::new_with_refreshed_list();
            std::thread::sleep(NET_WINDOW.max(MINIMUM_CPU_UPDATE_INTERVAL));
            sys.refresh_cpu();
            sys.refresh_memory();
            networks.refresh();

            let (sent, received) = networks
                .iter()
                .fold((0u64, 0u64), |(tx, rx), (_, data)| (tx + data.transmitted(), rx + data.received()));
            let window = NET_WINDOW.as_secs_f64();
            let total = sys.total_memory() as f64;

            SystemMetrics {
                timestamp: chrono::Utc::now().timestamp_millis(),
                cpu: f64::from(sys.global_cpu_info().cpu_usage()),
                memory: if total > 0.0 {
                    sys.used_memory() as f64 / total * 100.0
                } else {
                    0.0
                },
                net_uplink: sent as f64 / 1024.0 / window,
                net_downlink: received as f64 / 1024.0 / window,
                disk: disk_usage(&disk_path),
            }
        })
        .await;

        match joined {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(error = %e, "host sampling task failed");
                None
            }
        }
    }
}

/// Used percentage of the disk whose mount point is the longest prefix of
/// `path`. Zero when no disk matches.
fn disk_usage(path: &Path) -> f64 {
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .filter(|d| d.total_space() > 0)
        .map(|d| {
            let used = d.total_space().saturating_sub(d.available_space());
            used as f64 / d.total_space() as f64 * 100.0
        })
        .unwrap_or(0.0)
}
