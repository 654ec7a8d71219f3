//! Per-process resource sampling and directory sizes.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, Pid, System};

/// CPU and memory figures of one OS process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSample {
    /// CPU usage in percent of one core.
    pub cpu: f64,
    /// Resident memory as a percentage of total host memory.
    pub mem_percent: f64,
    /// Resident memory in MiB.
    pub rss_mb: f64,
}

/// Looks up resource usage for a PID.
///
/// Returns `None` when the process is gone; a vanished process between
/// the PID lookup and the sample is expected, not an error.
pub trait ProcessTable: Send + Sync + 'static {
    fn sample(&self, pid: u32) -> impl std::future::Future<Output = Option<ProcessSample>> + Send;
}

/// [`ProcessTable`] backed by `sysinfo`.
///
/// CPU usage is a delta between two refreshes, so each sample blocks for
/// `sysinfo`'s minimum update interval. That work runs on the blocking
/// pool, never on the async workers.
#[derive(Clone)]
pub struct SysinfoTable {
    system: Arc<Mutex<System>>,
}

impl SysinfoTable {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for SysinfoTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoTable {
    async fn sample(&self, pid: u32) -> Option<ProcessSample> {
        let system = Arc::clone(&self.system);
        let joined = tokio::task::spawn_blocking(move || {
            let mut sys = system.lock();
            let pid = Pid::from_u32(pid);
            if !sys.refresh_process(pid) {
                return None;
            }
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_process(pid);
            sys.refresh_memory();

            let process = sys.process(pid)?;
            let rss = process.memory() as f64;
            let total = sys.total_memory() as f64;
            Some(ProcessSample {
                cpu: f64::from(process.cpu_usage()),
                mem_percent: if total > 0.0 { rss / total * 100.0 } else { 0.0 },
                rss_mb: rss / 1024.0 / 1024.0,
            })
        })
        .await;

        match joined {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(pid, error = %e, "process sampling task failed");
                None
            }
        }
    }
}

/// Total size in bytes of all files under `path`.
///
/// Missing paths and unreadable entries count as zero. Symlinks are not
/// followed.
pub fn dir_size(path: &Path) -> u64 {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return 0;
    };
    if meta.is_file() {
        return meta.len();
    }
    if !meta.is_dir() {
        return 0;
    }

    let mut total = 0;
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                stack.push(entry.path());
            } else if meta.is_file() {
                total += meta.len();
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_size_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        std::fs::create_dir_all(dir.path().join("save/session")).unwrap();
        std::fs::write(dir.path().join("save/session/b"), b"123").unwrap();
        assert_eq!(dir_size(dir.path()), 8);
    }

    #[test]
    fn test_dir_size_missing_path_is_zero() {
        assert_eq!(dir_size(Path::new("/definitely/not/here")), 0);
    }

    #[tokio::test]
    async fn test_sysinfo_samples_own_process() {
        let table = SysinfoTable::new();
        let sample = table.sample(std::process::id()).await.unwrap();
        assert!(sample.rss_mb > 0.0);
        assert!(sample.mem_percent > 0.0);
    }
}
