//! Console transports: how lines get in and how the log gets read.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use shardkeep_session::{CommandRunner, ProcessTable, SessionController, SessionName};

use crate::ConsoleError;

/// A bidirectional console: a write-only input and a readable log tail.
pub trait ConsoleTransport: Send + Sync + 'static {
    /// Types one line into the console. No acknowledgement is available.
    fn inject(&self, line: &str) -> impl std::future::Future<Output = Result<(), ConsoleError>> + Send;

    /// Returns up to the last `n` lines of the log, oldest first.
    fn tail_lines(
        &self,
        n: usize,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ConsoleError>> + Send;

    /// Returns the complete lines within the last `n` bytes of the log,
    /// oldest first.
    fn tail_bytes(
        &self,
        n: u64,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ConsoleError>> + Send;
}

// ---------------------------------------------------------------------------
// ScreenTransport
// ---------------------------------------------------------------------------

/// The production transport: `screen -X stuff` in, `server_log.txt` out.
pub struct ScreenTransport<R, P> {
    sessions: SessionController<R, P>,
    name: SessionName,
    log_path: PathBuf,
}

impl<R: CommandRunner, P: ProcessTable> ScreenTransport<R, P> {
    pub fn new(sessions: SessionController<R, P>, name: SessionName, log_path: PathBuf) -> Self {
        Self {
            sessions,
            name,
            log_path,
        }
    }

    pub fn session(&self) -> &SessionName {
        &self.name
    }

    async fn read_blocking<F>(&self, read: F) -> Result<Vec<String>, ConsoleError>
    where
        F: FnOnce(&Path) -> io::Result<Vec<String>> + Send + 'static,
    {
        let path = self.log_path.clone();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || read(&task_path))
            .await
            .map_err(io::Error::other)
            .and_then(|r| r)
            .map_err(|source| ConsoleError::LogUnavailable { path, source })
    }
}

impl<R: CommandRunner, P: ProcessTable> ConsoleTransport for ScreenTransport<R, P> {
    async fn inject(&self, line: &str) -> Result<(), ConsoleError> {
        self.sessions.send_line(&self.name, line).await?;
        Ok(())
    }

    async fn tail_lines(&self, n: usize) -> Result<Vec<String>, ConsoleError> {
        self.read_blocking(move |path| tail_lines(path, n)).await
    }

    async fn tail_bytes(&self, n: u64) -> Result<Vec<String>, ConsoleError> {
        self.read_blocking(move |path| tail_bytes(path, n)).await
    }
}

// ---------------------------------------------------------------------------
// File tails
// ---------------------------------------------------------------------------

const CHUNK: u64 = 8 * 1024;

/// Reads the last `n` lines of a file without loading all of it.
///
/// Chunks are read backward from the end until more than `n` newlines are
/// buffered, which guarantees the last `n` lines are complete.
pub fn tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let mut pos = file.metadata()?.len();
    let mut buf: Vec<u8> = Vec::new();

    while pos > 0 {
        let read = CHUNK.min(pos);
        pos -= read;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; read as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        if buf.iter().filter(|&&b| b == b'\n').count() > n {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| (*l).to_owned()).collect())
}

/// Reads the last `n` bytes of a file and splits them into lines.
///
/// When the window starts mid-file, the first (partial) line is dropped.
pub fn tail_bytes(path: &Path, n: u64) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(n);
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)?;

    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    if start > 0 {
        lines.next();
    }
    Ok(lines.map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(lines: usize) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let body: String = (0..lines).map(|i| format!("[00:00:00]: line {i}\n")).collect();
        std::fs::write(file.path(), body).unwrap();
        file
    }

    #[test]
    fn test_tail_lines_returns_last_lines_in_order() {
        let file = log_with(5000);
        let lines = tail_lines(file.path(), 3).unwrap();
        assert_eq!(
            lines,
            vec![
                "[00:00:00]: line 4997",
                "[00:00:00]: line 4998",
                "[00:00:00]: line 4999"
            ]
        );
    }

    #[test]
    fn test_tail_lines_short_file() {
        let file = log_with(2);
        assert_eq!(tail_lines(file.path(), 100).unwrap().len(), 2);
    }

    #[test]
    fn test_tail_bytes_drops_partial_first_line() {
        let file = log_with(1000);
        let lines = tail_bytes(file.path(), 50).unwrap();
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l.starts_with("[00:00:00]: line ")));
        assert_eq!(lines.last().unwrap(), "[00:00:00]: line 999");
    }

    #[test]
    fn test_missing_log_is_an_error() {
        assert!(tail_lines(Path::new("/no/such/server_log.txt"), 10).is_err());
    }
}
