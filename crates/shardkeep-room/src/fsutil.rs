//! Small filesystem helpers shared by the controller modules.
//!
//! All of these are synchronous. Async callers go through [`blocking`].

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::RoomError;

/// Runs blocking filesystem work on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, RoomError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RoomError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| RoomError::Io {
        path: Default::default(),
        source: io::Error::other(e),
    })?
}

/// Writes `contents`, creating parent directories and truncating.
pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), RoomError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(RoomError::io(parent))?;
    }
    fs::write(path, contents).map_err(RoomError::io(path))
}

pub(crate) fn ensure_dir(path: &Path) -> Result<(), RoomError> {
    fs::create_dir_all(path).map_err(RoomError::io(path))
}

/// Reads a file, or `None` when it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, RoomError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RoomError::io(path)(e)),
    }
}

pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<(), RoomError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(RoomError::io(path)(e)),
        _ => Ok(()),
    }
}

pub(crate) fn remove_file_if_exists(path: &Path) -> Result<(), RoomError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(RoomError::io(path)(e)),
        _ => Ok(()),
    }
}

/// Names of the regular files in `dir`, sorted. A missing dir is empty.
pub(crate) fn file_names(dir: &Path) -> Result<Vec<String>, RoomError> {
    entries(dir, false)
}

/// Names of the subdirectories of `dir`, sorted. A missing dir is empty.
pub(crate) fn dir_names(dir: &Path) -> Result<Vec<String>, RoomError> {
    entries(dir, true)
}

fn entries(dir: &Path, dirs: bool) -> Result<Vec<String>, RoomError> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RoomError::io(dir)(e)),
    };
    let mut names = Vec::new();
    for entry in read {
        let entry = entry.map_err(RoomError::io(dir))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir == dirs {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Recursively copies `from` into a new directory `to`.
pub(crate) fn copy_dir(from: &Path, to: &Path) -> Result<(), RoomError> {
    fs::create_dir_all(to).map_err(RoomError::io(to))?;
    for entry in fs::read_dir(from).map_err(RoomError::io(from))? {
        let entry = entry.map_err(RoomError::io(from))?;
        let target = to.join(entry.file_name());
        if entry.file_type().map_err(RoomError::io(entry.path()))?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(RoomError::io(&target))?;
        }
    }
    Ok(())
}

pub(crate) fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub(crate) fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Keeps the first occurrence of each item.
pub(crate) fn dedup_keep_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parents_and_read_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_file(&path, "x").unwrap();
        assert_eq!(read_optional(&path).unwrap().as_deref(), Some("x"));
        assert_eq!(read_optional(&dir.path().join("none")).unwrap(), None);
    }

    #[test]
    fn test_listing_splits_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("b.txt"), "").unwrap();
        write_file(&dir.path().join("a.txt"), "").unwrap();
        ensure_dir(&dir.path().join("Master")).unwrap();

        assert_eq!(file_names(dir.path()).unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(dir_names(dir.path()).unwrap(), vec!["Master"]);
        assert!(file_names(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_copy_dir_recurses() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("src/modinfo.lua"), "name = 'x'").unwrap();
        write_file(&dir.path().join("src/scripts/main.lua"), "").unwrap();

        copy_dir(&dir.path().join("src"), &dir.path().join("dst")).unwrap();
        assert!(dir.path().join("dst/scripts/main.lua").exists());
        assert_eq!(file_size(&dir.path().join("dst/modinfo.lua")), 10);
    }

    #[test]
    fn test_removals_tolerate_missing() {
        let dir = tempfile::tempdir().unwrap();
        remove_dir_if_exists(&dir.path().join("nope")).unwrap();
        remove_file_if_exists(&dir.path().join("nope.txt")).unwrap();
    }

    #[test]
    fn test_dedup_keep_order() {
        let items = vec!["b".to_owned(), "a".into(), "b".into(), "c".into(), "a".into()];
        assert_eq!(dedup_keep_order(items), vec!["b", "a", "c"]);
    }
}
