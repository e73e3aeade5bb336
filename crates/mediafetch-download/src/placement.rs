//! Moving finished files into place and tidying up after them.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mediafetch_core::{DownloadError, DownloadResult};

/// Move a staged file to its final destination, creating parent folders.
///
/// Falls back to copy-and-delete when a rename is not possible (for
/// instance across filesystems).
pub fn place(staged: &Path, destination: &Path) -> DownloadResult<PathBuf> {
    ensure_parent(destination)?;

    if let Err(rename_err) = std::fs::rename(staged, destination) {
        tracing::debug!(
            target: "mediafetch.download",
            from = %staged.display(),
            to = %destination.display(),
            error = %rename_err,
            "Rename failed, copying instead"
        );
        // Eviction may have pruned the folder in between.
        ensure_parent(destination)?;
        std::fs::copy(staged, destination).map_err(|e| DownloadError::from_io_error(&e))?;
        remove_if_exists(staged)?;
    }

    Ok(destination.to_path_buf())
}

fn ensure_parent(destination: &Path) -> DownloadResult<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DownloadError::io("create_dir", e.to_string()))?;
    }
    Ok(())
}

/// Delete a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> DownloadResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::from_io_error(&e)),
    }
}

/// Remove `start` and its ancestors while they are empty, stopping at
/// (and never removing) `stop_at`.
pub fn remove_empty_parents(start: &Path, stop_at: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_place_creates_parents() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("staged.part");
        std::fs::write(&staged, b"data").unwrap();
        let dest = dir.path().join("Series/Show/Season 1/Show S01E01.mkv");

        let placed = place(&staged, &dest).unwrap();

        assert_eq!(placed, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
        assert!(!staged.exists());
    }

    #[test]
    fn test_place_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = place(&dir.path().join("gone"), &dir.path().join("x.mkv")).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_remove_empty_parents_stops_at_root() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a/b/c");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(dir.path().join("a/keep.txt"), b"x").unwrap();

        remove_empty_parents(&deep, dir.path());

        assert!(!dir.path().join("a/b").exists());
        assert!(dir.path().join("a").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_remove_if_exists_ignores_missing() {
        let dir = TempDir::new().unwrap();
        assert!(remove_if_exists(&dir.path().join("missing")).is_ok());
    }
}
