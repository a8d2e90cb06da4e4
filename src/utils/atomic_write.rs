//! Atomic file write utility.
//!
//! Single implementation of the write-to-temp-then-rename pattern used for
//! the download history file.
//!
//! Invariants:
//! - Content goes to a sibling `.tmp` file first; an atomic rename replaces
//!   the target.
//! - On rename failure the temp file is removed so no stale artifact remains.
//! - Parent directories are created if absent.

use anyhow::Result;
use std::path::Path;
use tracing::error;

/// Atomically write `content` to `path` via a temporary file and rename.
///
/// # Errors
/// Returns an error if the temp file cannot be written or the rename fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp);

    std::fs::write(&tmp_path, content).map_err(|e| {
        error!(
            event = "atomic_write_failure",
            path = %tmp_path.display(),
            error = %e,
            "Failed to write temp file"
        );
        e
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        error!(
            event = "atomic_rename_failure",
            from = %tmp_path.display(),
            to = %path.display(),
            error = %e,
            "Failed to rename temp file"
        );
        let _ = std::fs::remove_file(&tmp_path);
        e
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_file() {
        let dir = std::env::temp_dir().join("downdeck_test_atomic");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("history.json");
        let _ = std::fs::remove_file(&path);

        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn write_replaces_previous_content() {
        let dir = std::env::temp_dir().join("downdeck_test_atomic2");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("history.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn no_temp_file_remains() {
        let dir = std::env::temp_dir().join("downdeck_test_atomic3");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("history.json");

        atomic_write(&path, b"data").unwrap();
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        assert!(!std::path::PathBuf::from(tmp).exists());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }
}
