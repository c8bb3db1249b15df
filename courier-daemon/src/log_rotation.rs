//! Size-based rotation for the daemon log files.
//!
//! `daemon.log` and `daemon-err.log` rotate once they pass 10 MiB, shifting
//! numbered copies up (`daemon.log` → `daemon.log.1` → … → `daemon.log.5`)
//! and deleting the oldest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotation threshold (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Numbered copies kept per log file.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` if its size meets or exceeds `max_bytes`.
///
/// Returns `true` when a rotation happened. A missing live file is not an
/// error — there is simply nothing to rotate yet.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    // Drop the oldest copy, then shift .n → .n+1 from the top down.
    let oldest = numbered(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered(log_path, 1))?;

    // Recreate the live file so launchd's redirected fds keep a valid target.
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate both daemon log files under `home`.
///
/// A failure on one file is logged and does not block the other.
pub fn rotate_logs(home: &Path) {
    let stdout_log = crate::paths::stdout_log_path(home);
    let stderr_log = crate::paths::stderr_log_path(home);

    for log_path in [&stdout_log, &stderr_log] {
        match rotate_if_needed(log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
            Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed")
            }
        }
    }
}

fn numbered(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("daemon.log");
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filled(dir: &TempDir, name: &str, bytes: usize) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![b'x'; bytes]).unwrap();
        path
    }

    #[test]
    fn small_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = filled(&dir, "daemon.log", 512);
        assert!(!rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap());
        assert!(!numbered(&log, 1).exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("absent.log");
        assert!(!rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap());
    }

    #[test]
    fn oversized_file_rotates_and_live_log_is_emptied() {
        let dir = TempDir::new().unwrap();
        let log = filled(&dir, "daemon.log", MAX_LOG_BYTES as usize);

        assert!(rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap());

        assert_eq!(fs::metadata(&log).unwrap().len(), 0);
        assert_eq!(
            fs::metadata(numbered(&log, 1)).unwrap().len(),
            MAX_LOG_BYTES
        );
    }

    #[test]
    fn repeated_rotations_shift_and_cap_the_backlog() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("daemon.log");

        for round in 0..MAX_ROTATED_FILES + 2 {
            fs::write(&log, vec![b'a' + round as u8; MAX_LOG_BYTES as usize]).unwrap();
            assert!(rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap());
        }

        for n in 1..=MAX_ROTATED_FILES {
            assert!(numbered(&log, n).exists(), "copy .{n} should exist");
        }
        assert!(
            !numbered(&log, MAX_ROTATED_FILES + 1).exists(),
            "backlog must stay capped at {MAX_ROTATED_FILES} copies"
        );

        // Newest copy carries the most recent content.
        let newest = fs::read(numbered(&log, 1)).unwrap();
        assert_eq!(newest[0], b'a' + (MAX_ROTATED_FILES + 1) as u8);
    }
}
