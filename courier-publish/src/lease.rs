//! Publish lease — mutual exclusion between overlapping runs.
//!
//! A lease is a JSON lockfile created with `create_new` (O_EXCL) semantics
//! before the publish step and removed afterwards. A lease older than
//! [`LEASE_TTL`] is presumed abandoned (a killed run) and reclaimed. The
//! durable store's push rejection remains the backstop if two hosts race.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, PublishError};

/// Leases older than this are treated as stale and taken over.
pub const LEASE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Serialize, Deserialize)]
struct LeasePayload {
    pid: u32,
    acquired_at_unix: u64,
}

/// `<home>/.courier/run/publish.lock`
pub fn lease_path_at(home: &Path) -> PathBuf {
    home.join(".courier").join("run").join("publish.lock")
}

/// A held publish lease. Released on [`PublishLease::release`] or drop.
#[derive(Debug)]
pub struct PublishLease {
    path: PathBuf,
    released: bool,
}

impl PublishLease {
    /// Acquire the lease at `path`, reclaiming a stale one if necessary.
    pub fn acquire(path: &Path) -> Result<Self, PublishError> {
        Self::acquire_with_ttl(path, LEASE_TTL)
    }

    fn acquire_with_ttl(path: &Path, ttl: Duration) -> Result<Self, PublishError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        // One reclaim attempt at most: create → inspect holder → maybe
        // remove stale → create again.
        for attempt in 0..2 {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(file) => {
                    let payload = LeasePayload {
                        pid: std::process::id(),
                        acquired_at_unix: unix_seconds_now(),
                    };
                    serde_json::to_writer(file, &payload)?;
                    return Ok(Self {
                        path: path.to_path_buf(),
                        released: false,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempt == 0 => {
                    let (holder_pid, held_for) = read_holder(path);
                    if held_for > ttl.as_secs() {
                        tracing::warn!(
                            "reclaiming stale publish lease (pid {holder_pid}, {held_for}s old)"
                        );
                        match std::fs::remove_file(path) {
                            Ok(()) => continue,
                            Err(err) if err.kind() == ErrorKind::NotFound => continue,
                            Err(err) => return Err(io_err(path, err)),
                        }
                    }
                    return Err(PublishError::LeaseHeld {
                        path: path.to_path_buf(),
                        holder_pid,
                        held_for_secs: held_for,
                    });
                }
                Err(err) => return Err(io_err(path, err)),
            }
        }

        // Second create_new lost a race with another reclaimer.
        let (holder_pid, held_for) = read_holder(path);
        Err(PublishError::LeaseHeld {
            path: path.to_path_buf(),
            holder_pid,
            held_for_secs: held_for,
        })
    }

    /// Release the lease, deleting the lockfile.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
            self.released = true;
        }
    }
}

impl Drop for PublishLease {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Best-effort read of the current holder. A corrupt or unreadable payload
/// reports as (pid 0, max age) so it gets reclaimed rather than wedging
/// every future run.
fn read_holder(path: &Path) -> (u32, u64) {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return (0, u64::MAX);
    };
    let Ok(payload) = serde_json::from_str::<LeasePayload>(&contents) else {
        return (0, u64::MAX);
    };
    let age = unix_seconds_now().saturating_sub(payload.acquired_at_unix);
    (payload.pid, age)
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
