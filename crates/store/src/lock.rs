// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PID-timestamped advisory file locks with stale-owner reclamation (§4.1).
//!
//! Grounded in the teacher's daemon startup lock (`lifecycle/startup.rs`),
//! which opens a single `fs2`-backed OS lock file and writes the holder's
//! PID into it. That gives at most one live daemon, but not the per-task,
//! per-job stale-reclamation semantics this engine needs, so here the lock
//! is a plain JSON file carrying `{pid, timestamp}` with liveness checked by
//! sending signal 0 to the PID, rather than relying on `flock`.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// How old an unparseable-as-alive lock file may be before a contender is
/// allowed to reclaim it.
pub const STALE_LOCK_MS: i64 = 60_000;

#[derive(Debug, Serialize, Deserialize)]
struct LockPayload {
    pid: u32,
    timestamp: i64,
}

/// A held lock. Dropping it releases the lock as a safety net; callers
/// should still call [`Lock::release`] explicitly so release failures are
/// observable.
#[derive(Debug)]
pub struct Lock {
    path: PathBuf,
    released: bool,
}

impl Lock {
    fn path_for(dir: &Path, id: &str) -> PathBuf {
        dir.join(format!("{id}.lock"))
    }

    /// Attempt to acquire the lock for `(dir, id)`. Returns `None` if
    /// another live process holds it; never blocks.
    pub fn acquire(dir: &Path, id: &str, now_ms: i64) -> io::Result<Option<Self>> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path_for(dir, id);

        if Self::try_create_exclusive(&path, now_ms)? {
            return Ok(Some(Self { path, released: false }));
        }

        if Self::reclaim_if_stale(&path, now_ms)? && Self::try_create_exclusive(&path, now_ms)? {
            return Ok(Some(Self { path, released: false }));
        }

        Ok(None)
    }

    fn try_create_exclusive(path: &Path, now_ms: i64) -> io::Result<bool> {
        use std::fs::OpenOptions;
        use std::io::Write;

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let payload = LockPayload { pid: std::process::id(), timestamp: now_ms };
                let json = serde_json::to_vec(&payload)?;
                file.write_all(&json)?;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `true` if the existing lock file was removed because it is
    /// unparseable, older than [`STALE_LOCK_MS`], or names a dead PID.
    fn reclaim_if_stale(path: &Path, now_ms: i64) -> io::Result<bool> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e),
        };

        let stale = match serde_json::from_slice::<LockPayload>(&bytes) {
            Ok(payload) => {
                now_ms - payload.timestamp > STALE_LOCK_MS || !process_is_alive(payload.pid)
            }
            Err(_) => true,
        };

        if stale {
            debug!(path = %path.display(), "reclaiming stale lock");
            match std::fs::remove_file(path) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
                Err(e) => Err(e),
            }
        } else {
            Ok(false)
        }
    }

    /// Remove the lock file. Tolerates the file already being gone.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release lock");
            }
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    // Conservative: assume alive on platforms without a signal-0 probe, so
    // we never falsely reclaim a held lock.
    true
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
