// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-modify-write of JSON under [`Lock`] with tmp-rename (§4.2).
//!
//! This module is synchronous blocking I/O, matching the teacher's
//! `storage/snapshot.rs` writers; async callers (the scheduler, A2A flow)
//! wrap calls in `tokio::task::spawn_blocking` rather than this crate
//! depending on a runtime.

use crate::lock::Lock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lock busy for {lock_id} after {attempts} attempts")]
    LockBusy { lock_id: String, attempts: u32 },
}

/// Backoff ladder for lock contention, per §4.2.
const RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

/// Acquire `lock_dir/lock_id.lock`, retrying on contention with the
/// standard backoff ladder, run `body` while holding it, then release.
pub fn with_lock<T>(
    lock_dir: &Path,
    lock_id: &str,
    now_ms: i64,
    body: impl FnOnce() -> Result<T, AtomicStoreError>,
) -> Result<T, AtomicStoreError> {
    let mut last_attempt = 0;
    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        last_attempt = attempt as u32 + 1;
        if let Some(lock) = Lock::acquire(lock_dir, lock_id, now_ms)? {
            let result = body();
            lock.release();
            return result;
        }
        thread::sleep(Duration::from_millis(*delay_ms));
    }

    if let Some(lock) = Lock::acquire(lock_dir, lock_id, now_ms)? {
        let result = body();
        lock.release();
        return result;
    }

    Err(AtomicStoreError::LockBusy { lock_id: lock_id.to_string(), attempts: last_attempt + 1 })
}

/// Read `path` as JSON, falling back to `default` if the file is absent,
/// apply `mutate`, and persist via write-to-tmp-then-rename — all under
/// `lock_dir/lock_id`'s lock.
pub fn read_modify_write<T, F>(
    path: &Path,
    lock_dir: &Path,
    lock_id: &str,
    now_ms: i64,
    default: impl FnOnce() -> T,
    mutate: F,
) -> Result<T, AtomicStoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(T) -> T,
{
    with_lock(lock_dir, lock_id, now_ms, move || {
        let current = read_or_default(path, default)?;
        let updated = mutate(current);
        write_atomic(path, &updated, now_ms)?;
        Ok(updated)
    })
}

fn read_or_default<T: DeserializeOwned>(
    path: &Path,
    default: impl FnOnce() -> T,
) -> Result<T, AtomicStoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(default()),
        Err(e) => Err(e.into()),
    }
}

/// Write `value` to `path` via a `path.tmp.<pid>.<ts>.<seq>` temp file then
/// rename over the destination. Removes the tmp file on write failure.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T, now_ms: i64) -> Result<(), AtomicStoreError> {
    write_atomic_bytes(path, &serde_json::to_vec_pretty(value)?, now_ms)
}

/// Same tmp-rename discipline as [`write_atomic`] but for pre-rendered
/// bytes (e.g. the markdown `TaskStore` writes), bypassing JSON encoding.
pub fn write_atomic_bytes(path: &Path, bytes: &[u8], now_ms: i64) -> Result<(), AtomicStoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    static SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let tmp_path = path.with_extension(format!(
        "tmp.{}.{}.{}",
        std::process::id(),
        now_ms,
        seq
    ));

    let write_result = std::fs::write(&tmp_path, bytes);
    if write_result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
        write_result?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
