// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mesh-store: on-disk persistence for the coordination engine — the
//! per-resource file lock, the atomic read-modify-write primitive built on
//! it, and the per-agent markdown `TaskStore`.

pub mod atomic;
pub mod error;
pub mod lock;
pub mod task_store;
pub mod time;

pub use atomic::{read_modify_write, with_lock, write_atomic, write_atomic_bytes, AtomicStoreError};
pub use error::TaskStoreError;
pub use lock::{Lock, STALE_LOCK_MS};
pub use task_store::{format, StopGuardResult, TaskStore};
pub use time::{epoch_ms_to_year_month, format_epoch_ms, parse_epoch_ms};
