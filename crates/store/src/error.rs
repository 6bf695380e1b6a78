// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::atomic::AtomicStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Atomic(#[from] AtomicStoreError),
    #[error("task not found")]
    NotFound,
    #[error("task is blocked on incomplete steps: {steps:?}")]
    StopGuardBlocked { steps: Vec<String> },
    #[error("could not acquire lock for {resource}")]
    LockBusy { resource: String },
}
