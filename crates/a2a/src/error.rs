// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mesh_core::AgentId;
use mesh_store::AtomicStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum A2AJobError {
    #[error(transparent)]
    Atomic(#[from] AtomicStoreError),
    #[error("job {0} not found")]
    NotFound(String),
}

/// Raised when a waiter's queue slot expires before a permit frees up (§4.7).
#[derive(Debug, Error)]
#[error("A2A concurrency queue timeout for agent {agent_id} after {queue_timeout_ms}ms")]
pub struct A2AConcurrencyError {
    pub agent_id: AgentId,
    pub queue_timeout_ms: u64,
}
