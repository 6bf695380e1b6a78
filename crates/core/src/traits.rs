// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow interfaces (§6) the coordination engine is driven through.
//! Defined here rather than in `mesh-runtime` so that `mesh-a2a` and
//! `mesh-scheduler` — which call these traits directly — don't need to
//! depend on the crate that wires concrete implementations together.
//! `mesh-runtime` re-exports these and supplies the wiring.

use crate::ids::AgentId;
use crate::intent::AnnounceTarget;
use crate::session_key::SessionKey;
use async_trait::async_trait;
use thiserror::Error;

/// One assistant turn produced by an agent's embedded LLM runner.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum AgentDriverError {
    #[error("agent call timed out after {0}ms")]
    Timeout(u64),
    #[error("agent call failed: {0}")]
    Failed(String),
}

/// Outcome of one `AgentDriver::wait` poll chunk (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Ok,
    NotFound,
    Error,
    Timeout,
}

/// Abstracts the embedded agent LLM runner. The core never assumes a
/// provider; it only starts a run, polls it, and reads back replies or a
/// typed failure it can classify (§4.11's backoff table).
#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Start a run of `message` against `session_key` on the given lane,
    /// returning an opaque run id to poll with [`AgentDriver::wait`].
    async fn run(
        &self,
        session_key: &SessionKey,
        message: &str,
        lane: &str,
    ) -> Result<String, AgentDriverError>;

    /// Poll a run for up to `chunk_ms`, returning its status at the end of
    /// the chunk (not necessarily terminal — callers loop until `Ok`,
    /// `NotFound`, or `Error`, bounded by their own wall-clock ceiling).
    async fn wait(&self, run_id: &str, chunk_ms: u64) -> WaitStatus;

    /// Read the most recent assistant message recorded against `session_key`,
    /// if any.
    async fn read_latest_assistant_reply(&self, session_key: &SessionKey) -> Option<String>;

    /// Read up to the last `max_bytes` of the raw, append-only event log
    /// backing `session_key`, used by the scheduler's context-overflow
    /// post-check (§4.11). `None` if the session has no log yet. Drivers
    /// that don't expose a raw transcript can rely on the default, which
    /// disables the post-check rather than forcing every implementation to
    /// care about it.
    async fn read_session_log_tail(&self, _session_key: &SessionKey, _max_bytes: usize) -> Option<String> {
        None
    }

    /// Run one synchronous agent step (a ping-pong turn or an announce
    /// step) and return its reply text directly.
    async fn run_agent_step(
        &self,
        session_key: &SessionKey,
        prompt: &str,
        timeout_ms: u64,
    ) -> Result<String, AgentDriverError>;

    /// True while the agent has a non-empty, actively executing command
    /// queue — used by the scheduler's SKIP rule and by SelfDrivingLoop.
    async fn is_busy(&self, agent_id: &AgentId) -> bool;
}

#[derive(Debug, Error)]
pub enum ChannelSendError {
    #[error("channel send failed: {0}")]
    Failed(String),
}

/// Abstracts delivery to an external chat surface (the "send to external
/// surface" side explicitly excluded from this core, §1).
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, target: &AnnounceTarget, message: &str) -> Result<(), ChannelSendError>;
}

/// Resolves where an announce step should be delivered for a given
/// session, if anywhere.
pub trait AnnounceTargetResolver: Send + Sync {
    fn resolve(&self, session_key: &SessionKey) -> Option<AnnounceTarget>;
}

/// Caller-supplied A2A authorization predicate, consulted before any
/// unblock request or flow send crosses an agent boundary.
pub trait A2APolicy: Send + Sync {
    fn is_allowed(&self, from: &AgentId, to: &AgentId) -> bool;
}
