// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `A2AJob`: the durable record for a single agent-to-agent exchange,
//! owned by the shared jobs directory (not an agent workspace).

use crate::ids::{ConversationId, JobId, TaskId, WorkSessionId};
use serde::{Deserialize, Serialize};

crate::simple_display! {
    A2AJobStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Abandoned => "ABANDONED",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum A2AJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Abandoned,
}

impl A2AJobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, A2AJobStatus::Completed | A2AJobStatus::Failed | A2AJobStatus::Abandoned)
    }

    /// The legal PENDING → RUNNING → {COMPLETED|FAILED|ABANDONED} machine.
    /// Illegal transitions (including RUNNING→PENDING, which the reaper
    /// performs directly rather than through this check) are ignored by
    /// callers rather than erroring, per §3.
    pub fn can_transition_to(self, next: A2AJobStatus) -> bool {
        use A2AJobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Abandoned)
                | (Pending, Abandoned)
        )
    }
}

/// Optional task-context threading an A2A job back to the task that spawned
/// it, used to compute delegation depth and subagent event roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct A2ATaskContext {
    pub task_id: Option<TaskId>,
    pub work_session_id: Option<WorkSessionId>,
    pub parent_conversation_id: Option<ConversationId>,
    pub depth: u32,
    pub hop: u32,
    pub skip_ping_pong: bool,
}

/// A durable A2A job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AJob {
    pub job_id: JobId,
    pub status: A2AJobStatus,
    pub target_session_key: String,
    pub display_key: String,
    pub message: String,
    pub conversation_id: Option<ConversationId>,
    pub max_ping_pong_turns: u32,
    pub current_turn: u32,
    pub announce_timeout_ms: u64,
    pub task_context: Option<A2ATaskContext>,
    pub created_at: i64,
    pub updated_at: i64,
    pub finished_at: Option<i64>,
    pub resume_count: u32,
    pub last_error: Option<String>,
}

impl A2AJob {
    /// §3: a `RUNNING` job is stale if `now - updatedAt` exceeds the
    /// threshold (default 1h, see `mesh_scheduler` defaults).
    pub fn is_stale(&self, now_ms: i64, stale_threshold_ms: i64) -> bool {
        self.status == A2AJobStatus::Running && now_ms - self.updated_at > stale_threshold_ms
    }

    /// §3: finished jobs older than the retention window are eligible for
    /// deletion by the job manager's cleanup sweep.
    pub fn is_retention_expired(&self, now_ms: i64, retention_ms: i64) -> bool {
        match self.finished_at {
            Some(finished) if self.status.is_finished() => now_ms - finished > retention_ms,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "a2a_job_tests.rs"]
mod tests;
