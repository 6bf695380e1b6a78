// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ContinuationScheduler (§4.11): the decision engine is kept as a pure
//! function of `(task, agentState, now, thresholds, isAgentBusy)` so it is
//! testable without mocking a clock, a lock, or an agent driver. All I/O —
//! the lock, the agent call, the event emission — lives in the driver
//! (`crate::driver`).

use mesh_core::{AgentContinuationState, Task, TaskStatus};

/// Every action the decision engine or its I/O driver may take. `Backoff`
/// and `Escalate` are never returned by [`decide`] directly — they are
/// synthesized by the driver after an agent call fails or an unblock
/// request exhausts its budget — but live in the same enum since they are
/// still points in the same state machine the driver dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Escalate,
    Backoff,
    Unblock,
    Abandon,
    Skip,
    BacklogRecover,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub check_interval_ms: i64,
    pub zombie_task_ttl_ms: i64,
    pub cooldown_ms: i64,
    pub idle_threshold_ms: i64,
    pub max_reassign_count: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            check_interval_ms: 2 * 60 * 1000,
            zombie_task_ttl_ms: 24 * 3_600 * 1000,
            cooldown_ms: 5 * 60 * 1000,
            idle_threshold_ms: 3 * 60 * 1000,
            max_reassign_count: 3,
        }
    }
}

/// Priority-ordered pure decision (§4.11). `is_agent_busy` reflects a
/// non-empty, actively executing command queue on the agent, supplied by
/// the caller (`AgentDriver::is_busy`).
pub fn decide(
    task: &Task,
    agent_state: &AgentContinuationState,
    now_ms: i64,
    thresholds: &Thresholds,
    is_agent_busy: bool,
) -> Action {
    if matches!(
        task.status,
        TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Abandoned | TaskStatus::PendingApproval
    ) {
        return Action::Skip;
    }

    if is_agent_busy {
        return Action::Skip;
    }

    let last_activity_ms = mesh_store::parse_epoch_ms(&task.last_activity).unwrap_or(now_ms);

    if task.status == TaskStatus::InProgress && now_ms - last_activity_ms > thresholds.zombie_task_ttl_ms {
        let reassign_count = task.backlog.as_ref().map(|b| b.reassign_count).unwrap_or(0);
        return if reassign_count < thresholds.max_reassign_count { Action::BacklogRecover } else { Action::Abandon };
    }

    if let Some(backoff_until) = agent_state.backoff_until_ms {
        if backoff_until > now_ms {
            return Action::Skip;
        }
    }

    if agent_state.last_task_id.as_ref() == Some(&task.id) {
        if let Some(last_sent) = agent_state.last_continuation_sent_ms {
            if now_ms - last_sent < thresholds.cooldown_ms {
                return Action::Skip;
            }
        }
    }

    if now_ms - last_activity_ms < thresholds.idle_threshold_ms {
        return Action::Skip;
    }

    if task.status == TaskStatus::Blocked {
        return Action::Unblock;
    }

    Action::Continue
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
