// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Task` data model: the durable record owned by exactly one agent
//! workspace. Parsing/serialization to markdown lives in the store crate;
//! this module only defines the shape and its invariants.

use crate::ids::{AgentId, DelegationId, TaskId, WorkSessionId};
use serde::{Deserialize, Serialize};

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        PendingApproval => "pending_approval",
        InProgress => "in_progress",
        Blocked => "blocked",
        Backlog => "backlog",
        Completed => "completed",
        Cancelled => "cancelled",
        Abandoned => "abandoned",
        Interrupted => "interrupted",
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    PendingApproval,
    InProgress,
    Blocked,
    Backlog,
    Completed,
    Cancelled,
    Abandoned,
    Interrupted,
}

impl TaskStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Abandoned)
    }

    /// `interrupted` is semi-terminal: it can still be picked up again by an
    /// operator, unlike the fully terminal statuses.
    pub fn is_semi_terminal(self) -> bool {
        matches!(self, TaskStatus::Interrupted)
    }
}

crate::simple_display! {
    Priority {
        Urgent => "urgent",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

/// Task priority, ordered urgent < high < medium < low for scheduling
/// (lower enum value sorts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

crate::simple_display! {
    StepStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Done => "done",
        Skipped => "skipped",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
}

impl StepStatus {
    pub fn is_incomplete(self) -> bool {
        matches!(self, StepStatus::Pending | StepStatus::InProgress)
    }
}

/// A sub-unit of a task, tracked independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub content: String,
    pub status: StepStatus,
    pub order: u32,
}

crate::simple_display! {
    EscalationState {
        None => "none",
        Requesting => "requesting",
        Escalated => "escalated",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    None,
    Requesting,
    Escalated,
    Failed,
}

impl Default for EscalationState {
    fn default() -> Self {
        EscalationState::None
    }
}

/// Blocking-state fields, present only while `status=blocked` (or retained
/// as history after unblocking).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocking {
    pub blocked_reason: Option<String>,
    pub unblocked_by: Vec<AgentId>,
    pub unblocked_action: Option<String>,
    pub unblock_request_count: u32,
    pub last_unblocker_index: Option<usize>,
    pub last_unblock_request_at: Option<i64>,
    pub escalation_state: EscalationState,
    pub unblock_request_failures: u32,
}

crate::simple_display! {
    EstimatedEffort {
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatedEffort {
    Small,
    Medium,
    Large,
}

/// Backlog scheduling fields, present only for `status=backlog` tasks (or
/// retained once a task has passed through backlog).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlog {
    pub created_by: Option<AgentId>,
    pub assignee: Option<AgentId>,
    pub depends_on: Vec<TaskId>,
    pub estimated_effort: Option<EstimatedEffort>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub milestone_id: Option<String>,
    pub milestone_item_id: Option<String>,
    pub reassign_count: u32,
}

/// The tagged outcome of a finished task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Completed { summary: Option<String> },
    Cancelled { reason: Option<String>, by: Option<AgentId> },
    Error { error: String, retriable: Option<bool> },
    Interrupted { by: Option<AgentId>, reason: Option<String> },
}

crate::simple_display! {
    DelegationStatus {
        Running => "running",
        Completed => "completed",
        Verified => "verified",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    Running,
    Completed,
    Verified,
    Failed,
}

/// A single delegation of (part of) a task to another agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: DelegationId,
    pub to_agent: AgentId,
    pub description: String,
    pub status: DelegationStatus,
    pub created_at: String,
}

/// Append-only audit entry for delegation lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEvent {
    pub delegation_id: DelegationId,
    pub status: DelegationStatus,
    pub at: String,
    pub note: Option<String>,
}

/// Aggregated view over a task's delegations, recomputed from the
/// delegation list rather than stored independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationSummary {
    pub total: u32,
    pub running: u32,
    pub completed: u32,
    pub verified: u32,
    pub failed: u32,
    pub all_settled: bool,
}

impl DelegationSummary {
    pub fn compute(delegations: &[Delegation]) -> Self {
        let total = delegations.len() as u32;
        let running = delegations.iter().filter(|d| d.status == DelegationStatus::Running).count() as u32;
        let completed =
            delegations.iter().filter(|d| d.status == DelegationStatus::Completed).count() as u32;
        let verified = delegations.iter().filter(|d| d.status == DelegationStatus::Verified).count() as u32;
        let failed = delegations.iter().filter(|d| d.status == DelegationStatus::Failed).count() as u32;
        Self { total, running, completed, verified, failed, all_settled: running == 0 && total > 0 }
    }
}

/// A durable task owned by exactly one agent workspace directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub priority: Priority,
    pub description: String,
    pub context: String,
    pub source: String,
    pub created: String,
    pub last_activity: String,
    pub work_session_id: WorkSessionId,
    pub previous_work_session_id: Option<WorkSessionId>,
    pub progress: Vec<String>,
    pub steps: Vec<Step>,
    pub blocking: Option<Blocking>,
    pub backlog: Option<Backlog>,
    pub outcome: Option<Outcome>,
    pub delegations: Vec<Delegation>,
    pub delegation_events: Vec<DelegationEvent>,
}

impl Task {
    /// `checkStopGuard`: if `steps` is empty, completion is always allowed.
    /// Otherwise every step must be `done` or `skipped`; returns the ids of
    /// any offending steps.
    pub fn stop_guard_incomplete_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status.is_incomplete())
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn delegation_summary(&self) -> DelegationSummary {
        DelegationSummary::compute(&self.delegations)
    }

    /// §3 invariant: `blocked` status requires a `blockedReason`. The
    /// companion invariant ("non-empty `unblockedBy` requires
    /// `escalationState` set") is enforced structurally: `escalation_state`
    /// is a required field of `Blocking`, not an `Option`.
    pub fn blocked_invariant_holds(&self) -> bool {
        if self.status != TaskStatus::Blocked {
            return true;
        }
        self.blocking.as_ref().is_some_and(|b| b.blocked_reason.is_some())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
