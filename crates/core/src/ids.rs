// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for every addressable entity in the coordination engine.

use crate::define_id;

define_id! {
    /// Identifies a durable task: `task_<alnum20>`.
    pub struct TaskId("task_") => crate::id::alnum(20);
}

define_id! {
    /// Identifies a work session grouping tasks and delegations: `ws_<uuid>`.
    pub struct WorkSessionId("ws_") => uuid::Uuid::new_v4();
}

define_id! {
    /// Identifies an A2A job record: `job-<nanoid>`, matching the on-disk
    /// `job-<jobId>.json` naming.
    pub struct JobId("job-");
}

define_id! {
    /// Cross-component correlation id for an A2A conversation.
    pub struct ConversationId("conv_");
}

define_id! {
    /// Identifies a delegation record within a task.
    pub struct DelegationId("dlg_");
}

/// A logically independent worker identified by a short id. Agent ids are
/// caller-supplied (roster entries from `Config`), not generated here, so
/// this is a thin newtype rather than a `define_id!` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
