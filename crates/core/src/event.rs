// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ConversationEvent`: the in-memory pub/sub value type published on the
//! EventBus. Unlike the teacher's tagged `Event` enum, this type's `type`
//! field is an open string set — unknown types are permitted and dispatched
//! only to wildcard listeners (§3), so it is modeled as a string plus a
//! loosely-typed payload map rather than a closed enum.

use serde_json::Value;
use std::collections::BTreeMap;

/// The event-role tag that governs which downstream views surface an A2A
/// event (conversation thread vs. subagent delegation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRole {
    ConversationMain,
    DelegationSubagent,
}

crate::simple_display! {
    EventRole {
        ConversationMain => "conversation.main",
        DelegationSubagent => "delegation.subagent",
    }
}

/// A published conversation event: `{type, agentId, ts, data}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEvent {
    pub event_type: String,
    pub agent_id: String,
    pub ts: i64,
    pub data: BTreeMap<String, Value>,
}

impl ConversationEvent {
    pub fn new(event_type: impl Into<String>, agent_id: impl Into<String>, ts: i64) -> Self {
        Self { event_type: event_type.into(), agent_id: agent_id.into(), ts, data: BTreeMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    pub fn event_role(&self) -> Option<EventRole> {
        match self.get_str("eventRole") {
            Some("conversation.main") => Some(EventRole::ConversationMain),
            Some("delegation.subagent") => Some(EventRole::DelegationSubagent),
            _ => None,
        }
    }

    pub fn work_session_id(&self) -> Option<&str> {
        self.get_str("workSessionId")
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.get_str("conversationId")
    }

    pub fn from_agent(&self) -> Option<&str> {
        self.get_str("fromAgent")
    }

    pub fn to_agent(&self) -> Option<&str> {
        self.get_str("toAgent")
    }
}

/// Canonical event type constants published on the bus (§6).
pub mod event_types {
    pub const A2A_SPAWN: &str = "a2a.spawn";
    pub const A2A_SEND: &str = "a2a.send";
    pub const A2A_RESPONSE: &str = "a2a.response";
    pub const A2A_SPAWN_RESULT: &str = "a2a.spawn_result";
    pub const A2A_COMPLETE: &str = "a2a.complete";
    pub const A2A_AUTO_ROUTE: &str = "a2a.auto_route";
    pub const CONTINUATION_SENT: &str = "continuation.sent";
    pub const CONTINUATION_BACKOFF: &str = "continuation.backoff";
    pub const UNBLOCK_REQUESTED: &str = "unblock.requested";
    pub const UNBLOCK_FAILED: &str = "unblock.failed";
    pub const ZOMBIE_ABANDONED: &str = "zombie.abandoned";
    pub const BACKLOG_AUTO_PICKED: &str = "backlog.auto_picked";
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
