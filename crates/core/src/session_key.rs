// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session key grammar: `agent:<id>:<surface>[:<peer-kind>:<peer-id>[:topic|thread:N]]`.
//!
//! Mirrors the manual colon-delimited parsing style used for timer ids
//! elsewhere in this crate rather than a serde tag, since session keys are
//! round-tripped as opaque strings across process/transport boundaries.

use std::fmt;

/// A thread qualifier retained verbatim; `:topic:N` and `:thread:N` are
/// treated identically as thread identifiers (at least one chat transport
/// uses `topic`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub agent_id: String,
    pub surface: String,
    pub peer_kind: Option<String>,
    pub peer_id: Option<String>,
    pub thread: Option<ThreadRef>,
}

impl SessionKey {
    /// Parse `agent:<id>:<surface>[:<peer-kind>:<peer-id>[:topic|thread:N]]`.
    /// Returns `None` if the string does not start with `agent:` or lacks a
    /// surface segment.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        if parts.next()? != "agent" {
            return None;
        }
        let agent_id = parts.next()?.to_string();
        let surface = parts.next()?.to_string();

        let mut peer_kind = None;
        let mut peer_id = None;
        let mut thread = None;

        if let Some(kind) = parts.next() {
            if kind == "topic" || kind == "thread" {
                thread = parts.next().map(|n| ThreadRef(n.to_string()));
            } else {
                peer_kind = Some(kind.to_string());
                peer_id = parts.next().map(|s| s.to_string());
                if let Some(tkind) = parts.next() {
                    if tkind == "topic" || tkind == "thread" {
                        thread = parts.next().map(|n| ThreadRef(n.to_string()));
                    }
                }
            }
        }

        Some(Self { agent_id, surface, peer_kind, peer_id, thread })
    }

    /// True if this key addresses a subagent session:
    /// `agent:<id>:subagent:*`.
    pub fn is_subagent(&self) -> bool {
        self.surface == "subagent"
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent:{}:{}", self.agent_id, self.surface)?;
        if let (Some(kind), Some(id)) = (&self.peer_kind, &self.peer_id) {
            write!(f, ":{kind}:{id}")?;
        }
        if let Some(ThreadRef(n)) = &self.thread {
            write!(f, ":thread:{n}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_key_tests.rs"]
mod tests;
