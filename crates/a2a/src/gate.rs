// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2AConcurrencyGate (§4.7): a per-agent FIFO waiter queue bounding how many
//! flows may run against one agent at a time. No direct teacher precedent —
//! the teacher has no analogous per-key admission control, so this is built
//! fresh on `tokio::sync::{Mutex, Notify}` in the idiom `mesh-events::bus`
//! already established for this workspace (a `parking_lot`-guarded map of
//! per-key state, here made async since callers must block on a permit).

use crate::error::A2AConcurrencyError;
use mesh_core::AgentId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

struct AgentState {
    active: u32,
    waiters: VecDeque<Arc<Notify>>,
}

impl AgentState {
    fn new() -> Self {
        Self { active: 0, waiters: VecDeque::new() }
    }
}

pub struct A2AConcurrencyGate {
    max_concurrent_flows: u32,
    agents: Mutex<HashMap<AgentId, AgentState>>,
}

/// Holds a permit for one agent; releases it on drop via [`A2AConcurrencyGate::release`]
/// being called explicitly by the flow engine rather than via `Drop`, since release
/// must run even after an async cancellation and the gate has no `unsafe` escape hatch
/// for that here.
impl A2AConcurrencyGate {
    pub fn new(max_concurrent_flows: u32) -> Self {
        Self { max_concurrent_flows, agents: Mutex::new(HashMap::new()) }
    }

    /// Acquire a permit for `agent_id`, waiting up to `queue_timeout_ms` if the
    /// agent is already at capacity. FIFO among waiters for the same agent;
    /// distinct agents never contend with each other.
    pub async fn acquire(&self, agent_id: &AgentId, queue_timeout_ms: u64) -> Result<(), A2AConcurrencyError> {
        let notify = {
            let mut agents = self.agents.lock();
            let state = agents.entry(agent_id.clone()).or_insert_with(AgentState::new);
            if state.active < self.max_concurrent_flows {
                state.active += 1;
                return Ok(());
            }
            let notify = Arc::new(Notify::new());
            state.waiters.push_back(notify.clone());
            notify
        };

        match timeout(Duration::from_millis(queue_timeout_ms), notify.notified()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let mut agents = self.agents.lock();
                if let Some(state) = agents.get_mut(agent_id) {
                    state.waiters.retain(|w| !Arc::ptr_eq(w, &notify));
                }
                Err(A2AConcurrencyError { agent_id: agent_id.clone(), queue_timeout_ms })
            }
        }
    }

    /// Release a permit held for `agent_id`, waking the head waiter if any.
    pub fn release(&self, agent_id: &AgentId) {
        let mut agents = self.agents.lock();
        let Some(state) = agents.get_mut(agent_id) else { return };
        if let Some(waiter) = state.waiters.pop_front() {
            waiter.notify_one();
        } else {
            state.active = state.active.saturating_sub(1);
        }
    }

    pub fn active_count(&self, agent_id: &AgentId) -> u32 {
        self.agents.lock().get(agent_id).map(|s| s.active).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
