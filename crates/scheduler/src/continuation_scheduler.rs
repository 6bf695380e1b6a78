// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The I/O driver for [`crate::decision::decide`]: acquires the per-agent
//! lock, reads the active task, calls the pure decision function, and
//! dispatches the result — agent calls, unblock rotation, backlog pickup,
//! and event emission all live here rather than in the decision function.

use crate::backoff::{decide_backoff, parse_retry_after_seconds};
use crate::decision::{decide, Action, Thresholds};
use mesh_core::{
    event_types, tail_contains_context_overflow_error, A2APolicy, AgentContinuationState, AgentDriver, AgentId,
    AnnounceTargetResolver, ChannelSender, Clock, ConversationEvent, FailureReason, Outcome, SessionKey, Task,
    TaskStatus,
};
use mesh_events::EventBus;
use mesh_store::TaskStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Final request in an unblock rotation is escalated through the external
/// channel rather than only in-band (§4.11).
const MAX_UNBLOCK_REQUESTS: u32 = 3;
const MAX_UNBLOCK_FAILURES: u32 = 3;
const DEFAULT_CONTINUATION_TIMEOUT_MS: u64 = 2 * 60 * 1000;
/// Tail window of the target session's event log inspected by the
/// context-overflow post-check after a successful agent call (§4.11).
const CONTEXT_OVERFLOW_TAIL_BYTES: usize = 4096;

pub struct ContinuationScheduler<C> {
    clock: C,
    task_store: Arc<TaskStore<C>>,
    bus: Arc<EventBus>,
    driver: Arc<dyn AgentDriver>,
    policy: Arc<dyn A2APolicy>,
    channel: Arc<dyn ChannelSender>,
    announce_resolver: Arc<dyn AnnounceTargetResolver>,
    lock_dir: PathBuf,
    agent_ids: Vec<AgentId>,
    lead_agent: Option<AgentId>,
    agent_states: Mutex<HashMap<AgentId, AgentContinuationState>>,
    thresholds: Thresholds,
}

impl<C: Clock> ContinuationScheduler<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        task_store: Arc<TaskStore<C>>,
        bus: Arc<EventBus>,
        driver: Arc<dyn AgentDriver>,
        policy: Arc<dyn A2APolicy>,
        channel: Arc<dyn ChannelSender>,
        announce_resolver: Arc<dyn AnnounceTargetResolver>,
        lock_dir: impl Into<PathBuf>,
        agent_ids: Vec<AgentId>,
        lead_agent: Option<AgentId>,
    ) -> Self {
        Self {
            clock,
            task_store,
            bus,
            driver,
            policy,
            channel,
            announce_resolver,
            lock_dir: lock_dir.into(),
            agent_ids,
            lead_agent,
            agent_states: Mutex::new(HashMap::new()),
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// One `checkIntervalMs` pass over every configured agent (§4.11).
    pub async fn tick(&self) {
        for agent_id in self.agent_ids.clone() {
            self.tick_agent(&agent_id).await;
        }
    }

    async fn tick_agent(&self, agent_id: &AgentId) {
        let now_ms = self.clock.epoch_ms() as i64;
        let lock_id = format!("continuation_{agent_id}");
        let Ok(Some(lock)) = mesh_store::Lock::acquire(&self.lock_dir, &lock_id, now_ms) else { return };

        self.tick_agent_locked(agent_id, now_ms).await;
        lock.release();
    }

    /// `find_active_task` only ever returns `in_progress` tasks (§4.4), but
    /// the decision function's `blocked` branch needs to see blocked tasks
    /// too, so a blocked task is treated as this agent's active task when
    /// there is no in-progress one.
    fn find_active_or_blocked_task(&self) -> Result<Option<Task>, mesh_store::TaskStoreError> {
        if let Some(task) = self.task_store.find_active_task()? {
            return Ok(Some(task));
        }
        Ok(self.task_store.list_tasks(Some(TaskStatus::Blocked))?.into_iter().next())
    }

    async fn tick_agent_locked(&self, agent_id: &AgentId, now_ms: i64) {
        let active = match self.find_active_or_blocked_task() {
            Ok(task) => task,
            Err(e) => {
                warn!(%agent_id, error = %e, "failed to read active task");
                return;
            }
        };

        let Some(task) = active else {
            self.try_pick_backlog_task(agent_id, now_ms).await;
            return;
        };

        let is_busy = self.driver.is_busy(agent_id).await;
        let agent_state = self.agent_states.lock().entry(agent_id.clone()).or_default().clone();
        let action = decide(&task, &agent_state, now_ms, &self.thresholds, is_busy);

        match action {
            Action::Skip => {}
            Action::Continue => self.dispatch_continue(agent_id, &task, now_ms).await,
            Action::Unblock => self.dispatch_unblock(agent_id, &task, now_ms).await,
            Action::BacklogRecover => self.dispatch_backlog_recover(&task, now_ms),
            Action::Abandon => self.dispatch_abandon(&task, now_ms),
            Action::Backoff | Action::Escalate => {
                warn!(%agent_id, ?action, "decide() does not produce this action directly; ignoring");
            }
        }
    }

    async fn try_pick_backlog_task(&self, agent_id: &AgentId, now_ms: i64) {
        let now_iso = mesh_store::format_epoch_ms(now_ms as u64);
        let Ok(Some(candidate)) = self.task_store.find_pickable_backlog_task(&now_iso) else { return };

        let task_id = candidate.id.clone();
        let picked = self.task_store.with_task_lock(&task_id, |mut task| {
            task.status = TaskStatus::InProgress;
            task.last_activity = now_iso.clone();
            Ok::<Task, mesh_store::TaskStoreError>(task)
        });

        let Ok(task) = picked else { return };
        self.emit(event_types::BACKLOG_AUTO_PICKED, agent_id, now_ms, &[("taskId", task.id.to_string().into())]);
        let prompt = format!("Pick up backlog task {}: {}", task.id, task.description);
        if let Err(e) = self.driver.run_agent_step(&main_session_key(agent_id), &prompt, DEFAULT_CONTINUATION_TIMEOUT_MS).await {
            warn!(%agent_id, error = %e, "backlog pickup prompt failed");
        }
    }

    async fn dispatch_continue(&self, agent_id: &AgentId, task: &Task, now_ms: i64) {
        let prompt = format!("Continue working on task {}: {}", task.id, task.description);
        let result = self.driver.run_agent_step(&main_session_key(agent_id), &prompt, DEFAULT_CONTINUATION_TIMEOUT_MS).await;

        match result {
            Ok(_) => {
                let tail = self
                    .driver
                    .read_session_log_tail(&main_session_key(agent_id), CONTEXT_OVERFLOW_TAIL_BYTES)
                    .await;
                if tail.as_deref().map(tail_contains_context_overflow_error).unwrap_or(false) {
                    self.record_continuation_failure(agent_id, task, now_ms, FailureReason::ContextOverflow, None);
                    return;
                }

                let mut states = self.agent_states.lock();
                states.entry(agent_id.clone()).or_default().record_success(now_ms, task.id.clone());
                drop(states);
                self.emit(event_types::CONTINUATION_SENT, agent_id, now_ms, &[("taskId", task.id.to_string().into())]);
            }
            Err(e) => {
                let message = e.to_string();
                let reason = FailureReason::classify(&message);
                let retry_after = parse_retry_after_seconds(&message);
                self.record_continuation_failure(agent_id, task, now_ms, reason, retry_after);
            }
        }
    }

    /// Common bookkeeping for a failed (or post-check reclassified)
    /// continuation attempt: bumps the backoff table, emits
    /// `continuation.backoff`, and dispatches whatever the ladder says to do
    /// once it's exhausted.
    fn record_continuation_failure(&self, agent_id: &AgentId, task: &Task, now_ms: i64, reason: FailureReason, retry_after: Option<u64>) {
        let consecutive = {
            let mut states = self.agent_states.lock();
            let state = states.entry(agent_id.clone()).or_default();
            state.consecutive_failures + 1
        };
        let backoff = decide_backoff(reason, consecutive, retry_after);

        {
            let mut states = self.agent_states.lock();
            states.entry(agent_id.clone()).or_default().record_failure(reason, now_ms + backoff.backoff_ms);
        }

        self.emit(
            event_types::CONTINUATION_BACKOFF,
            agent_id,
            now_ms,
            &[
                ("reason", reason.to_string().into()),
                ("consecutiveFailures", (consecutive as i64).into()),
                ("backoffMs", backoff.backoff_ms.into()),
            ],
        );

        if let Some(exhaustion) = backoff.on_exhaustion {
            match exhaustion {
                Action::Abandon => self.dispatch_abandon(task, now_ms),
                Action::Escalate if reason == FailureReason::ContextOverflow => {
                    error!(%agent_id, task_id = %task.id, "context overflow backoff exhausted: manual reset required");
                }
                _ => warn!(%agent_id, reason = %reason, "backoff exhausted, escalation required"),
            }
        }
    }

    async fn dispatch_unblock(&self, agent_id: &AgentId, task: &Task, now_ms: i64) {
        let Some(blocking) = &task.blocking else { return };
        if blocking.unblocked_by.is_empty() {
            return;
        }

        let len = blocking.unblocked_by.len();
        let start = blocking.last_unblocker_index.map(|i| (i + 1) % len).unwrap_or(0);

        let mut candidate_index = start;
        let mut allowed = None;
        for _ in 0..len {
            let candidate = &blocking.unblocked_by[candidate_index];
            if self.policy.is_allowed(agent_id, candidate) {
                allowed = Some((candidate_index, candidate.clone()));
                break;
            }
            candidate_index = (candidate_index + 1) % len;
        }

        let task_id = task.id.clone();
        let Some((picked_index, target)) = allowed else {
            let _ = self.task_store.with_task_lock(&task_id, |mut t| {
                if let Some(b) = &mut t.blocking {
                    b.escalation_state = mesh_core::EscalationState::Failed;
                }
                Ok::<Task, mesh_store::TaskStoreError>(t)
            });
            self.emit(event_types::UNBLOCK_FAILED, agent_id, now_ms, &[("taskId", task_id.to_string().into()), ("reason", "all_unblockers_denied".into())]);
            return;
        };

        let prompt = format!("Task {task_id} is blocked; please unblock: {}", task.description);
        let escalate = blocking.unblock_request_count + 1 >= MAX_UNBLOCK_REQUESTS;
        let tagged_prompt = if escalate { format!("[ESCALATION] {prompt}") } else { prompt };

        if escalate {
            self.deliver_escalation_out_of_band(&target, &tagged_prompt).await;
        }

        let result = self
            .driver
            .run_agent_step(&main_session_key(&target), &tagged_prompt, DEFAULT_CONTINUATION_TIMEOUT_MS)
            .await;

        let now_iso = mesh_store::format_epoch_ms(now_ms as u64);
        let failed = result.is_err();
        let _ = self.task_store.with_task_lock(&task_id, move |mut t| {
            if let Some(b) = &mut t.blocking {
                b.last_unblocker_index = Some(picked_index);
                b.unblock_request_count += 1;
                b.last_unblock_request_at = Some(now_ms);
                if failed {
                    b.unblock_request_failures += 1;
                    if b.unblock_request_failures >= MAX_UNBLOCK_FAILURES {
                        b.escalation_state = mesh_core::EscalationState::Failed;
                    }
                } else if escalate {
                    b.escalation_state = mesh_core::EscalationState::Escalated;
                }
            }
            t.last_activity = now_iso.clone();
            Ok::<Task, mesh_store::TaskStoreError>(t)
        });

        if let Err(e) = result {
            warn!(%agent_id, to = %target, error = %e, "unblock request failed");
        }
        self.emit(
            event_types::UNBLOCK_REQUESTED,
            agent_id,
            now_ms,
            &[("taskId", task_id.to_string().into()), ("toAgent", target.to_string().into()), ("escalated", escalate.into())],
        );
    }

    fn dispatch_backlog_recover(&self, task: &Task, now_ms: i64) {
        let task_id = task.id.clone();
        let now_iso = mesh_store::format_epoch_ms(now_ms as u64);
        let result = self.task_store.with_task_lock(&task_id, move |mut t| {
            t.status = TaskStatus::Backlog;
            let backlog = t.backlog.get_or_insert_with(Default::default);
            backlog.reassign_count += 1;
            t.progress.push(format!("{now_iso}: Auto-recovered to backlog (zombie task)"));
            Ok::<Task, mesh_store::TaskStoreError>(t)
        });
        if result.is_err() {
            return;
        }
        self.emit(event_types::ZOMBIE_ABANDONED, &AgentId::new("scheduler"), now_ms, &[("taskId", task_id.to_string().into()), ("action", "moved_to_backlog".into())]);
    }

    fn dispatch_abandon(&self, task: &Task, now_ms: i64) {
        let task_id = task.id.clone();
        let result = self.task_store.with_task_lock(&task_id, |mut t| {
            t.status = TaskStatus::Interrupted;
            t.outcome = Some(Outcome::Interrupted { by: None, reason: Some("zombie reassign limit exceeded".to_string()) });
            Ok::<Task, mesh_store::TaskStoreError>(t)
        });
        if result.is_err() {
            return;
        }
        if let Some(lead) = &self.lead_agent {
            info!(%lead, task_id = %task_id, "notifying lead agent of abandoned task");
        }
        self.emit(event_types::ZOMBIE_ABANDONED, &AgentId::new("scheduler"), now_ms, &[("taskId", task_id.to_string().into()), ("action", "escalated".into())]);
    }

    /// §4.11/§7: an escalated unblock request must reach `target` through
    /// the external channel in addition to the in-band agent prompt, so a
    /// human watching that surface sees it even if the in-band prompt is
    /// never read.
    async fn deliver_escalation_out_of_band(&self, target: &AgentId, message: &str) {
        let Some(announce_target) = self.announce_resolver.resolve(&main_session_key(target)) else {
            warn!(%target, "no external channel target resolved for escalated unblock request");
            return;
        };
        if let Err(e) = self.channel.send(&announce_target, message).await {
            warn!(%target, error = %e, "failed to deliver escalated unblock request through external channel");
        }
    }

    fn emit(&self, event_type: &str, agent_id: &AgentId, now_ms: i64, extra: &[(&str, serde_json::Value)]) {
        let mut event = ConversationEvent::new(event_type, agent_id.to_string(), now_ms);
        for (key, value) in extra {
            event = event.with(*key, value.clone());
        }
        self.bus.emit(&event);
    }
}

fn main_session_key(agent_id: &AgentId) -> SessionKey {
    SessionKey { agent_id: agent_id.to_string(), surface: "main".to_string(), peer_kind: None, peer_id: None, thread: None }
}

#[cfg(test)]
#[path = "continuation_scheduler_tests.rs"]
mod tests;
