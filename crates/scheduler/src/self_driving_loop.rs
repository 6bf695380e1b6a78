// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SelfDrivingLoop (§4.12): keeps a multi-step task progressing between
//! ContinuationScheduler ticks by reacting to the agent's own "run ended"
//! lifecycle event rather than waiting out the next periodic check.

use mesh_core::{AgentDriver, SessionKey, Task, TaskStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const SELF_DRIVING_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfDrivingThresholds {
    pub same_step_limit: u32,
    pub zero_progress_limit: u32,
    pub max_consecutive_self_drives: u32,
    pub cooldown_ms: i64,
    pub max_steps_prompts: u32,
}

impl Default for SelfDrivingThresholds {
    fn default() -> Self {
        Self { same_step_limit: 3, zero_progress_limit: 5, max_consecutive_self_drives: 50, cooldown_ms: 60_000, max_steps_prompts: 3 }
    }
}

#[derive(Debug, Clone, Default)]
struct SelfDriveState {
    last_step_id: Option<String>,
    same_step_count: u32,
    last_done_count: usize,
    zero_progress_count: u32,
    consecutive_self_drives: u32,
    steps_prompt_count: u32,
    last_active_ms: i64,
}

/// What [`decide_self_drive`] concluded for one `checkAndSelfDrive` fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfDrivingDecision {
    NoActiveTask,
    NotInProgress,
    CommandQueueBusy,
    NeedsSteps,
    Escalate,
    Continue,
    Capped,
}

fn done_step_count(task: &Task) -> usize {
    task.steps.iter().filter(|s| s.status == mesh_core::StepStatus::Done).count()
}

/// Pure classification of one fire: no I/O, no mutation, fed the already
/// cooldown-reset state so it is trivially testable.
fn decide_self_drive(task: Option<&Task>, is_busy: bool, state: &SelfDriveState, thresholds: &SelfDrivingThresholds) -> SelfDrivingDecision {
    let Some(task) = task else { return SelfDrivingDecision::NoActiveTask };
    if task.status != TaskStatus::InProgress {
        return SelfDrivingDecision::NotInProgress;
    }
    if is_busy {
        return SelfDrivingDecision::CommandQueueBusy;
    }
    if task.steps.is_empty() && state.steps_prompt_count < thresholds.max_steps_prompts {
        return SelfDrivingDecision::NeedsSteps;
    }
    if state.consecutive_self_drives >= thresholds.max_consecutive_self_drives {
        return SelfDrivingDecision::Capped;
    }
    if state.same_step_count >= thresholds.same_step_limit || state.zero_progress_count >= thresholds.zero_progress_limit {
        return SelfDrivingDecision::Escalate;
    }
    SelfDrivingDecision::Continue
}

pub struct SelfDrivingLoop<C> {
    clock: C,
    task_store: Arc<mesh_store::TaskStore<C>>,
    driver: Arc<dyn AgentDriver>,
    thresholds: SelfDrivingThresholds,
    states: Mutex<HashMap<String, SelfDriveState>>,
}

impl<C: mesh_core::Clock> SelfDrivingLoop<C> {
    pub fn new(clock: C, task_store: Arc<mesh_store::TaskStore<C>>, driver: Arc<dyn AgentDriver>) -> Self {
        Self { clock, task_store, driver, thresholds: SelfDrivingThresholds::default(), states: Mutex::new(HashMap::new()) }
    }

    pub fn with_thresholds(mut self, thresholds: SelfDrivingThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Called on an `agent.lifecycle{phase=end}` event for a non-subagent
    /// session; the caller is responsible for the `SELF_DRIVING_DELAY_MS`
    /// sleep (so the driver loop stays cancellable by a fresh lifecycle
    /// event arriving in the meantime) before invoking this.
    pub async fn check_and_self_drive(&self, session_key: &SessionKey, agent_id: &mesh_core::AgentId) -> SelfDrivingDecision {
        let now_ms = self.clock.epoch_ms() as i64;
        let Ok(active) = self.task_store.find_active_task() else { return SelfDrivingDecision::NoActiveTask };

        let key = session_key.to_string();
        let mut states = self.states.lock().await;
        let state = states.entry(key.clone()).or_default();
        if now_ms - state.last_active_ms > self.thresholds.cooldown_ms {
            *state = SelfDriveState { last_active_ms: now_ms, ..Default::default() };
        }

        let is_busy = self.driver.is_busy(agent_id).await;
        let decision = decide_self_drive(active.as_ref(), is_busy, state, &self.thresholds);

        match decision {
            SelfDrivingDecision::NoActiveTask | SelfDrivingDecision::NotInProgress | SelfDrivingDecision::CommandQueueBusy | SelfDrivingDecision::Capped => {}
            SelfDrivingDecision::NeedsSteps => {
                state.steps_prompt_count += 1;
                state.last_active_ms = now_ms;
                let prompt = "This task has no steps defined yet. Please define the steps before continuing.";
                drop(states);
                let _ = self.driver.run_agent_step(session_key, prompt, 60_000).await;
                return decision;
            }
            SelfDrivingDecision::Escalate => {
                state.last_active_ms = now_ms;
                state.consecutive_self_drives += 1;
                drop(states);
                warn!(%session_key, "self-driving loop stalled, sending escalation prompt");
                let _ = self
                    .driver
                    .run_agent_step(session_key, "Progress appears stalled. Please fix the blocker, consult another agent, or ask the user for guidance.", 60_000)
                    .await;
                return decision;
            }
            SelfDrivingDecision::Continue => {
                if let Some(task) = &active {
                    let current_step = task.steps.iter().find(|s| s.status != mesh_core::StepStatus::Done).map(|s| s.id.clone());
                    if current_step == state.last_step_id {
                        state.same_step_count += 1;
                    } else {
                        state.same_step_count = 0;
                        state.last_step_id = current_step;
                    }
                    let done = done_step_count(task);
                    if done == state.last_done_count {
                        state.zero_progress_count += 1;
                    } else {
                        state.zero_progress_count = 0;
                        state.last_done_count = done;
                    }
                }
                state.consecutive_self_drives += 1;
                state.last_active_ms = now_ms;
                drop(states);
                info!(%session_key, "self-driving loop continuing task");
                let prompt = "Continue working on your active task.";
                let _ = self.driver.run_agent_step(session_key, prompt, 60_000).await;
            }
        }

        decision
    }
}

#[cfg(test)]
#[path = "self_driving_loop_tests.rs"]
mod tests;
