// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires every engine component from a [`Config`] and exposes the
//! CLI-free entry points a host process drives: `startup()` once, then
//! `tick()` on the configured `checkIntervalMs` cadence plus
//! `run_a2a_flow`/`check_and_self_drive` called in reaction to external
//! events. There is no `main()` here — the host supplies the `AgentDriver`,
//! `ChannelSender`, `AnnounceTargetResolver`, and `A2APolicy` and decides
//! how run loops and signal handling are wired.

use crate::config::Config;
use crate::error::EngineError;
use mesh_a2a::{A2AConcurrencyGate, A2AFlow, A2AFlowParams, A2AJobManager, A2AJobReaper, FlowOutcome, ReaperCounts};
use mesh_core::AnnounceTargetResolver;
use mesh_core::{A2APolicy, AgentDriver, AgentId, ChannelSender, Clock};
use mesh_events::{ConversationIndex, EventBus};
use mesh_scheduler::{ContinuationScheduler, SelfDrivingLoop, SessionReaper};
use mesh_store::TaskStore;
use std::sync::Arc;
use tracing::info;

/// Caller-supplied adapters the engine is driven through (§6). Grouped into
/// one struct so `Supervisor::new` doesn't take five separate `Arc`s.
pub struct Adapters {
    pub driver: Arc<dyn AgentDriver>,
    pub channel: Arc<dyn ChannelSender>,
    pub announce_resolver: Arc<dyn AnnounceTargetResolver>,
    pub policy: Arc<dyn A2APolicy>,
}

pub struct Supervisor<C> {
    config: Config,
    clock: C,
    bus: Arc<EventBus>,
    task_store: Arc<TaskStore<C>>,
    conversation_index: Arc<ConversationIndex<C>>,
    jobs: Arc<A2AJobManager<C>>,
    gate: Arc<A2AConcurrencyGate>,
    continuation: ContinuationScheduler<C>,
    self_driving: SelfDrivingLoop<C>,
    session_reaper: SessionReaper<C>,
    adapters: Adapters,
}

impl<C: Clock + Clone + Send + Sync + 'static> Supervisor<C> {
    pub fn new(config: Config, clock: C, adapters: Adapters) -> Self {
        let bus = Arc::new(EventBus::new());
        let task_store = Arc::new(TaskStore::new(&config.paths.state_dir, clock.clone()));
        let conversation_index = Arc::new(ConversationIndex::new(&config.paths.state_dir, clock.clone()));
        conversation_index.subscribe(&bus);

        let jobs = Arc::new(A2AJobManager::new(&config.paths.state_dir, clock.clone()));
        let gate = Arc::new(A2AConcurrencyGate::new(config.a2a.max_concurrent_flows));

        let continuation = ContinuationScheduler::new(
            clock.clone(),
            task_store.clone(),
            bus.clone(),
            adapters.driver.clone(),
            adapters.policy.clone(),
            adapters.channel.clone(),
            adapters.announce_resolver.clone(),
            config.paths.continuation_locks_dir(),
            config.agents.clone(),
            config.lead_agent.clone(),
        )
        .with_thresholds(config.continuation.to_thresholds());

        let self_driving = SelfDrivingLoop::new(clock.clone(), task_store.clone(), adapters.driver.clone())
            .with_thresholds(config.self_driving.to_thresholds());

        let session_reaper = SessionReaper::new(&config.paths.state_dir, clock.clone())
            .with_thresholds(config.session_reaper.to_thresholds());

        Self { config, clock, bus, task_store, conversation_index, jobs, gate, continuation, self_driving, session_reaper, adapters }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn task_store(&self) -> &Arc<TaskStore<C>> {
        &self.task_store
    }

    pub fn conversation_index(&self) -> &Arc<ConversationIndex<C>> {
        &self.conversation_index
    }

    /// Convenience passthrough so a host doesn't need its own
    /// `mesh-store` dependency just to enqueue a task (§4.4).
    pub fn create_task(
        &self,
        description: impl Into<String>,
        context: impl Into<String>,
        source: impl Into<String>,
        priority: mesh_core::Priority,
    ) -> Result<mesh_core::Task, EngineError> {
        Ok(self.task_store.create_task(description, context, source, priority)?)
    }

    /// Reconcile jobs left RUNNING by a prior, ungracefully terminated
    /// process (§4.6). Call exactly once, before the first `tick()`.
    pub fn startup(&self) -> Result<ReaperCounts, EngineError> {
        std::fs::create_dir_all(&self.config.paths.state_dir)
            .map_err(|source| EngineError::StateDir { path: self.config.paths.state_dir.display().to_string(), source })?;
        let counts = A2AJobReaper::new(&self.jobs).run_on_startup()?;
        info!(
            total_incomplete = counts.total_incomplete,
            abandoned = counts.abandoned,
            reset_to_pending = counts.reset_to_pending,
            "a2a job reaper ran on startup"
        );
        Ok(counts)
    }

    /// One `checkIntervalMs` pass: nudges idle agents, then sweeps
    /// `sessions.json` if its own throttle allows it (§4.11, §4.13).
    pub async fn tick(&self) {
        self.continuation.tick().await;
        match self.session_reaper.maybe_sweep() {
            Ok(Some(counts)) => info!(
                cron_ttl_removed = counts.cron_ttl_removed,
                a2a_ttl_removed = counts.a2a_ttl_removed,
                a2a_cap_removed = counts.a2a_cap_removed,
                "session reaper swept sessions.json"
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "session reaper sweep failed"),
        }
    }

    /// Reacts to an `agent.lifecycle{phase=end}` event for a non-subagent
    /// session; the caller owns the `SELF_DRIVING_DELAY_MS` sleep and the
    /// cancellation-on-new-event wiring (see [`mesh_scheduler::SelfDrivingLoop`]).
    pub async fn check_and_self_drive(&self, session_key: &mesh_core::SessionKey, agent_id: &AgentId) -> mesh_scheduler::SelfDrivingDecision {
        self.self_driving.check_and_self_drive(session_key, agent_id).await
    }

    /// Runs one A2A exchange end to end, admission-gated per target agent
    /// (§4.7). Creates the durable job record first so a crash mid-flow is
    /// reconciled by the next `startup()`.
    pub async fn run_a2a_flow(&self, params: A2AFlowParams) -> Result<FlowOutcome, EngineError> {
        let job = self.jobs.create(
            params.target_session_key.to_string(),
            params.display_key.clone(),
            params.message.clone(),
            params.max_ping_pong_turns,
            params.announce_timeout_ms,
            params.conversation_id.clone(),
            params.task_context.clone(),
        )?;

        let to = AgentId::new(params.target_session_key.agent_id.clone());
        self.gate.acquire(&to, self.config.a2a.concurrency_queue_timeout_ms).await?;

        let flow = A2AFlow::new(
            self.clock.clone(),
            self.bus.clone(),
            self.jobs.clone(),
            self.adapters.driver.clone(),
            self.adapters.channel.clone(),
            self.adapters.announce_resolver.clone(),
        );
        let outcome = flow.run(&job.job_id, params).await;
        self.gate.release(&to);
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
