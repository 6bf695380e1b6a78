// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2AFlow (§4.8): drives one agent-to-agent exchange through
//! `Init → WaitingForFirstReply → PingPong(turn) → Announce → Complete|Failed`,
//! emitting lifecycle events throughout.

use crate::job::A2AJobManager;
use mesh_core::{
    classify, event_types, has_conclusion_marker, is_skip_token, resolve_effective_ping_pong_turns,
    should_run_announce, A2ATaskContext, AgentDriver, AgentDriverError, ChannelSender, Clock,
    ConversationEvent, ConversationId, EventRole, Intent, JobId, SessionKey, WaitStatus,
};
use mesh_core::AnnounceTargetResolver;
use mesh_events::EventBus;
use std::sync::Arc;
use tracing::{info, warn};

/// Ceiling on the first-reply wait (§4.8 step 1): 5 minutes of 30s chunks.
const MAX_WAIT_MS: u64 = 5 * 60 * 1000;
const WAIT_CHUNK_MS: u64 = 30 * 1000;
const REPLY_SKIP_TOKEN: &str = "REPLY_SKIP";
const ANNOUNCE_SKIP_TOKEN: &str = "ANNOUNCE_SKIP";
const MESSAGE_MAX_BYTES: usize = 4096;
const PREVIEW_MAX_CHARS: usize = 200;
const SIMILARITY_THRESHOLD: f64 = 0.7;
const MINIMAL_CONTENT_CHARS: usize = 10;

#[derive(Debug, Clone)]
pub struct A2AFlowParams {
    pub target_session_key: SessionKey,
    pub display_key: String,
    pub message: String,
    pub announce_timeout_ms: u64,
    pub max_ping_pong_turns: u32,
    pub requester_session_key: Option<SessionKey>,
    /// Pre-fetched first reply, bypassing the `wait`/`run` polling loop.
    pub round_one_reply: Option<String>,
    pub wait_run_id: Option<String>,
    pub conversation_id: Option<ConversationId>,
    pub task_context: Option<A2ATaskContext>,
    pub skip_ping_pong: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed { conversation_id: ConversationId, announced: bool },
    Failed { conversation_id: ConversationId, reason: String },
}

pub struct A2AFlow<C> {
    clock: C,
    bus: Arc<EventBus>,
    jobs: Arc<A2AJobManager<C>>,
    driver: Arc<dyn AgentDriver>,
    channel: Arc<dyn ChannelSender>,
    announce_resolver: Arc<dyn AnnounceTargetResolver>,
}

impl<C: Clock> A2AFlow<C> {
    pub fn new(
        clock: C,
        bus: Arc<EventBus>,
        jobs: Arc<A2AJobManager<C>>,
        driver: Arc<dyn AgentDriver>,
        channel: Arc<dyn ChannelSender>,
        announce_resolver: Arc<dyn AnnounceTargetResolver>,
    ) -> Self {
        Self { clock, bus, jobs, driver, channel, announce_resolver }
    }

    pub async fn run(&self, job_id: &JobId, params: A2AFlowParams) -> FlowOutcome {
        let conversation_id = params.conversation_id.clone().unwrap_or_else(ConversationId::new);

        match self.jobs.transition_status(job_id, mesh_core::A2AJobStatus::Running, |_| {}) {
            Ok((_, true)) => {}
            Ok((job, false)) => {
                warn!(job_id = %job_id, status = %job.status, "a2a job already past PENDING, refusing dual-start");
                return FlowOutcome::Failed {
                    conversation_id,
                    reason: format!("job {job_id} is not PENDING (status: {})", job.status),
                };
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "failed to mark a2a job running"),
        }

        match self.run_inner(&conversation_id, &params).await {
            Ok(announced) => {
                let _ = self.jobs.transition_status(job_id, mesh_core::A2AJobStatus::Completed, |j| {
                    j.finished_at = Some(j.updated_at);
                });
                FlowOutcome::Completed { conversation_id, announced }
            }
            Err(reason) => {
                let reason_for_job = reason.clone();
                let _ = self.jobs.transition_status(job_id, mesh_core::A2AJobStatus::Failed, |j| {
                    j.last_error = Some(reason_for_job);
                    j.finished_at = Some(j.updated_at);
                });
                FlowOutcome::Failed { conversation_id, reason }
            }
        }
    }

    async fn run_inner(&self, conversation_id: &ConversationId, params: &A2AFlowParams) -> Result<bool, String> {
        let event_role = derive_event_role(params.requester_session_key.as_ref(), &params.target_session_key);
        let from = params
            .requester_session_key
            .as_ref()
            .map(|k| k.agent_id.clone())
            .unwrap_or_else(|| "system".to_string());
        let to = params.target_session_key.agent_id.clone();

        let sanitized_message = sanitize_message(&params.message);
        self.emit(
            event_types::A2A_SEND,
            &from,
            &to,
            conversation_id,
            event_role,
            params.task_context.as_ref(),
            &[("message", sanitized_message.clone().into())],
        );

        let initial_reply = self.await_first_reply(params).await?;
        self.emit(
            event_types::A2A_RESPONSE,
            &to,
            &from,
            conversation_id,
            event_role,
            params.task_context.as_ref(),
            &[("replyPreview", truncate_chars(&initial_reply, PREVIEW_MAX_CHARS).into())],
        );

        let classification = classify(&sanitized_message);
        let same_session = params.requester_session_key.as_ref() == Some(&params.target_session_key);
        let is_notification = classification.intent == Intent::Notification;

        let effective_turns = if params.skip_ping_pong || same_session || is_notification {
            0
        } else {
            resolve_effective_ping_pong_turns(
                params.max_ping_pong_turns,
                classification.suggested_turns,
                params.skip_ping_pong,
            )
        };

        let mut previous_replies = vec![initial_reply.clone()];
        let mut current_text = initial_reply;
        let mut requester_turn = true;

        for turn in 1..=effective_turns {
            let (speaker, listener) = if requester_turn {
                (params.requester_session_key.as_ref(), &params.target_session_key)
            } else {
                (Some(&params.target_session_key), params.requester_session_key.as_ref().unwrap_or(&params.target_session_key))
            };
            let Some(speaker) = speaker else { break };

            let prompt = build_turn_prompt(requester_turn, turn, &current_text);
            let reply = match self
                .driver
                .run_agent_step(speaker, &prompt, params.announce_timeout_ms)
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!(turn, error = %e, "ping-pong turn failed, moving to announce");
                    break;
                }
            };

            if reply.is_empty() || is_skip_token(&reply, REPLY_SKIP_TOKEN) {
                break;
            }
            if turn >= 2 && previous_replies.iter().any(|p| mesh_core::calculate_similarity(p, &reply) > SIMILARITY_THRESHOLD) {
                break;
            }
            if reply.chars().count() < MINIMAL_CONTENT_CHARS && !reply.trim_end().ends_with('?') {
                break;
            }
            if has_conclusion_marker(&reply) {
                break;
            }

            let (from_agent, to_agent) = if requester_turn {
                (speaker.agent_id.clone(), listener.agent_id.clone())
            } else {
                (listener.agent_id.clone(), speaker.agent_id.clone())
            };
            self.emit(
                event_types::A2A_RESPONSE,
                &from_agent,
                &to_agent,
                conversation_id,
                event_role,
                params.task_context.as_ref(),
                &[
                    ("turn", (turn as i64).into()),
                    ("maxTurns", (effective_turns as i64).into()),
                    ("replyPreview", truncate_chars(&reply, PREVIEW_MAX_CHARS).into()),
                ],
            );

            previous_replies.push(reply.clone());
            current_text = reply;
            requester_turn = !requester_turn;
        }

        let announced = if is_notification {
            false
        } else {
            self.run_announce(params, &current_text).await
        };

        self.emit(
            event_types::A2A_COMPLETE,
            &from,
            &to,
            conversation_id,
            event_role,
            params.task_context.as_ref(),
            &[("announced", announced.into())],
        );

        Ok(announced)
    }

    async fn await_first_reply(&self, params: &A2AFlowParams) -> Result<String, String> {
        if let Some(reply) = &params.round_one_reply {
            return Ok(reply.clone());
        }
        let Some(run_id) = &params.wait_run_id else {
            return Err("no roundOneReply or waitRunId supplied".to_string());
        };

        let mut elapsed_ms = 0u64;
        loop {
            match self.driver.wait(run_id, WAIT_CHUNK_MS).await {
                WaitStatus::Ok => break,
                WaitStatus::NotFound => return Err(format!("run {run_id} not found")),
                WaitStatus::Error => return Err(format!("run {run_id} errored")),
                WaitStatus::Timeout => {
                    elapsed_ms += WAIT_CHUNK_MS;
                    if elapsed_ms >= MAX_WAIT_MS {
                        return Err(format!("run {run_id} did not complete within {MAX_WAIT_MS}ms"));
                    }
                }
            }
        }

        self.driver
            .read_latest_assistant_reply(&params.target_session_key)
            .await
            .ok_or_else(|| "no assistant reply recorded after run completed".to_string())
    }

    async fn run_announce(&self, params: &A2AFlowParams, latest_reply: &str) -> bool {
        let prompt = format!(
            "This is the announce step for your exchange with {}. Give a final summary to post externally, or reply {ANNOUNCE_SKIP_TOKEN} if nothing should be posted.",
            params.display_key
        );
        let reply = match self
            .driver
            .run_agent_step(&params.target_session_key, &prompt, params.announce_timeout_ms)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "announce step failed");
                latest_reply.to_string()
            }
        };

        if reply.is_empty() || is_skip_token(&reply, ANNOUNCE_SKIP_TOKEN) {
            return false;
        }

        let target = self.announce_resolver.resolve(&params.target_session_key);
        if !should_run_announce(target.as_ref(), &reply) {
            return false;
        }
        let Some(target) = target else { return false };

        match self.channel.send(&target, &reply).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "announce delivery failed, continuing");
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        event_type: &str,
        from: &str,
        to: &str,
        conversation_id: &ConversationId,
        event_role: EventRole,
        task_context: Option<&A2ATaskContext>,
        extra: &[(&str, serde_json::Value)],
    ) {
        let ts = self.clock.epoch_ms() as i64;
        let mut event = ConversationEvent::new(event_type, from, ts)
            .with("fromAgent", from)
            .with("toAgent", to)
            .with("conversationId", conversation_id.to_string())
            .with("eventRole", event_role.to_string());

        if let Some(ctx) = task_context {
            if let Some(task_id) = &ctx.task_id {
                event = event.with("taskId", task_id.to_string());
            }
            if let Some(ws) = &ctx.work_session_id {
                event = event.with("workSessionId", ws.to_string());
            }
            if let Some(parent) = &ctx.parent_conversation_id {
                event = event.with("parentConversationId", parent.to_string());
            }
            event = event.with("depth", ctx.depth as i64).with("hop", ctx.hop as i64);
        }

        for (key, value) in extra {
            event = event.with(*key, value.clone());
        }

        info!(event_type, from, to, "emitting a2a event");
        self.bus.emit(&event);
    }
}

fn derive_event_role(requester: Option<&SessionKey>, target: &SessionKey) -> EventRole {
    let requester_is_subagent = requester.map(SessionKey::is_subagent).unwrap_or(false);
    if target.is_subagent() || requester_is_subagent {
        EventRole::DelegationSubagent
    } else {
        EventRole::ConversationMain
    }
}

fn build_turn_prompt(requester_turn: bool, turn: u32, previous_text: &str) -> String {
    let role = if requester_turn { "requester" } else { "target" };
    format!("You are the {role} in turn {turn} of this exchange. Previous message: {previous_text}")
}

fn sanitize_message(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let stripped = strip_leading_directive(&normalized).to_string();
    truncate_bytes(&stripped, MESSAGE_MAX_BYTES)
}

fn strip_leading_directive(s: &str) -> &str {
    let trimmed = s.trim_start();
    if let Some(rest) = trimmed.strip_prefix("[[") {
        if let Some(end) = rest.find("]]") {
            return rest[end + 2..].trim_start();
        }
    }
    trimmed
}

fn truncate_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
