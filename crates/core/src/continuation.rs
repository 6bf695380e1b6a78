// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory (never persisted) per-agent continuation state tracked by the
//! scheduler between ticks.

use crate::ids::TaskId;

/// Why the agent's last continuation attempt failed, used to pick a
/// backoff policy in the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    RateLimit,
    Billing,
    Timeout,
    ContextOverflow,
    Unknown,
}

crate::simple_display! {
    FailureReason {
        RateLimit => "rate_limit",
        Billing => "billing",
        Timeout => "timeout",
        ContextOverflow => "context_overflow",
        Unknown => "unknown",
    }
}

/// The context-overflow error string patterns (§4.11's detection column),
/// shared by [`FailureReason::classify`] and [`tail_contains_context_overflow_error`].
fn matches_context_overflow_pattern(lower: &str) -> bool {
    lower.contains("context overflow")
        || lower.contains("token limit")
        || lower.contains("prompt is too long")
        || lower.contains("exceeds context")
}

impl FailureReason {
    /// Classify a raw agent error message into one of the backoff buckets.
    /// Falls back to `Unknown` when nothing matches.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("rate limit") || lower.contains("429") || lower.contains("quota") || lower.contains("reset after") {
            FailureReason::RateLimit
        } else if lower.contains("billing")
            || lower.contains("payment")
            || lower.contains("insufficient")
            || lower.contains("credit")
        {
            FailureReason::Billing
        } else if lower.contains("timeout") || lower.contains("deadline exceeded") {
            FailureReason::Timeout
        } else if matches_context_overflow_pattern(&lower) {
            FailureReason::ContextOverflow
        } else {
            FailureReason::Unknown
        }
    }
}

/// §4.11's context-overflow post-check: does the tail of a session's
/// append-only event log carry an assistant message that stopped with an
/// error matching the context-overflow patterns? Pure string inspection —
/// the scheduler owns reading the tail itself via `AgentDriver`.
pub fn tail_contains_context_overflow_error(tail: &str) -> bool {
    let lower = tail.to_lowercase();
    let has_errored_stop = lower.contains("stopreason\":\"error\"")
        || lower.contains("stop_reason\":\"error\"")
        || lower.contains("stopreason=error");
    has_errored_stop && matches_context_overflow_pattern(&lower)
}

/// Per-agent in-memory continuation tracking. Created lazily on first
/// attempt; the scheduler garbage-collects entries idle for 24h.
#[derive(Debug, Clone, Default)]
pub struct AgentContinuationState {
    pub last_continuation_sent_ms: Option<i64>,
    pub last_task_id: Option<TaskId>,
    pub backoff_until_ms: Option<i64>,
    pub consecutive_failures: u32,
    pub last_failure_reason: Option<FailureReason>,
}

impl AgentContinuationState {
    pub fn is_idle_since(&self, now_ms: i64, gc_after_ms: i64) -> bool {
        match self.last_continuation_sent_ms {
            Some(last) => now_ms - last > gc_after_ms,
            None => false,
        }
    }

    pub fn record_success(&mut self, now_ms: i64, task_id: TaskId) {
        self.last_continuation_sent_ms = Some(now_ms);
        self.last_task_id = Some(task_id);
        self.consecutive_failures = 0;
        self.last_failure_reason = None;
        self.backoff_until_ms = None;
    }

    pub fn record_failure(&mut self, reason: FailureReason, backoff_until_ms: i64) {
        self.consecutive_failures += 1;
        self.last_failure_reason = Some(reason);
        self.backoff_until_ms = Some(backoff_until_ms);
    }
}

#[cfg(test)]
#[path = "continuation_tests.rs"]
mod tests;
