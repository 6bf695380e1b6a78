// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure message-intent classification used by the A2A flow engine to pick a
//! ping-pong turn budget without any I/O.

use std::collections::HashSet;

crate::simple_display! {
    Intent {
        Notification => "notification",
        Escalation => "escalation",
        ResultReport => "result_report",
        Question => "question",
        Request => "request",
        Collaboration => "collaboration",
    }
}

/// One of the six recognized message intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Notification,
    Escalation,
    ResultReport,
    Question,
    Request,
    Collaboration,
}

impl Intent {
    /// Suggested ping-pong turn count. `-1` means "defer to config max".
    pub fn suggested_turns(self) -> i32 {
        match self {
            Intent::Notification => 0,
            Intent::Escalation => 0,
            Intent::ResultReport => 1,
            Intent::Question => 2,
            Intent::Request => 3,
            Intent::Collaboration => -1,
        }
    }
}

/// Result of classifying a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub suggested_turns: i32,
    pub confidence: f64,
}

const NOTIFICATION_MARKERS: [&str; 3] = ["전달합니다", "공유합니다", "알림:"];
const REPORT_MARKERS: [&str; 3] = ["완료했습니다", "결과를 보고", "[outcome]"];
const REQUEST_MARKERS: [&str; 3] = ["해줘", "해주세요", "부탁"];

/// Classify a message's intent. Pure: no I/O, safe to fuzz/property-test.
pub fn classify(message: &str) -> Classification {
    let lower = message.to_lowercase();

    if lower.contains("[no_reply_needed]")
        || lower.contains("[notification]")
        || NOTIFICATION_MARKERS.iter().any(|m| message.contains(m))
    {
        return finalize(Intent::Notification, 1.0);
    }

    if lower.contains("[urgent]") || lower.contains("[escalation]") {
        return finalize(Intent::Escalation, 1.0);
    }

    if REPORT_MARKERS.iter().any(|m| message.contains(m)) || lower.contains("task completed") {
        return finalize(Intent::ResultReport, 0.8);
    }

    if message.contains('?') || is_interrogative(&lower) {
        return finalize(Intent::Question, 0.7);
    }

    if REQUEST_MARKERS.iter().any(|m| message.contains(m)) {
        return finalize(Intent::Request, 0.7);
    }

    finalize(Intent::Collaboration, 0.5)
}

fn is_interrogative(lower: &str) -> bool {
    const STARTERS: [&str; 7] = ["can you", "could you", "would you", "what", "why", "how", "when"];
    STARTERS.iter().any(|s| lower.trim_start().starts_with(s))
}

fn finalize(intent: Intent, confidence: f64) -> Classification {
    Classification { intent, suggested_turns: intent.suggested_turns(), confidence }
}

/// Resolve the effective number of ping-pong turns to run for a flow,
/// per the priority order: explicit skip > intent veto > config fallback
/// > config cap.
pub fn resolve_effective_ping_pong_turns(
    config_max_turns: u32,
    suggested_turns: i32,
    explicit_skip_ping_pong: bool,
) -> u32 {
    if explicit_skip_ping_pong || suggested_turns == 0 {
        return 0;
    }
    if suggested_turns == -1 {
        return config_max_turns;
    }
    (suggested_turns as u32).min(config_max_turns)
}

/// Case-insensitive Jaccard similarity over whitespace-tokenized word sets.
/// Empty/empty is defined as identical (1.0); empty/non-empty as disjoint (0.0).
pub fn calculate_similarity(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.to_lowercase().split_whitespace().map(|w| w.to_string()).collect()
    };
    let wa = words(a);
    let wb = words(b);

    if wa.is_empty() && wb.is_empty() {
        return 1.0;
    }
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }

    let intersection = wa.intersection(&wb).count() as f64;
    let union = wa.union(&wb).count() as f64;
    intersection / union
}

/// A resolved announce target, as produced by an `AnnounceTargetResolver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceTarget {
    pub channel: String,
    pub to: String,
}

/// Whether the announce step should run at all.
pub fn should_run_announce(target: Option<&AnnounceTarget>, latest_reply: &str) -> bool {
    match target {
        None => false,
        Some(t) if t.channel == "internal" => false,
        Some(_) => !latest_reply.trim().is_empty(),
    }
}

/// Case-insensitive check for the turn-skip token, allowing a trailing `.`
/// or whitespace (`REPLY_SKIP`, `ANNOUNCE_SKIP`).
pub fn is_skip_token(reply: &str, token: &str) -> bool {
    let trimmed = reply.trim().trim_end_matches('.').trim();
    trimmed.eq_ignore_ascii_case(token)
}

const CONCLUSION_MARKERS_KO: [&str; 2] = ["확인했습니다", "알겠습니다"];
const CONCLUSION_MARKERS_EN: [&str; 3] = ["got it", "noted", "will do"];

/// Detect a conclusion marker in either Korean or English, signaling the
/// other side considers the exchange finished.
pub fn has_conclusion_marker(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    CONCLUSION_MARKERS_KO.iter().any(|m| reply.contains(m))
        || CONCLUSION_MARKERS_EN.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
#[path = "intent_tests.rs"]
mod tests;
