// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Markdown serialization for [`Task`] (§4.4).
//!
//! Sections: `## Metadata`, `## Description`, `## Context`, `## Source`,
//! `## Steps`, `## Progress`, `## Blocking`/`## Backlog`/`## Outcome`/
//! `## Delegations` (fenced JSON blobs). The parser is tolerant: unknown
//! sections are ignored, a malformed JSON blob just leaves that field
//! unset, and only `description`/`created` are hard requirements — their
//! absence rejects the whole file.

use mesh_core::{
    Backlog, Blocking, Delegation, DelegationEvent, Outcome, Priority, Step, StepStatus, Task,
    TaskStatus,
};
use mesh_core::{TaskId, WorkSessionId};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Parse a task markdown document. Returns `None` if `description` or
/// `created` is missing (§4.4).
pub fn parse_task(id: TaskId, source: &str) -> Option<Task> {
    let sections = split_sections(source);

    let metadata = parse_metadata(sections.get("metadata").map(String::as_str).unwrap_or(""));
    let description = sections.get("description").map(|s| s.trim().to_string())?;
    let created = metadata.get("created")?.clone();

    let context = sections.get("context").map(|s| s.trim().to_string()).unwrap_or_default();
    let source_field = sections.get("source").map(|s| s.trim().to_string()).unwrap_or_default();
    let last_activity = metadata.get("last_activity").cloned().unwrap_or_else(|| created.clone());
    let status = metadata
        .get("status")
        .and_then(|s| parse_status(s))
        .unwrap_or(TaskStatus::Pending);
    let priority = metadata
        .get("priority")
        .and_then(|s| parse_priority(s))
        .unwrap_or(Priority::Medium);
    let work_session_id = metadata
        .get("work_session_id")
        .map(WorkSessionId::from_string)
        .unwrap_or_else(WorkSessionId::new);
    let previous_work_session_id =
        metadata.get("previous_work_session_id").map(WorkSessionId::from_string);

    let steps = sections.get("steps").map(|s| parse_steps(s)).unwrap_or_default();
    let progress = sections.get("progress").map(|s| parse_progress(s)).unwrap_or_default();

    let blocking = sections.get("blocking").and_then(|s| parse_json_blob::<Blocking>(s));
    let backlog = sections.get("backlog").and_then(|s| parse_json_blob::<Backlog>(s));
    let outcome = sections.get("outcome").and_then(|s| parse_json_blob::<Outcome>(s));
    let (delegations, delegation_events) = sections
        .get("delegations")
        .and_then(|s| parse_json_blob::<DelegationsBlob>(s))
        .map(|b| (b.delegations, b.events))
        .unwrap_or_default();

    Some(Task {
        id,
        status,
        priority,
        description,
        context,
        source: source_field,
        created,
        last_activity,
        work_session_id,
        previous_work_session_id,
        progress,
        steps,
        blocking,
        backlog,
        outcome,
        delegations,
        delegation_events,
    })
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct DelegationsBlob {
    #[serde(default)]
    delegations: Vec<Delegation>,
    #[serde(default)]
    events: Vec<DelegationEvent>,
}

/// Render a task back to markdown. `parse_task(format_task(t)) == t` for
/// every shape this module constructs (§8 round-trip law); unknown
/// sections are never round-tripped because none are ever written.
pub fn format_task(task: &Task) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "## Metadata");
    let _ = writeln!(out, "- id: {}", task.id);
    let _ = writeln!(out, "- status: {}", task.status);
    let _ = writeln!(out, "- priority: {}", task.priority);
    let _ = writeln!(out, "- created: {}", task.created);
    let _ = writeln!(out, "- last_activity: {}", task.last_activity);
    let _ = writeln!(out, "- work_session_id: {}", task.work_session_id);
    if let Some(prev) = &task.previous_work_session_id {
        let _ = writeln!(out, "- previous_work_session_id: {prev}");
    }
    out.push('\n');

    let _ = writeln!(out, "## Description\n{}\n", task.description);
    let _ = writeln!(out, "## Context\n{}\n", task.context);
    let _ = writeln!(out, "## Source\n{}\n", task.source);

    let _ = writeln!(out, "## Steps");
    for step in &task.steps {
        let mark = match step.status {
            StepStatus::Pending => ' ',
            StepStatus::InProgress => '~',
            StepStatus::Done => 'x',
            StepStatus::Skipped => '-',
        };
        let _ = writeln!(out, "- [{mark}] {}: {}", step.id, step.content);
    }
    out.push('\n');

    let _ = writeln!(out, "## Progress");
    for entry in &task.progress {
        let _ = writeln!(out, "- {entry}");
    }
    out.push('\n');

    if let Some(blocking) = &task.blocking {
        write_json_section(&mut out, "Blocking", blocking);
    }
    if let Some(backlog) = &task.backlog {
        write_json_section(&mut out, "Backlog", backlog);
    }
    if let Some(outcome) = &task.outcome {
        write_json_section(&mut out, "Outcome", outcome);
    }
    if !task.delegations.is_empty() || !task.delegation_events.is_empty() {
        let blob = DelegationsBlob {
            delegations: task.delegations.clone(),
            events: task.delegation_events.clone(),
        };
        write_json_section(&mut out, "Delegations", &blob);
    }

    out
}

fn write_json_section<T: serde::Serialize>(out: &mut String, name: &str, value: &T) {
    let _ = writeln!(out, "## {name}");
    let _ = writeln!(out, "```json");
    if let Ok(json) = serde_json::to_string_pretty(value) {
        out.push_str(&json);
        out.push('\n');
    }
    let _ = writeln!(out, "```\n");
}

/// Split a markdown document into `## Section Name` blocks, keyed by
/// lowercased section name. Content before the first header is discarded.
fn split_sections(source: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current_name: Option<String> = None;
    let mut current_body = String::new();

    for line in source.lines() {
        if let Some(name) = line.strip_prefix("## ") {
            if let Some(prev) = current_name.take() {
                sections.insert(prev, std::mem::take(&mut current_body));
            }
            current_name = Some(name.trim().to_lowercase());
        } else if current_name.is_some() {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    if let Some(prev) = current_name.take() {
        sections.insert(prev, current_body);
    }

    sections
}

fn parse_metadata(body: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in body.lines() {
        let line = line.trim().trim_start_matches('-').trim();
        if let Some((key, value)) = line.split_once(':') {
            map.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    map
}

fn parse_status(s: &str) -> Option<TaskStatus> {
    Some(match s {
        "pending" => TaskStatus::Pending,
        "pending_approval" => TaskStatus::PendingApproval,
        "in_progress" => TaskStatus::InProgress,
        "blocked" => TaskStatus::Blocked,
        "backlog" => TaskStatus::Backlog,
        "completed" => TaskStatus::Completed,
        "cancelled" => TaskStatus::Cancelled,
        "abandoned" => TaskStatus::Abandoned,
        "interrupted" => TaskStatus::Interrupted,
        _ => return None,
    })
}

fn parse_priority(s: &str) -> Option<Priority> {
    Some(match s {
        "urgent" => Priority::Urgent,
        "high" => Priority::High,
        "medium" => Priority::Medium,
        "low" => Priority::Low,
        _ => return None,
    })
}

fn parse_steps(body: &str) -> Vec<Step> {
    body.lines()
        .enumerate()
        .filter_map(|(order, line)| {
            let line = line.trim();
            let rest = line.strip_prefix("- [")?;
            let (mark, rest) = rest.split_once(']')?;
            let status = match mark {
                " " => StepStatus::Pending,
                "~" => StepStatus::InProgress,
                "x" | "X" => StepStatus::Done,
                "-" => StepStatus::Skipped,
                _ => return None,
            };
            let rest = rest.trim();
            let (id, content) = rest.split_once(':')?;
            Some(Step {
                id: id.trim().to_string(),
                content: content.trim().to_string(),
                status,
                order: order as u32,
            })
        })
        .collect()
}

fn parse_progress(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("- ").map(|s| s.trim().to_string()))
        .collect()
}

/// Extract and parse a fenced ` ```json ... ``` ` blob. Returns `None` on
/// malformed JSON so the caller leaves the field unset rather than
/// rejecting the whole file.
fn parse_json_blob<T: serde::de::DeserializeOwned>(body: &str) -> Option<T> {
    let start = body.find("```json")? + "```json".len();
    let rest = &body[start..];
    let end = rest.find("```")?;
    serde_json::from_str(&rest[..end]).ok()
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
