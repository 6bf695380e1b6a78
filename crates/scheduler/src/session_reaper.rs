// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SessionReaper (§4.13): throttled TTL + per-agent cap GC over the
//! ephemeral `<state>/sessions.json` store, the same atomic-store idiom as
//! [`mesh_a2a::A2AJobManager::cleanup_finished_jobs`] applied to a single
//! shared file instead of one-file-per-record.

use mesh_core::{AgentId, Clock};
use mesh_store::AtomicStoreError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionReaperThresholds {
    pub sweep_interval_ms: i64,
    pub cron_retention_ms: i64,
    pub a2a_ttl_ms: i64,
    pub max_per_agent: usize,
}

impl Default for SessionReaperThresholds {
    fn default() -> Self {
        Self { sweep_interval_ms: 5 * 60_000, cron_retention_ms: 24 * 3_600_000, a2a_ttl_ms: 3_600_000, max_per_agent: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronRunSession {
    pub id: String,
    pub agent_id: AgentId,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AConversationSession {
    pub id: String,
    pub agent_id: AgentId,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecords {
    #[serde(default)]
    pub cron_runs: Vec<CronRunSession>,
    #[serde(default)]
    pub a2a_conversations: Vec<A2AConversationSession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepCounts {
    pub cron_ttl_removed: u32,
    pub a2a_ttl_removed: u32,
    pub a2a_cap_removed: u32,
}

/// Pure sweep over an in-memory snapshot: TTL filters first, then the
/// per-agent cap (keeps the most recently updated entries).
fn sweep_records(mut records: SessionRecords, now_ms: i64, thresholds: &SessionReaperThresholds) -> (SessionRecords, SweepCounts) {
    let mut counts = SweepCounts::default();

    let before = records.cron_runs.len();
    records.cron_runs.retain(|s| now_ms - s.updated_at <= thresholds.cron_retention_ms);
    counts.cron_ttl_removed = (before - records.cron_runs.len()) as u32;

    let before = records.a2a_conversations.len();
    records.a2a_conversations.retain(|s| now_ms - s.updated_at <= thresholds.a2a_ttl_ms);
    counts.a2a_ttl_removed = (before - records.a2a_conversations.len()) as u32;

    let mut by_agent: HashMap<AgentId, Vec<usize>> = HashMap::new();
    for (idx, session) in records.a2a_conversations.iter().enumerate() {
        by_agent.entry(session.agent_id.clone()).or_default().push(idx);
    }

    let mut drop_indices = std::collections::HashSet::new();
    for (_, mut indices) in by_agent {
        if indices.len() <= thresholds.max_per_agent {
            continue;
        }
        indices.sort_by_key(|&idx| std::cmp::Reverse(records.a2a_conversations[idx].updated_at));
        for &idx in indices.iter().skip(thresholds.max_per_agent) {
            drop_indices.insert(idx);
        }
    }
    counts.a2a_cap_removed = drop_indices.len() as u32;

    if !drop_indices.is_empty() {
        let mut idx = 0;
        records.a2a_conversations.retain(|_| {
            let keep = !drop_indices.contains(&idx);
            idx += 1;
            keep
        });
    }

    (records, counts)
}

pub struct SessionReaper<C> {
    clock: C,
    path: PathBuf,
    lock_dir: PathBuf,
    thresholds: SessionReaperThresholds,
    last_sweep_ms: Mutex<Option<i64>>,
}

impl<C: Clock> SessionReaper<C> {
    pub fn new(state_dir: impl Into<PathBuf>, clock: C) -> Self {
        let state_dir = state_dir.into();
        Self {
            clock,
            path: state_dir.join("sessions.json"),
            lock_dir: state_dir.join("sessions.locks"),
            thresholds: SessionReaperThresholds::default(),
            last_sweep_ms: Mutex::new(None),
        }
    }

    pub fn with_thresholds(mut self, thresholds: SessionReaperThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn record_a2a_conversation(&self, id: impl Into<String>, agent_id: AgentId) -> Result<(), AtomicStoreError> {
        let now = self.clock.epoch_ms() as i64;
        let id = id.into();
        mesh_store::read_modify_write(&self.path, &self.lock_dir, "sessions", now, SessionRecords::default, move |mut records| {
            records.a2a_conversations.retain(|s| s.id != id);
            records.a2a_conversations.push(A2AConversationSession { id, agent_id, updated_at: now });
            records
        })?;
        Ok(())
    }

    pub fn record_cron_run(&self, id: impl Into<String>, agent_id: AgentId) -> Result<(), AtomicStoreError> {
        let now = self.clock.epoch_ms() as i64;
        let id = id.into();
        mesh_store::read_modify_write(&self.path, &self.lock_dir, "sessions", now, SessionRecords::default, move |mut records| {
            records.cron_runs.retain(|s| s.id != id);
            records.cron_runs.push(CronRunSession { id, agent_id, updated_at: now });
            records
        })?;
        Ok(())
    }

    /// Runs the TTL + cap sweep unless the last sweep happened within
    /// `sweep_interval_ms`; returns `None` when throttled.
    pub fn maybe_sweep(&self) -> Result<Option<SweepCounts>, AtomicStoreError> {
        let now = self.clock.epoch_ms() as i64;
        {
            let last = self.last_sweep_ms.lock();
            if let Some(last_ms) = *last {
                if now - last_ms < self.thresholds.sweep_interval_ms {
                    return Ok(None);
                }
            }
        }

        let thresholds = self.thresholds;
        let mut counts = SweepCounts::default();
        mesh_store::read_modify_write(&self.path, &self.lock_dir, "sessions", now, SessionRecords::default, |records| {
            let (swept, swept_counts) = sweep_records(records, now, &thresholds);
            counts = swept_counts;
            swept
        })?;

        *self.last_sweep_ms.lock() = Some(now);
        Ok(Some(counts))
    }
}

#[cfg(test)]
#[path = "session_reaper_tests.rs"]
mod tests;
