// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only snapshot of durations, caps, and the agent roster (§6). Loaded
//! once at startup from a TOML file; no hot-reload or file watching.

use crate::error::ConfigError;
use mesh_core::AgentId;
use mesh_scheduler::{SelfDrivingThresholds, SessionReaperThresholds, Thresholds};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_max_concurrent_flows() -> u32 {
    4
}

fn default_announce_timeout_ms() -> u64 {
    60_000
}

fn default_max_ping_pong_turns() -> u32 {
    3
}

fn default_a2a_concurrency_queue_timeout_ms() -> u64 {
    30_000
}

/// `<state>/` paths (§6). Everything the engine persists lives under one
/// root so a single directory can be backed up or wiped wholesale.
#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    pub state_dir: PathBuf,
}

impl Paths {
    /// `TaskStore`, `A2AJobManager`, `ConversationIndex` and `SessionReaper`
    /// each derive their own subdirectory from this root; only the
    /// continuation scheduler's per-agent lock directory has no other owner.
    pub fn continuation_locks_dir(&self) -> PathBuf {
        self.state_dir.join("continuation.locks")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContinuationConfig {
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: i64,
    #[serde(default = "default_zombie_task_ttl_ms")]
    pub zombie_task_ttl_ms: i64,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: i64,
    #[serde(default = "default_max_reassign_count")]
    pub max_reassign_count: u32,
}

fn default_check_interval_ms() -> i64 {
    Thresholds::default().check_interval_ms
}
fn default_zombie_task_ttl_ms() -> i64 {
    Thresholds::default().zombie_task_ttl_ms
}
fn default_cooldown_ms() -> i64 {
    Thresholds::default().cooldown_ms
}
fn default_idle_threshold_ms() -> i64 {
    Thresholds::default().idle_threshold_ms
}
fn default_max_reassign_count() -> u32 {
    Thresholds::default().max_reassign_count
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        let t = Thresholds::default();
        Self {
            check_interval_ms: t.check_interval_ms,
            zombie_task_ttl_ms: t.zombie_task_ttl_ms,
            cooldown_ms: t.cooldown_ms,
            idle_threshold_ms: t.idle_threshold_ms,
            max_reassign_count: t.max_reassign_count,
        }
    }
}

impl ContinuationConfig {
    pub fn to_thresholds(&self) -> Thresholds {
        Thresholds {
            check_interval_ms: self.check_interval_ms,
            zombie_task_ttl_ms: self.zombie_task_ttl_ms,
            cooldown_ms: self.cooldown_ms,
            idle_threshold_ms: self.idle_threshold_ms,
            max_reassign_count: self.max_reassign_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelfDrivingConfig {
    #[serde(default = "default_same_step_limit")]
    pub same_step_limit: u32,
    #[serde(default = "default_zero_progress_limit")]
    pub zero_progress_limit: u32,
    #[serde(default = "default_max_consecutive_self_drives")]
    pub max_consecutive_self_drives: u32,
    #[serde(default = "default_self_driving_cooldown_ms")]
    pub cooldown_ms: i64,
    #[serde(default = "default_max_steps_prompts")]
    pub max_steps_prompts: u32,
}

fn default_same_step_limit() -> u32 {
    SelfDrivingThresholds::default().same_step_limit
}
fn default_zero_progress_limit() -> u32 {
    SelfDrivingThresholds::default().zero_progress_limit
}
fn default_max_consecutive_self_drives() -> u32 {
    SelfDrivingThresholds::default().max_consecutive_self_drives
}
fn default_self_driving_cooldown_ms() -> i64 {
    SelfDrivingThresholds::default().cooldown_ms
}
fn default_max_steps_prompts() -> u32 {
    SelfDrivingThresholds::default().max_steps_prompts
}

impl Default for SelfDrivingConfig {
    fn default() -> Self {
        let t = SelfDrivingThresholds::default();
        Self {
            same_step_limit: t.same_step_limit,
            zero_progress_limit: t.zero_progress_limit,
            max_consecutive_self_drives: t.max_consecutive_self_drives,
            cooldown_ms: t.cooldown_ms,
            max_steps_prompts: t.max_steps_prompts,
        }
    }
}

impl SelfDrivingConfig {
    pub fn to_thresholds(&self) -> SelfDrivingThresholds {
        SelfDrivingThresholds {
            same_step_limit: self.same_step_limit,
            zero_progress_limit: self.zero_progress_limit,
            max_consecutive_self_drives: self.max_consecutive_self_drives,
            cooldown_ms: self.cooldown_ms,
            max_steps_prompts: self.max_steps_prompts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionReaperConfig {
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: i64,
    #[serde(default = "default_cron_retention_ms")]
    pub cron_retention_ms: i64,
    #[serde(default = "default_a2a_ttl_ms")]
    pub a2a_ttl_ms: i64,
    #[serde(default = "default_max_per_agent")]
    pub max_per_agent: usize,
}

fn default_sweep_interval_ms() -> i64 {
    SessionReaperThresholds::default().sweep_interval_ms
}
fn default_cron_retention_ms() -> i64 {
    SessionReaperThresholds::default().cron_retention_ms
}
fn default_a2a_ttl_ms() -> i64 {
    SessionReaperThresholds::default().a2a_ttl_ms
}
fn default_max_per_agent() -> usize {
    SessionReaperThresholds::default().max_per_agent
}

impl Default for SessionReaperConfig {
    fn default() -> Self {
        let t = SessionReaperThresholds::default();
        Self {
            sweep_interval_ms: t.sweep_interval_ms,
            cron_retention_ms: t.cron_retention_ms,
            a2a_ttl_ms: t.a2a_ttl_ms,
            max_per_agent: t.max_per_agent,
        }
    }
}

impl SessionReaperConfig {
    pub fn to_thresholds(&self) -> SessionReaperThresholds {
        SessionReaperThresholds {
            sweep_interval_ms: self.sweep_interval_ms,
            cron_retention_ms: self.cron_retention_ms,
            a2a_ttl_ms: self.a2a_ttl_ms,
            max_per_agent: self.max_per_agent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct A2AConfig {
    #[serde(default = "default_max_ping_pong_turns")]
    pub max_ping_pong_turns: u32,
    #[serde(default = "default_announce_timeout_ms")]
    pub announce_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_flows")]
    pub max_concurrent_flows: u32,
    #[serde(default = "default_a2a_concurrency_queue_timeout_ms")]
    pub concurrency_queue_timeout_ms: u64,
    #[serde(default = "default_stale_job_threshold_ms")]
    pub stale_job_threshold_ms: i64,
}

fn default_stale_job_threshold_ms() -> i64 {
    mesh_a2a::DEFAULT_STALE_JOB_THRESHOLD_MS
}

impl Default for A2AConfig {
    fn default() -> Self {
        Self {
            max_ping_pong_turns: default_max_ping_pong_turns(),
            announce_timeout_ms: default_announce_timeout_ms(),
            max_concurrent_flows: default_max_concurrent_flows(),
            concurrency_queue_timeout_ms: default_a2a_concurrency_queue_timeout_ms(),
            stale_job_threshold_ms: default_stale_job_threshold_ms(),
        }
    }
}

/// Top-level config (§6), deserialized from a single TOML file at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: Paths,
    #[serde(default)]
    pub agents: Vec<AgentId>,
    #[serde(default)]
    pub lead_agent: Option<AgentId>,
    #[serde(default)]
    pub continuation: ContinuationConfig,
    #[serde(default)]
    pub self_driving: SelfDrivingConfig,
    #[serde(default)]
    pub session_reaper: SessionReaperConfig,
    #[serde(default)]
    pub a2a: A2AConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

