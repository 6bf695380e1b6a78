// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2AJobReaper (§4.6): runs once per process start to reconcile jobs left
//! incomplete by a prior, ungracefully terminated process.

use crate::error::A2AJobError;
use crate::job::A2AJobManager;
use mesh_core::{A2AJob, A2AJobStatus, Clock};
use tracing::info;

/// Default RUNNING staleness threshold (§3): one hour.
pub const DEFAULT_STALE_JOB_THRESHOLD_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaperCounts {
    pub total_incomplete: u32,
    pub abandoned: u32,
    pub reset_to_pending: u32,
}

pub struct A2AJobReaper<'a, C> {
    jobs: &'a A2AJobManager<C>,
    stale_job_threshold_ms: i64,
}

impl<'a, C: Clock> A2AJobReaper<'a, C> {
    pub fn new(jobs: &'a A2AJobManager<C>) -> Self {
        Self { jobs, stale_job_threshold_ms: DEFAULT_STALE_JOB_THRESHOLD_MS }
    }

    pub fn with_stale_threshold_ms(mut self, stale_job_threshold_ms: i64) -> Self {
        self.stale_job_threshold_ms = stale_job_threshold_ms;
        self
    }

    /// Enumerate incomplete jobs; for each, abandon it if stale, otherwise
    /// reset RUNNING back to PENDING and bump `resumeCount`. Idempotent in
    /// the sense that a second call against the same state sees nothing left
    /// to reconcile (every RUNNING job was just reset to PENDING, and every
    /// stale job just became ABANDONED), but the caller is expected to invoke
    /// this exactly once per process start.
    pub fn run_on_startup(&self) -> Result<ReaperCounts, A2AJobError> {
        let incomplete = self.jobs.get_incomplete_jobs()?;
        let mut counts = ReaperCounts { total_incomplete: incomplete.len() as u32, ..Default::default() };

        for job in incomplete {
            if self.jobs.is_stale(&job, self.stale_job_threshold_ms) {
                self.jobs.transition_status(&job.job_id, A2AJobStatus::Abandoned, |j| {
                    j.finished_at = j.finished_at.or(Some(j.updated_at));
                })?;
                counts.abandoned += 1;
                info!(job_id = %job.job_id, "abandoned stale a2a job on startup");
            } else if job.status == A2AJobStatus::Running {
                self.jobs.update_status(&job.job_id, |j| {
                    j.status = A2AJobStatus::Pending;
                    j.resume_count += 1;
                })?;
                counts.reset_to_pending += 1;
                info!(job_id = %job.job_id, resume_count = job.resume_count + 1, "reset running a2a job to pending");
            }
        }

        Ok(counts)
    }

    pub fn get_resumable_jobs(&self) -> Result<Vec<A2AJob>, A2AJobError> {
        Ok(self
            .jobs
            .get_incomplete_jobs()?
            .into_iter()
            .filter(|j| j.status == A2AJobStatus::Pending)
            .collect())
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
