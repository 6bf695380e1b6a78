// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2AJobManager (§4.5): the durable record of every agent-to-agent
//! exchange, one `job-<jobId>.json` file per job under `<state>/a2a-jobs/`.

use crate::error::A2AJobError;
use mesh_core::{A2AJob, A2AJobStatus, A2ATaskContext, Clock, ConversationId, JobId};
use std::path::PathBuf;
use tracing::info;

pub struct A2AJobManager<C> {
    jobs_dir: PathBuf,
    lock_dir: PathBuf,
    clock: C,
}

impl<C: Clock> A2AJobManager<C> {
    pub fn new(state_dir: impl Into<PathBuf>, clock: C) -> Self {
        let state_dir = state_dir.into();
        Self { jobs_dir: state_dir.join("a2a-jobs"), lock_dir: state_dir.join("a2a-jobs/.locks"), clock }
    }

    fn job_path(&self, job_id: &JobId) -> PathBuf {
        self.jobs_dir.join(format!("{job_id}.json"))
    }

    pub fn create(
        &self,
        target_session_key: impl Into<String>,
        display_key: impl Into<String>,
        message: impl Into<String>,
        max_ping_pong_turns: u32,
        announce_timeout_ms: u64,
        conversation_id: Option<ConversationId>,
        task_context: Option<A2ATaskContext>,
    ) -> Result<A2AJob, A2AJobError> {
        let now = self.clock.epoch_ms() as i64;
        let job = A2AJob {
            job_id: JobId::new(),
            status: A2AJobStatus::Pending,
            target_session_key: target_session_key.into(),
            display_key: display_key.into(),
            message: message.into(),
            conversation_id,
            max_ping_pong_turns,
            current_turn: 0,
            announce_timeout_ms,
            task_context,
            created_at: now,
            updated_at: now,
            finished_at: None,
            resume_count: 0,
            last_error: None,
        };
        mesh_store::write_atomic(&self.job_path(&job.job_id), &job, now)?;
        info!(job_id = %job.job_id, target = %job.target_session_key, "a2a job created");
        Ok(job)
    }

    pub fn get(&self, job_id: &JobId) -> Result<Option<A2AJob>, A2AJobError> {
        match std::fs::read(self.job_path(job_id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(mesh_store::AtomicStoreError::from)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(mesh_store::AtomicStoreError::from(e).into()),
        }
    }

    /// Re-read, apply `mutate`, bump `updatedAt`, persist under the job's lock.
    /// Does not enforce the status state machine itself — the reaper uses
    /// this directly for its RUNNING→PENDING reset (§3), which the machine
    /// deliberately excludes. Normal lifecycle transitions should go through
    /// [`Self::transition_status`] instead.
    pub fn update_status(
        &self,
        job_id: &JobId,
        mutate: impl FnOnce(&mut A2AJob),
    ) -> Result<A2AJob, A2AJobError> {
        let now = self.clock.epoch_ms() as i64;
        let path = self.job_path(job_id);
        let lock_id = job_id.to_string();
        let updated = mesh_store::read_modify_write(
            &path,
            &self.lock_dir,
            &lock_id,
            now,
            || None::<A2AJob>,
            move |current| {
                let Some(mut job) = current else { return None };
                mutate(&mut job);
                job.updated_at = now;
                Some(job)
            },
        )?;
        updated.ok_or_else(|| A2AJobError::NotFound(job_id.to_string()))
    }

    /// Move the job to `next` if `A2AJobStatus::can_transition_to` allows it
    /// from its current status, applying `mutate` for any other field
    /// changes that go with the transition. Illegal transitions are ignored
    /// (§3) and the job is returned unchanged; the second element of the
    /// result says whether the transition was actually applied, which is
    /// what lets a caller tell "this call started the job" apart from "some
    /// earlier call already did" (§5's dual-start prevention).
    pub fn transition_status(
        &self,
        job_id: &JobId,
        next: A2AJobStatus,
        mutate: impl FnOnce(&mut A2AJob),
    ) -> Result<(A2AJob, bool), A2AJobError> {
        let now = self.clock.epoch_ms() as i64;
        let path = self.job_path(job_id);
        let lock_id = job_id.to_string();
        let applied = std::rc::Rc::new(std::cell::Cell::new(false));
        let applied_flag = applied.clone();
        let updated = mesh_store::read_modify_write(
            &path,
            &self.lock_dir,
            &lock_id,
            now,
            || None::<A2AJob>,
            move |current| {
                let Some(mut job) = current else { return None };
                if job.status.can_transition_to(next) {
                    job.status = next;
                    mutate(&mut job);
                    job.updated_at = now;
                    applied_flag.set(true);
                }
                Some(job)
            },
        )?;
        let job = updated.ok_or_else(|| A2AJobError::NotFound(job_id.to_string()))?;
        Ok((job, applied.get()))
    }

    fn scan(&self) -> Result<Vec<A2AJob>, A2AJobError> {
        let entries = match std::fs::read_dir(&self.jobs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(mesh_store::AtomicStoreError::from(e).into()),
        };

        let mut jobs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(mesh_store::AtomicStoreError::from)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(mesh_store::AtomicStoreError::from(e).into()),
            };
            let job: A2AJob = serde_json::from_slice(&bytes).map_err(mesh_store::AtomicStoreError::from)?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    pub fn get_incomplete_jobs(&self) -> Result<Vec<A2AJob>, A2AJobError> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|j| matches!(j.status, A2AJobStatus::Pending | A2AJobStatus::Running))
            .collect())
    }

    pub fn is_stale(&self, job: &A2AJob, stale_threshold_ms: i64) -> bool {
        job.is_stale(self.clock.epoch_ms() as i64, stale_threshold_ms)
    }

    /// Deletes COMPLETED|FAILED|ABANDONED jobs whose `finishedAt` is older
    /// than `retention_ms`. Returns the count deleted.
    pub fn cleanup_finished_jobs(&self, retention_ms: i64) -> Result<usize, A2AJobError> {
        let now = self.clock.epoch_ms() as i64;
        let mut deleted = 0;
        for job in self.scan()? {
            if job.is_retention_expired(now, retention_ms) {
                let path = self.job_path(&job.job_id);
                match std::fs::remove_file(&path) {
                    Ok(()) => deleted += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(mesh_store::AtomicStoreError::from(e).into()),
                }
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
