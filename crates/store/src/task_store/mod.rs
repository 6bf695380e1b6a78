// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent markdown task files: parser/serializer, queries, and the
//! lifecycle invariants in §4.4.

pub mod format;

use crate::error::TaskStoreError;
use crate::lock::Lock;
use mesh_core::{Clock, Outcome, Priority, Task, TaskId, TaskStatus};
use std::path::PathBuf;
use tracing::info;

/// Owns one agent workspace's `tasks/` directory.
pub struct TaskStore<C> {
    workspace_dir: PathBuf,
    clock: C,
}

/// Result of [`TaskStore::check_stop_guard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopGuardResult {
    pub blocked: bool,
    pub incomplete_steps: Vec<String>,
}

impl<C: Clock> TaskStore<C> {
    pub fn new(workspace_dir: impl Into<PathBuf>, clock: C) -> Self {
        Self { workspace_dir: workspace_dir.into(), clock }
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.workspace_dir.join("tasks")
    }

    pub fn task_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{id}.md"))
    }

    fn lock_id(id: &TaskId) -> String {
        id.to_string()
    }

    /// Read a task without taking its lock. Callers that intend to write
    /// MUST re-read under the lock (see [`Self::with_task_lock`]) — a plain
    /// read may observe a stale snapshot.
    pub fn read_task(&self, id: &TaskId) -> Result<Option<Task>, TaskStoreError> {
        let path = self.task_path(id);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(format::parse_task(id.clone(), &contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a new task under its lock and persist it.
    pub fn create_task(
        &self,
        description: impl Into<String>,
        context: impl Into<String>,
        source: impl Into<String>,
        priority: Priority,
    ) -> Result<Task, TaskStoreError> {
        let id = TaskId::new();
        let now = self.clock.epoch_ms();
        let created = crate::time::format_epoch_ms(now);
        let task = Task {
            id: id.clone(),
            status: TaskStatus::Pending,
            priority,
            description: description.into(),
            context: context.into(),
            source: source.into(),
            created: created.clone(),
            last_activity: created,
            work_session_id: mesh_core::WorkSessionId::new(),
            previous_work_session_id: None,
            progress: vec![],
            steps: vec![],
            blocking: None,
            backlog: None,
            outcome: None,
            delegations: vec![],
            delegation_events: vec![],
        };

        self.write_task_under_lock(&task)?;
        Ok(task)
    }

    /// Acquire the task's lock, write `task`, release. Callers that mutate
    /// an existing task should go through [`Self::with_task_lock`] instead
    /// so the read and the write happen under the same lock.
    pub fn write_task_under_lock(&self, task: &Task) -> Result<(), TaskStoreError> {
        let tasks_dir = self.tasks_dir();
        std::fs::create_dir_all(&tasks_dir)?;
        let lock_id = Self::lock_id(&task.id);
        let now = self.clock.epoch_ms() as i64;

        let lock = Lock::acquire(&tasks_dir, &lock_id, now)?
            .ok_or_else(|| TaskStoreError::LockBusy { resource: task.id.to_string() })?;
        let result = self.write_task_file(task);
        lock.release();
        result
    }

    fn write_task_file(&self, task: &Task) -> Result<(), TaskStoreError> {
        let rendered = format::format_task(task);
        crate::atomic::write_atomic_bytes(
            &self.task_path(&task.id),
            rendered.as_bytes(),
            self.clock.epoch_ms() as i64,
        )
        .map_err(TaskStoreError::from)
    }

    /// Re-read the task under its lock, apply `mutate`, write the result
    /// back, all before releasing. Used by `task_complete` and any other
    /// operation that must observe a consistent snapshot before committing.
    pub fn with_task_lock<E>(
        &self,
        id: &TaskId,
        mutate: impl FnOnce(Task) -> Result<Task, E>,
    ) -> Result<Task, TaskStoreError>
    where
        E: Into<TaskStoreError>,
    {
        let tasks_dir = self.tasks_dir();
        let lock_id = Self::lock_id(id);
        let now = self.clock.epoch_ms() as i64;

        let lock = Lock::acquire(&tasks_dir, &lock_id, now)?
            .ok_or_else(|| TaskStoreError::LockBusy { resource: id.to_string() })?;

        let result = (|| {
            let task = self.read_task(id)?.ok_or(TaskStoreError::NotFound)?;
            let updated = mutate(task).map_err(Into::into)?;
            self.write_task_file(&updated)?;
            Ok(updated)
        })();

        lock.release();
        result
    }

    /// `checkStopGuard`: empty/absent steps always pass; otherwise every
    /// step must be `done` or `skipped`.
    pub fn check_stop_guard(&self, task: &Task) -> StopGuardResult {
        let incomplete: Vec<String> =
            task.stop_guard_incomplete_steps().into_iter().map(str::to_string).collect();
        StopGuardResult { blocked: !incomplete.is_empty(), incomplete_steps: incomplete }
    }

    /// Re-read under lock, enforce the stop guard, write the completion.
    pub fn task_complete(
        &self,
        id: &TaskId,
        summary: Option<String>,
    ) -> Result<Task, TaskStoreError> {
        let now = self.clock.epoch_ms();
        let completed = self.with_task_lock(id, |mut task| {
            let guard = self.check_stop_guard(&task);
            if guard.blocked {
                return Err(TaskStoreError::StopGuardBlocked { steps: guard.incomplete_steps });
            }
            task.status = TaskStatus::Completed;
            task.outcome = Some(Outcome::Completed { summary });
            task.last_activity = crate::time::format_epoch_ms(now);
            Ok(task)
        })?;

        self.append_history(&completed)?;
        info!(task_id = %completed.id, "task completed");
        Ok(completed)
    }

    /// `listTasks`: directory scan over `task_*.md`, tolerant of files
    /// deleted between readdir and read.
    pub fn list_tasks(&self, status_filter: Option<TaskStatus>) -> Result<Vec<Task>, TaskStoreError> {
        let dir = self.tasks_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut tasks = vec![];
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if !name.starts_with("task_") || path.extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            let id = TaskId::from_string(name);
            match self.read_task(&id)? {
                Some(task) => tasks.push(task),
                None => continue, // deleted concurrently, or rejected as malformed
            }
        }

        if let Some(status) = status_filter {
            tasks.retain(|t| t.status == status);
        }
        Ok(tasks)
    }

    /// `findActiveTask`: first `in_progress` task, ordered by priority
    /// (urgent < high < medium < low), then `dueDate`, `startDate`,
    /// `createdAt`.
    pub fn find_active_task(&self) -> Result<Option<Task>, TaskStoreError> {
        let mut candidates = self.list_tasks(Some(TaskStatus::InProgress))?;
        candidates.sort_by(|a, b| {
            a.priority.cmp(&b.priority).then_with(|| {
                let due = |t: &Task| t.backlog.as_ref().and_then(|b| b.due_date.clone());
                let start = |t: &Task| t.backlog.as_ref().and_then(|b| b.start_date.clone());
                due(a).cmp(&due(b)).then_with(|| start(a).cmp(&start(b))).then_with(|| a.created.cmp(&b.created))
            })
        });
        Ok(candidates.into_iter().next())
    }

    /// `findPickableBacklogTask`: first backlog task whose `startDate` is
    /// not in the future and whose `dependsOn` are all either missing from
    /// disk (archived) or `status=completed`.
    pub fn find_pickable_backlog_task(&self, now_iso: &str) -> Result<Option<Task>, TaskStoreError> {
        let candidates = self.list_tasks(Some(TaskStatus::Backlog))?;
        for task in candidates {
            let Some(backlog) = &task.backlog else { continue };
            if let Some(start) = &backlog.start_date {
                if start.as_str() > now_iso {
                    continue;
                }
            }

            let mut all_ready = true;
            for dep_id in &backlog.depends_on {
                match self.read_task(dep_id)? {
                    None => {} // archived/missing counts as ready
                    Some(dep) if dep.status == TaskStatus::Completed => {}
                    Some(_) => {
                        all_ready = false;
                        break;
                    }
                }
            }

            if all_ready {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Append a completion/cancellation entry to `task-history/<YYYY-MM>.md`
    /// under a per-month lock, adding the header on first write.
    pub fn append_history(&self, task: &Task) -> Result<(), TaskStoreError> {
        let month = crate::time::epoch_ms_to_year_month(self.clock.epoch_ms());
        let history_dir = self.workspace_dir.join("task-history");
        std::fs::create_dir_all(&history_dir)?;
        let path = history_dir.join(format!("{month}.md"));
        let lock_id = format!("history-{month}");
        let now = self.clock.epoch_ms() as i64;

        let lock = Lock::acquire(&history_dir, &lock_id, now)?
            .ok_or_else(|| TaskStoreError::LockBusy { resource: lock_id.clone() })?;

        let mut existing = std::fs::read_to_string(&path).unwrap_or_default();
        if existing.is_empty() {
            existing.push_str(&format!("# Task History — {month}\n\n"));
        }
        existing.push_str(&format!(
            "- {} [{}] {} — {}\n",
            task.last_activity, task.status, task.id, task.description
        ));
        let result = std::fs::write(&path, existing).map_err(TaskStoreError::from);
        lock.release();
        result
    }

    /// Rewrite the denormalized `CURRENT_TASK.md` focus pointer. Never
    /// authoritative; safe to lose or regenerate.
    pub fn update_current_task_pointer(&self, task: Option<&Task>) -> Result<(), TaskStoreError> {
        let path = self.workspace_dir.join("CURRENT_TASK.md");
        let contents = match task {
            Some(t) => format!("# Current Task\n\n{} — {}\n", t.id, t.description),
            None => "# Current Task\n\n(none)\n".to_string(),
        };
        std::fs::write(&path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_store_tests.rs"]
mod tests;
