use super::*;
use mesh_core::FakeClock;

#[test]
fn abandons_stale_running_and_resets_fresh_running_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let jobs = A2AJobManager::new(dir.path(), clock.clone());

    let stale = jobs.create("agent:a:main", "a", "m1", 0, 1_000, None, None).unwrap();
    jobs.update_status(&stale.job_id, |j| j.status = A2AJobStatus::Running).unwrap();
    clock.advance(std::time::Duration::from_secs(3700));

    let fresh = jobs.create("agent:b:main", "b", "m2", 0, 1_000, None, None).unwrap();
    jobs.update_status(&fresh.job_id, |j| j.status = A2AJobStatus::Running).unwrap();

    let pending = jobs.create("agent:c:main", "c", "m3", 0, 1_000, None, None).unwrap();

    let reaper = A2AJobReaper::new(&jobs).with_stale_threshold_ms(3_600_000);
    let counts = reaper.run_on_startup().unwrap();

    assert_eq!(counts.total_incomplete, 3);
    assert_eq!(counts.abandoned, 1);
    assert_eq!(counts.reset_to_pending, 1);

    assert_eq!(jobs.get(&stale.job_id).unwrap().unwrap().status, A2AJobStatus::Abandoned);
    let fresh_after = jobs.get(&fresh.job_id).unwrap().unwrap();
    assert_eq!(fresh_after.status, A2AJobStatus::Pending);
    assert_eq!(fresh_after.resume_count, 1);
    assert_eq!(jobs.get(&pending.job_id).unwrap().unwrap().status, A2AJobStatus::Pending);
}

#[test]
fn resumable_jobs_are_all_pending_after_reconciliation() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let jobs = A2AJobManager::new(dir.path(), clock.clone());

    let running = jobs.create("agent:a:main", "a", "m1", 0, 1_000, None, None).unwrap();
    jobs.update_status(&running.job_id, |j| j.status = A2AJobStatus::Running).unwrap();

    let reaper = A2AJobReaper::new(&jobs);
    reaper.run_on_startup().unwrap();

    let resumable = reaper.get_resumable_jobs().unwrap();
    assert_eq!(resumable.len(), 1);
    assert_eq!(resumable[0].job_id, running.job_id);
}

#[test]
fn no_incomplete_jobs_yields_zero_counts() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = A2AJobManager::new(dir.path(), FakeClock::new());
    let reaper = A2AJobReaper::new(&jobs);
    assert_eq!(reaper.run_on_startup().unwrap(), ReaperCounts::default());
}
