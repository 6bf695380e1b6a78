use super::*;

fn sample(status: A2AJobStatus, updated_at: i64) -> A2AJob {
    A2AJob {
        job_id: JobId::new(),
        status,
        target_session_key: "agent:worker-1:main".into(),
        display_key: "worker-1".into(),
        message: "hello".into(),
        conversation_id: None,
        max_ping_pong_turns: 3,
        current_turn: 0,
        announce_timeout_ms: 30_000,
        task_context: None,
        created_at: 0,
        updated_at,
        finished_at: None,
        resume_count: 0,
        last_error: None,
    }
}

#[test]
fn status_transitions_follow_the_machine() {
    use A2AJobStatus::*;
    assert!(Pending.can_transition_to(Running));
    assert!(Running.can_transition_to(Completed));
    assert!(Running.can_transition_to(Failed));
    assert!(Running.can_transition_to(Abandoned));
    assert!(!Completed.can_transition_to(Running));
    assert!(!Pending.can_transition_to(Completed));
}

#[test]
fn finished_statuses() {
    assert!(A2AJobStatus::Completed.is_finished());
    assert!(A2AJobStatus::Failed.is_finished());
    assert!(A2AJobStatus::Abandoned.is_finished());
    assert!(!A2AJobStatus::Running.is_finished());
    assert!(!A2AJobStatus::Pending.is_finished());
}

#[test]
fn stale_only_applies_to_running_past_threshold() {
    let job = sample(A2AJobStatus::Running, 0);
    let one_hour_ms = 60 * 60 * 1000;
    assert!(job.is_stale(one_hour_ms + 1, one_hour_ms));
    assert!(!job.is_stale(one_hour_ms - 1, one_hour_ms));

    let pending = sample(A2AJobStatus::Pending, 0);
    assert!(!pending.is_stale(one_hour_ms * 10, one_hour_ms));
}

#[test]
fn retention_expiry_requires_finished_status_and_timestamp() {
    let mut job = sample(A2AJobStatus::Completed, 0);
    let week_ms: i64 = 7 * 24 * 60 * 60 * 1000;
    assert!(!job.is_retention_expired(week_ms, week_ms)); // finished_at absent
    job.finished_at = Some(0);
    assert!(job.is_retention_expired(week_ms + 1, week_ms));
    assert!(!job.is_retention_expired(week_ms - 1, week_ms));
}

#[test]
fn retention_expiry_ignores_unfinished_jobs() {
    let mut job = sample(A2AJobStatus::Running, 0);
    job.finished_at = Some(0);
    assert!(!job.is_retention_expired(10_000_000, 1));
}

#[test]
fn job_round_trips_through_json() {
    let job = sample(A2AJobStatus::Running, 42);
    let json = serde_json::to_string(&job).unwrap();
    assert!(json.contains("\"RUNNING\""));
    let parsed: A2AJob = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.job_id, job.job_id);
    assert_eq!(parsed.status, job.status);
}
