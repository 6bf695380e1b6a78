use super::*;
use crate::ids::AgentId;

fn minimal_task(status: TaskStatus) -> Task {
    Task {
        id: TaskId::new(),
        status,
        priority: Priority::Medium,
        description: "do the thing".to_string(),
        context: String::new(),
        source: "user".to_string(),
        created: "2026-01-01T00:00:00Z".to_string(),
        last_activity: "2026-01-01T00:00:00Z".to_string(),
        work_session_id: WorkSessionId::new(),
        previous_work_session_id: None,
        progress: vec![],
        steps: vec![],
        blocking: None,
        backlog: None,
        outcome: None,
        delegations: vec![],
        delegation_events: vec![],
    }
}

#[test]
fn terminal_statuses() {
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
    assert!(TaskStatus::Abandoned.is_terminal());
    assert!(!TaskStatus::Interrupted.is_terminal());
    assert!(!TaskStatus::InProgress.is_terminal());
}

#[test]
fn semi_terminal_is_only_interrupted() {
    assert!(TaskStatus::Interrupted.is_semi_terminal());
    assert!(!TaskStatus::Completed.is_semi_terminal());
}

#[test]
fn priority_orders_urgent_first() {
    let mut v = vec![Priority::Low, Priority::Urgent, Priority::Medium, Priority::High];
    v.sort();
    assert_eq!(v, vec![Priority::Urgent, Priority::High, Priority::Medium, Priority::Low]);
}

#[test]
fn stop_guard_passes_when_steps_empty() {
    let task = minimal_task(TaskStatus::Completed);
    assert!(task.stop_guard_incomplete_steps().is_empty());
}

#[test]
fn stop_guard_blocks_on_incomplete_steps() {
    let mut task = minimal_task(TaskStatus::InProgress);
    task.steps = vec![
        Step { id: "s1".into(), content: "a".into(), status: StepStatus::Done, order: 0 },
        Step { id: "s2".into(), content: "b".into(), status: StepStatus::InProgress, order: 1 },
        Step { id: "s3".into(), content: "c".into(), status: StepStatus::Pending, order: 2 },
    ];
    let incomplete = task.stop_guard_incomplete_steps();
    assert_eq!(incomplete, vec!["s2", "s3"]);
}

#[test]
fn stop_guard_allows_all_skipped() {
    let mut task = minimal_task(TaskStatus::InProgress);
    task.steps = vec![
        Step { id: "s1".into(), content: "a".into(), status: StepStatus::Skipped, order: 0 },
        Step { id: "s2".into(), content: "b".into(), status: StepStatus::Done, order: 1 },
    ];
    assert!(task.stop_guard_incomplete_steps().is_empty());
}

#[test]
fn blocked_invariant_requires_reason() {
    let mut task = minimal_task(TaskStatus::Blocked);
    assert!(!task.blocked_invariant_holds());
    task.blocking = Some(Blocking { blocked_reason: Some("waiting".into()), ..Default::default() });
    assert!(task.blocked_invariant_holds());
}

#[test]
fn non_blocked_status_always_satisfies_invariant() {
    let task = minimal_task(TaskStatus::InProgress);
    assert!(task.blocked_invariant_holds());
}

#[test]
fn delegation_summary_counts_by_status() {
    let agent = AgentId::new("worker-1");
    let delegations = vec![
        Delegation {
            id: DelegationId::new(),
            to_agent: agent.clone(),
            description: "a".into(),
            status: DelegationStatus::Running,
            created_at: "t".into(),
        },
        Delegation {
            id: DelegationId::new(),
            to_agent: agent.clone(),
            description: "b".into(),
            status: DelegationStatus::Completed,
            created_at: "t".into(),
        },
        Delegation {
            id: DelegationId::new(),
            to_agent: agent,
            description: "c".into(),
            status: DelegationStatus::Failed,
            created_at: "t".into(),
        },
    ];
    let summary = DelegationSummary::compute(&delegations);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.running, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.all_settled);
}

#[test]
fn delegation_summary_all_settled_when_none_running() {
    let agent = AgentId::new("worker-1");
    let delegations = vec![Delegation {
        id: DelegationId::new(),
        to_agent: agent,
        description: "a".into(),
        status: DelegationStatus::Verified,
        created_at: "t".into(),
    }];
    assert!(DelegationSummary::compute(&delegations).all_settled);
}

#[test]
fn empty_delegations_are_not_all_settled() {
    assert!(!DelegationSummary::compute(&[]).all_settled);
}

#[test]
fn task_round_trips_through_json() {
    let mut task = minimal_task(TaskStatus::Blocked);
    task.blocking = Some(Blocking {
        blocked_reason: Some("waiting on review".into()),
        unblocked_by: vec![AgentId::new("a"), AgentId::new("b")],
        ..Default::default()
    });
    task.outcome = Some(Outcome::Interrupted { by: Some(AgentId::new("a")), reason: Some("zombie".into()) });

    let json = serde_json::to_string(&task).unwrap();
    let parsed: Task = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.id, task.id);
    assert_eq!(parsed.status, task.status);
    assert_eq!(parsed.blocking, task.blocking);
    assert_eq!(parsed.outcome, task.outcome);
}
