use super::*;
use async_trait::async_trait;
use mesh_core::{AgentDriverError, AgentId, FakeClock, Priority, Step, StepStatus, WaitStatus};
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::{AtomicBool, Ordering};

struct RecordingDriver {
    busy: AtomicBool,
    prompts: SyncMutex<Vec<String>>,
}

impl RecordingDriver {
    fn new() -> Self {
        Self { busy: AtomicBool::new(false), prompts: SyncMutex::new(vec![]) }
    }
}

#[async_trait]
impl AgentDriver for RecordingDriver {
    async fn run(&self, _session_key: &SessionKey, _message: &str, _lane: &str) -> Result<String, AgentDriverError> {
        Ok("run-1".to_string())
    }

    async fn wait(&self, _run_id: &str, _chunk_ms: u64) -> WaitStatus {
        WaitStatus::Ok
    }

    async fn read_latest_assistant_reply(&self, _session_key: &SessionKey) -> Option<String> {
        None
    }

    async fn run_agent_step(&self, _session_key: &SessionKey, prompt: &str, _timeout_ms: u64) -> Result<String, AgentDriverError> {
        self.prompts.lock().push(prompt.to_string());
        Ok("ok".to_string())
    }

    async fn is_busy(&self, _agent_id: &AgentId) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

fn session() -> SessionKey {
    SessionKey::parse("agent:ruda:main").unwrap()
}

#[tokio::test]
async fn no_active_task_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(mesh_store::TaskStore::new(dir.path(), clock.clone()));
    let driver = Arc::new(RecordingDriver::new());
    let loop_ = SelfDrivingLoop::new(clock, store, driver);

    let decision = loop_.check_and_self_drive(&session(), &AgentId::new("ruda")).await;
    assert_eq!(decision, SelfDrivingDecision::NoActiveTask);
}

#[tokio::test]
async fn non_in_progress_task_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(mesh_store::TaskStore::new(dir.path(), clock.clone()));
    let driver = Arc::new(RecordingDriver::new());

    let task = store.create_task("ship it", "", "user", Priority::Medium).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let loop_ = SelfDrivingLoop::new(clock, store, driver);
    let decision = loop_.check_and_self_drive(&session(), &AgentId::new("ruda")).await;
    assert_eq!(decision, SelfDrivingDecision::NotInProgress);
}

#[tokio::test]
async fn busy_agent_skips_self_drive() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(mesh_store::TaskStore::new(dir.path(), clock.clone()));
    let mut task = store.create_task("ship it", "", "user", Priority::Medium).unwrap();
    task.status = TaskStatus::InProgress;
    store.write_task_under_lock(&task).unwrap();

    let driver = Arc::new(RecordingDriver::new());
    driver.busy.store(true, Ordering::SeqCst);
    let loop_ = SelfDrivingLoop::new(clock, store, driver);

    let decision = loop_.check_and_self_drive(&session(), &AgentId::new("ruda")).await;
    assert_eq!(decision, SelfDrivingDecision::CommandQueueBusy);
}

#[tokio::test]
async fn missing_steps_prompts_up_to_the_limit_then_continues() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(mesh_store::TaskStore::new(dir.path(), clock.clone()));
    let mut task = store.create_task("ship it", "", "user", Priority::Medium).unwrap();
    task.status = TaskStatus::InProgress;
    store.write_task_under_lock(&task).unwrap();

    let driver = Arc::new(RecordingDriver::new());
    let loop_ = SelfDrivingLoop::new(clock, store, driver.clone());
    let session = session();

    for _ in 0..3 {
        let decision = loop_.check_and_self_drive(&session, &AgentId::new("ruda")).await;
        assert_eq!(decision, SelfDrivingDecision::NeedsSteps);
    }
    let decision = loop_.check_and_self_drive(&session, &AgentId::new("ruda")).await;
    assert_eq!(decision, SelfDrivingDecision::Continue);
    assert_eq!(driver.prompts.lock().len(), 4);
}

#[tokio::test]
async fn stalled_same_step_escalates_after_limit() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(mesh_store::TaskStore::new(dir.path(), clock.clone()));
    let mut task = store.create_task("ship it", "", "user", Priority::Medium).unwrap();
    task.status = TaskStatus::InProgress;
    task.steps = vec![Step { id: "s1".into(), content: "do it".into(), status: StepStatus::InProgress, order: 0 }];
    store.write_task_under_lock(&task).unwrap();

    let driver = Arc::new(RecordingDriver::new());
    let loop_ = SelfDrivingLoop::new(clock, store, driver);
    let session = session();

    let mut decisions = vec![];
    for _ in 0..5 {
        decisions.push(loop_.check_and_self_drive(&session, &AgentId::new("ruda")).await);
    }
    assert_eq!(&decisions[0..4], &[SelfDrivingDecision::Continue; 4]);
    assert_eq!(decisions[4], SelfDrivingDecision::Escalate);
}

#[tokio::test]
async fn exceeding_max_consecutive_self_drives_caps() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Arc::new(mesh_store::TaskStore::new(dir.path(), clock.clone()));
    let mut task = store.create_task("ship it", "", "user", Priority::Medium).unwrap();
    task.status = TaskStatus::InProgress;
    task.steps = vec![Step { id: "s1".into(), content: "do it".into(), status: StepStatus::InProgress, order: 0 }];
    store.write_task_under_lock(&task).unwrap();

    let driver = Arc::new(RecordingDriver::new());
    let thresholds = SelfDrivingThresholds { max_consecutive_self_drives: 2, ..SelfDrivingThresholds::default() };
    let loop_ = SelfDrivingLoop::new(clock, store, driver).with_thresholds(thresholds);
    let session = session();

    let first = loop_.check_and_self_drive(&session, &AgentId::new("ruda")).await;
    let second = loop_.check_and_self_drive(&session, &AgentId::new("ruda")).await;
    let third = loop_.check_and_self_drive(&session, &AgentId::new("ruda")).await;

    assert_eq!(first, SelfDrivingDecision::Continue);
    assert_eq!(second, SelfDrivingDecision::Continue);
    assert_eq!(third, SelfDrivingDecision::Capped);
}
