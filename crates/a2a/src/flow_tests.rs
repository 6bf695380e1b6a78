use super::*;
use async_trait::async_trait;
use mesh_core::{AgentDriverError, AnnounceTarget, ChannelSendError, FakeClock};
use parking_lot::Mutex;
use std::collections::VecDeque;

struct ScriptedDriver {
    wait_status: WaitStatus,
    initial_reply: String,
    /// Successive `runAgentStep` replies, consumed in order; repeats the last once exhausted.
    turn_replies: Mutex<VecDeque<String>>,
}

impl ScriptedDriver {
    fn new(initial_reply: &str, turn_replies: &[&str]) -> Self {
        Self {
            wait_status: WaitStatus::Ok,
            initial_reply: initial_reply.to_string(),
            turn_replies: Mutex::new(turn_replies.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl AgentDriver for ScriptedDriver {
    async fn run(&self, _session_key: &SessionKey, _message: &str, _lane: &str) -> Result<String, AgentDriverError> {
        Ok("run-1".to_string())
    }

    async fn wait(&self, _run_id: &str, _chunk_ms: u64) -> WaitStatus {
        self.wait_status
    }

    async fn read_latest_assistant_reply(&self, _session_key: &SessionKey) -> Option<String> {
        Some(self.initial_reply.clone())
    }

    async fn run_agent_step(&self, _session_key: &SessionKey, _prompt: &str, _timeout_ms: u64) -> Result<String, AgentDriverError> {
        let mut queue = self.turn_replies.lock();
        Ok(queue.pop_front().unwrap_or_default())
    }

    async fn is_busy(&self, _agent_id: &mesh_core::AgentId) -> bool {
        false
    }
}

struct NullChannel {
    sent: Mutex<Vec<String>>,
}

impl NullChannel {
    fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl ChannelSender for NullChannel {
    async fn send(&self, _target: &AnnounceTarget, message: &str) -> Result<(), ChannelSendError> {
        self.sent.lock().push(message.to_string());
        Ok(())
    }
}

struct AlwaysResolve;

impl AnnounceTargetResolver for AlwaysResolve {
    fn resolve(&self, _session_key: &SessionKey) -> Option<AnnounceTarget> {
        Some(AnnounceTarget { channel: "slack".to_string(), to: "C1".to_string() })
    }
}

fn requester_key() -> SessionKey {
    SessionKey::parse("agent:ruda:main").unwrap()
}

fn target_key() -> SessionKey {
    SessionKey::parse("agent:worker-quick:main").unwrap()
}

fn collect_bus() -> (Arc<EventBus>, Arc<Mutex<Vec<ConversationEvent>>>) {
    let bus = Arc::new(EventBus::new());
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    bus.subscribe("*", move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    (bus, captured)
}

#[tokio::test]
async fn happy_path_emits_send_response_complete_and_announces() {
    let (bus, captured) = collect_bus();
    let clock = FakeClock::new();
    let dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(A2AJobManager::new(dir.path(), clock.clone()));
    let job = jobs.create("agent:worker-quick:main", "worker-quick", "hello", 3, 5_000, None, None).unwrap();

    let driver: Arc<dyn AgentDriver> = Arc::new(ScriptedDriver::new("A-42", &["got it, done here"]));
    let channel: Arc<dyn ChannelSender> = Arc::new(NullChannel::new());
    let resolver: Arc<dyn AnnounceTargetResolver> = Arc::new(AlwaysResolve);
    let flow = A2AFlow::new(clock.clone(), bus, jobs.clone(), driver, channel, resolver);

    let params = A2AFlowParams {
        target_session_key: target_key(),
        display_key: "worker-quick".to_string(),
        message: "[goal] Case A explicit metadata. Reply exactly \"A-42\" and stop.".to_string(),
        announce_timeout_ms: 5_000,
        max_ping_pong_turns: 3,
        requester_session_key: Some(requester_key()),
        round_one_reply: Some("A-42".to_string()),
        wait_run_id: None,
        conversation_id: None,
        task_context: None,
        skip_ping_pong: false,
    };

    let outcome = flow.run(&job.job_id, params).await;
    match outcome {
        FlowOutcome::Completed { .. } => {}
        FlowOutcome::Failed { reason, .. } => panic!("expected completion, got failure: {reason}"),
    }

    let events = captured.lock();
    let types: Vec<_> = events.iter().map(|e| e.event_type.clone()).collect();
    assert!(types.contains(&event_types::A2A_SEND.to_string()));
    assert!(types.contains(&event_types::A2A_RESPONSE.to_string()));
    assert!(types.contains(&event_types::A2A_COMPLETE.to_string()));

    let completed_job = jobs.get(&job.job_id).unwrap().unwrap();
    assert_eq!(completed_job.status, mesh_core::A2AJobStatus::Completed);
}

#[tokio::test]
async fn notification_skips_ping_pong_and_announce() {
    let (bus, captured) = collect_bus();
    let clock = FakeClock::new();
    let dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(A2AJobManager::new(dir.path(), clock.clone()));
    let job = jobs.create("agent:worker-quick:main", "worker-quick", "notify", 30, 5_000, None, None).unwrap();

    let driver: Arc<dyn AgentDriver> = Arc::new(ScriptedDriver::new("ack", &["should not be used"]));
    let channel: Arc<dyn ChannelSender> = Arc::new(NullChannel::new());
    let resolver: Arc<dyn AnnounceTargetResolver> = Arc::new(AlwaysResolve);
    let flow = A2AFlow::new(clock, bus, jobs, driver, channel, resolver);

    let params = A2AFlowParams {
        target_session_key: target_key(),
        display_key: "worker-quick".to_string(),
        message: "[NO_REPLY_NEEDED] build succeeded".to_string(),
        announce_timeout_ms: 5_000,
        max_ping_pong_turns: 30,
        requester_session_key: Some(requester_key()),
        round_one_reply: Some("ack".to_string()),
        wait_run_id: None,
        conversation_id: None,
        task_context: None,
        skip_ping_pong: false,
    };

    let outcome = flow.run(&job.job_id, params).await;
    let FlowOutcome::Completed { announced, .. } = outcome else { panic!("expected completion") };
    assert!(!announced);

    let events = captured.lock();
    let response_count = events.iter().filter(|e| e.event_type == event_types::A2A_RESPONSE).count();
    assert_eq!(response_count, 1, "only the initial response, no ping-pong turns");
    let complete = events.iter().find(|e| e.event_type == event_types::A2A_COMPLETE).unwrap();
    assert_eq!(complete.get_str("announced"), None); // bool values aren't strings
}

#[tokio::test]
async fn same_session_key_runs_zero_ping_pong_turns() {
    let (bus, captured) = collect_bus();
    let clock = FakeClock::new();
    let dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(A2AJobManager::new(dir.path(), clock.clone()));
    let job = jobs.create("agent:ruda:main", "ruda", "loopback", 5, 5_000, None, None).unwrap();

    let driver: Arc<dyn AgentDriver> = Arc::new(ScriptedDriver::new("reply", &["more"]));
    let channel: Arc<dyn ChannelSender> = Arc::new(NullChannel::new());
    let resolver: Arc<dyn AnnounceTargetResolver> = Arc::new(AlwaysResolve);
    let flow = A2AFlow::new(clock, bus, jobs, driver, channel, resolver);

    let params = A2AFlowParams {
        target_session_key: requester_key(),
        display_key: "ruda".to_string(),
        message: "talking to myself".to_string(),
        announce_timeout_ms: 5_000,
        max_ping_pong_turns: 5,
        requester_session_key: Some(requester_key()),
        round_one_reply: Some("reply".to_string()),
        wait_run_id: None,
        conversation_id: None,
        task_context: None,
        skip_ping_pong: false,
    };

    flow.run(&job.job_id, params).await;

    let events = captured.lock();
    let response_count = events.iter().filter(|e| e.event_type == event_types::A2A_RESPONSE).count();
    assert_eq!(response_count, 1);
}

#[tokio::test]
async fn failed_wait_marks_job_failed() {
    let (bus, _captured) = collect_bus();
    let clock = FakeClock::new();
    let dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(A2AJobManager::new(dir.path(), clock.clone()));
    let job = jobs.create("agent:worker-quick:main", "worker-quick", "hello", 3, 5_000, None, None).unwrap();

    struct NotFoundDriver;
    #[async_trait]
    impl AgentDriver for NotFoundDriver {
        async fn run(&self, _k: &SessionKey, _m: &str, _l: &str) -> Result<String, AgentDriverError> {
            Ok("run-1".to_string())
        }
        async fn wait(&self, _run_id: &str, _chunk_ms: u64) -> WaitStatus {
            WaitStatus::NotFound
        }
        async fn read_latest_assistant_reply(&self, _k: &SessionKey) -> Option<String> {
            None
        }
        async fn run_agent_step(&self, _k: &SessionKey, _p: &str, _t: u64) -> Result<String, AgentDriverError> {
            Ok(String::new())
        }
        async fn is_busy(&self, _agent_id: &mesh_core::AgentId) -> bool {
            false
        }
    }

    let driver: Arc<dyn AgentDriver> = Arc::new(NotFoundDriver);
    let channel: Arc<dyn ChannelSender> = Arc::new(NullChannel::new());
    let resolver: Arc<dyn AnnounceTargetResolver> = Arc::new(AlwaysResolve);
    let flow = A2AFlow::new(clock, bus, jobs.clone(), driver, channel, resolver);

    let params = A2AFlowParams {
        target_session_key: target_key(),
        display_key: "worker-quick".to_string(),
        message: "hello".to_string(),
        announce_timeout_ms: 5_000,
        max_ping_pong_turns: 3,
        requester_session_key: Some(requester_key()),
        round_one_reply: None,
        wait_run_id: Some("run-1".to_string()),
        conversation_id: None,
        task_context: None,
        skip_ping_pong: false,
    };

    let outcome = flow.run(&job.job_id, params).await;
    assert!(matches!(outcome, FlowOutcome::Failed { .. }));
    assert_eq!(jobs.get(&job.job_id).unwrap().unwrap().status, mesh_core::A2AJobStatus::Failed);
}
