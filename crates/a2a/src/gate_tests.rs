use super::*;

#[tokio::test]
async fn acquire_under_capacity_succeeds_immediately() {
    let gate = A2AConcurrencyGate::new(2);
    let agent = AgentId::new("agent-a");
    gate.acquire(&agent, 1_000).await.unwrap();
    assert_eq!(gate.active_count(&agent), 1);
}

#[tokio::test]
async fn distinct_agents_have_independent_limits() {
    let gate = A2AConcurrencyGate::new(1);
    let a = AgentId::new("agent-a");
    let b = AgentId::new("agent-b");
    gate.acquire(&a, 1_000).await.unwrap();
    gate.acquire(&b, 1_000).await.unwrap();
    assert_eq!(gate.active_count(&a), 1);
    assert_eq!(gate.active_count(&b), 1);
}

#[tokio::test]
async fn waiter_times_out_when_no_permit_frees_up() {
    let gate = A2AConcurrencyGate::new(1);
    let agent = AgentId::new("agent-a");
    gate.acquire(&agent, 1_000).await.unwrap();

    let err = gate.acquire(&agent, 30).await.unwrap_err();
    assert_eq!(err.agent_id, agent);
    assert_eq!(err.queue_timeout_ms, 30);
}

#[tokio::test]
async fn release_wakes_fifo_waiter() {
    let gate = Arc::new(A2AConcurrencyGate::new(1));
    let agent = AgentId::new("agent-a");
    gate.acquire(&agent, 1_000).await.unwrap();

    let waiter_gate = gate.clone();
    let waiter_agent = agent.clone();
    let waiter = tokio::spawn(async move { waiter_gate.acquire(&waiter_agent, 5_000).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.release(&agent);

    waiter.await.unwrap().unwrap();
    assert_eq!(gate.active_count(&agent), 1);
}

#[tokio::test]
async fn release_with_no_waiters_decrements_active() {
    let gate = A2AConcurrencyGate::new(2);
    let agent = AgentId::new("agent-a");
    gate.acquire(&agent, 1_000).await.unwrap();
    gate.release(&agent);
    assert_eq!(gate.active_count(&agent), 0);
}
