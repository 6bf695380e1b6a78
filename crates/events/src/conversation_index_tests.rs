use super::*;
use mesh_core::{event_types, ConversationEvent, FakeClock};

fn main_event(event_type: &str, ts: i64, conversation_id: &str) -> ConversationEvent {
    ConversationEvent::new(event_type, "agent-a", ts)
        .with("eventRole", "conversation.main")
        .with("workSessionId", "ws_1")
        .with("conversationId", conversation_id)
        .with("fromAgent", "agent-a")
        .with("toAgent", "agent-b")
}

#[test]
fn route_key_is_order_insensitive() {
    assert_eq!(route_key("ws_1", "a", "b"), route_key("ws_1", "b", "a"));
    assert_eq!(route_key("ws_1", "a", "b"), "ws_1::a|b");
}

#[test]
fn records_first_event_and_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let index = ConversationIndex::new(dir.path(), FakeClock::new());

    index.apply(&main_event(event_types::A2A_SEND, 1_000, "conv_1")).unwrap();

    let key = route_key("ws_1", "agent-a", "agent-b");
    assert_eq!(index.get_a2a_conversation_id(&key).as_deref(), Some("conv_1"));
}

#[test]
fn later_timestamp_overwrites_earlier() {
    let dir = tempfile::tempdir().unwrap();
    let index = ConversationIndex::new(dir.path(), FakeClock::new());
    let key = route_key("ws_1", "agent-a", "agent-b");

    index.apply(&main_event(event_types::A2A_SEND, 1_000, "conv_1")).unwrap();
    index.apply(&main_event(event_types::A2A_RESPONSE, 2_000, "conv_2")).unwrap();

    assert_eq!(index.get_a2a_conversation_id(&key).as_deref(), Some("conv_2"));
}

#[test]
fn earlier_timestamp_out_of_order_does_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let index = ConversationIndex::new(dir.path(), FakeClock::new());
    let key = route_key("ws_1", "agent-a", "agent-b");

    index.apply(&main_event(event_types::A2A_COMPLETE, 2_000, "conv_2")).unwrap();
    index.apply(&main_event(event_types::A2A_SEND, 1_000, "conv_1")).unwrap();

    assert_eq!(index.get_a2a_conversation_id(&key).as_deref(), Some("conv_2"));
}

#[test]
fn ignores_non_main_event_role() {
    let dir = tempfile::tempdir().unwrap();
    let index = ConversationIndex::new(dir.path(), FakeClock::new());
    let event = main_event(event_types::A2A_SEND, 1_000, "conv_1")
        .with("eventRole", "delegation.subagent");

    index.apply(&event).unwrap();

    let key = route_key("ws_1", "agent-a", "agent-b");
    assert!(index.get_a2a_conversation_id(&key).is_none());
}

#[test]
fn ignores_event_missing_work_session_id() {
    let dir = tempfile::tempdir().unwrap();
    let index = ConversationIndex::new(dir.path(), FakeClock::new());
    let event = ConversationEvent::new(event_types::A2A_SEND, "agent-a", 1_000)
        .with("eventRole", "conversation.main")
        .with("conversationId", "conv_1")
        .with("fromAgent", "agent-a")
        .with("toAgent", "agent-b");

    index.apply(&event).unwrap();
    assert!(std::fs::metadata(dir.path().join("a2a-conversation-index.json")).is_err());
}

#[test]
fn on_disk_file_carries_version_and_top_level_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    clock.advance(std::time::Duration::from_millis(5_000));
    let index = ConversationIndex::new(dir.path(), clock);

    index.apply(&main_event(event_types::A2A_SEND, 1_000, "conv_1")).unwrap();

    let bytes = std::fs::read(dir.path().join("a2a-conversation-index.json")).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["version"], 1);
    assert_eq!(value["updated_at"], 5_000);
    assert!(value["entries"].is_object());
}

#[test]
fn reader_returns_none_when_file_absent() {
    let dir = tempfile::tempdir().unwrap();
    let index = ConversationIndex::new(dir.path(), FakeClock::new());
    assert!(index.get_a2a_conversation_id("ws_1::a|b").is_none());
}

#[test]
fn subscribes_and_updates_from_bus_emission() {
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let bus = crate::bus::EventBus::new();
    let index = Arc::new(ConversationIndex::new(dir.path(), FakeClock::new()));
    index.subscribe(&bus);

    bus.emit(&main_event(event_types::A2A_SEND, 1_000, "conv_1"));

    let key = route_key("ws_1", "agent-a", "agent-b");
    assert_eq!(index.get_a2a_conversation_id(&key).as_deref(), Some("conv_1"));
}
