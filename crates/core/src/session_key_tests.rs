use super::*;

#[test]
fn parses_bare_surface() {
    let k = SessionKey::parse("agent:ruda:main").unwrap();
    assert_eq!(k.agent_id, "ruda");
    assert_eq!(k.surface, "main");
    assert!(k.peer_kind.is_none());
    assert!(k.thread.is_none());
}

#[test]
fn parses_group_peer() {
    let k = SessionKey::parse("agent:ruda:slack:group:g1").unwrap();
    assert_eq!(k.peer_kind.as_deref(), Some("group"));
    assert_eq!(k.peer_id.as_deref(), Some("g1"));
}

#[test]
fn topic_and_thread_are_equivalent() {
    let topic = SessionKey::parse("agent:ruda:slack:channel:c1:topic:42").unwrap();
    let thread = SessionKey::parse("agent:ruda:slack:channel:c1:thread:42").unwrap();
    assert_eq!(topic.thread, Some(ThreadRef("42".to_string())));
    assert_eq!(thread.thread, Some(ThreadRef("42".to_string())));
}

#[test]
fn bare_surface_can_carry_a_thread() {
    let k = SessionKey::parse("agent:ruda:a2a:thread:7").unwrap();
    assert_eq!(k.thread, Some(ThreadRef("7".to_string())));
    assert!(k.peer_kind.is_none());
}

#[test]
fn subagent_detection() {
    let k = SessionKey::parse("agent:ruda:subagent:worker-1").unwrap();
    assert!(k.is_subagent());
}

#[test]
fn rejects_missing_agent_prefix() {
    assert!(SessionKey::parse("foo:ruda:main").is_none());
}

#[test]
fn rejects_missing_surface() {
    assert!(SessionKey::parse("agent:ruda").is_none());
}

#[test]
fn display_round_trips_group_and_thread() {
    let s = "agent:ruda:slack:channel:c1:thread:42";
    let k = SessionKey::parse(s).unwrap();
    assert_eq!(k.to_string(), s);
}
