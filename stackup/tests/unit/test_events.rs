//! Event selection tests

use chrono::{TimeZone, Utc};
use stack_models::StackEvent;
use stackup::workers::event_tailer::SeenEvents;

fn event(id: &str, seconds: i64) -> StackEvent {
    StackEvent {
        event_id: id.to_string(),
        stack_id: "arn:stack/demo".to_string(),
        logical_resource_id: "demo".to_string(),
        resource_type: Some("AWS::CloudFormation::Stack".to_string()),
        resource_status: "UPDATE_IN_PROGRESS".to_string(),
        status_reason: None,
        timestamp: Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
    }
}

#[test]
fn test_events_are_emitted_once_in_order() {
    let polls = vec![
        vec![event("a", 1)],
        vec![event("c", 3), event("b", 2), event("a", 1)],
        vec![event("c", 3), event("b", 2), event("a", 1)],
        vec![event("b", 2), event("a", 1)],
        vec![event("d", 4), event("c", 3)],
    ];

    let mut seen = SeenEvents::default();
    let mut emitted: Vec<StackEvent> = Vec::new();
    for batch in &polls {
        emitted.extend(seen.select(batch));
    }

    let ids: Vec<&str> = emitted.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert!(emitted.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}
