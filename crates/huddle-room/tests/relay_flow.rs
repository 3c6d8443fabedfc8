//! Integration tests for the room layer using a recording publisher.
//!
//! The recorder keeps every published event in order together with its
//! address, so tests can assert on the exact emission sequence.

use std::sync::{Arc, Mutex};

use huddle_protocol::{
    Delivery, Event, EventKind, Fields, Intent, RoomId, SessionStatus,
    SignalKind, SignalMessage, Topic, UserId,
};
use huddle_registry::RoomSessionRegistry;
use huddle_room::{PresenceConfig, Publisher, RoomLifecycleCoordinator};
use serde_json::{Value, json};

// =========================================================================
// Recording publisher
// =========================================================================

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(Delivery, Event)>>,
}

impl RecordingPublisher {
    fn take(&self) -> Vec<(Delivery, Event)> {
        std::mem::take(&mut *self.published.lock().unwrap())
    }

    fn take_json(&self) -> Vec<(Delivery, Value)> {
        self.take()
            .into_iter()
            .map(|(to, event)| (to, serde_json::to_value(&event).unwrap()))
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, delivery: Delivery, event: Event) {
        self.published.lock().unwrap().push((delivery, event));
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct Fixture {
    registry: Arc<RoomSessionRegistry>,
    publisher: Arc<RecordingPublisher>,
    coordinator: RoomLifecycleCoordinator<RecordingPublisher>,
}

fn fixture() -> Fixture {
    fixture_with(PresenceConfig::default())
}

fn fixture_with(config: PresenceConfig) -> Fixture {
    let registry = Arc::new(RoomSessionRegistry::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let coordinator =
        RoomLifecycleCoordinator::new(registry.clone(), publisher.clone(), config);
    Fixture {
        registry,
        publisher,
        coordinator,
    }
}

fn rid(id: &str) -> RoomId {
    RoomId::new(id)
}

fn uid(id: &str) -> UserId {
    UserId::new(id)
}

fn to_room(room: &str, topic: Topic) -> Delivery {
    Delivery::Room(rid(room), topic)
}

fn to_user(user: &str) -> Delivery {
    Delivery::User(uid(user))
}

fn offer(room: &str, from: &str, to: &str) -> Intent {
    let mut payload = Fields::new();
    payload.insert("sdp".into(), json!("v=0"));
    Intent::Signal(SignalMessage {
        kind: SignalKind::Offer,
        room_id: rid(room),
        from_user_id: uid(from),
        target_user_id: uid(to),
        payload,
    })
}

// =========================================================================
// Join
// =========================================================================

#[test]
fn test_join_empty_room_emits_in_order_and_includes_joiner() {
    let f = fixture();

    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 3, "no peers, so no NEW_PARTICIPANT");

    assert_eq!(events[0].0, to_room("r1", Topic::Participants));
    assert_eq!(events[0].1["type"], "USER_JOINED");
    assert_eq!(events[0].1["participantCount"], 1);
    assert_eq!(events[0].1["participants"][0]["userId"], "A");

    assert_eq!(events[1].0, to_room("r1", Topic::Chat));
    assert_eq!(events[1].1["type"], "SYSTEM");
    assert_eq!(events[1].1["content"], "Alice присоединился к конференции");

    assert_eq!(events[2].0, to_user("A"));
    assert_eq!(events[2].1["type"], "ROOM_STATUS");
    assert_eq!(events[2].1["participantCount"], 1);
}

#[test]
fn test_join_notifies_each_existing_peer() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.coordinator.join(&rid("r1"), &uid("B"), "Bob");
    f.publisher.take();

    f.coordinator.join(&rid("r1"), &uid("C"), "Carol");

    let events = f.publisher.take_json();
    let notified: Vec<_> = events
        .iter()
        .filter(|(_, e)| e["type"] == "NEW_PARTICIPANT")
        .collect();
    assert_eq!(notified.len(), 2);
    let recipients: Vec<_> = notified.iter().map(|(to, _)| to.clone()).collect();
    assert!(recipients.contains(&to_user("A")));
    assert!(recipients.contains(&to_user("B")));
    assert!(!recipients.contains(&to_user("C")));
    for (_, event) in &notified {
        assert_eq!(event["userId"], "C");
        assert_eq!(event["username"], "Carol");
        assert_eq!(event["roomId"], "r1");
    }
    // USER_JOINED carries the full roster.
    assert_eq!(events[0].1["participantCount"], 3);
}

#[test]
fn test_join_with_empty_username_is_dropped() {
    let f = fixture();

    f.coordinator.join(&rid("r1"), &uid("A"), "");

    assert!(f.publisher.take().is_empty());
    assert!(!f.registry.contains_room(&rid("r1")));
}

#[test]
fn test_rejoin_keeps_one_session_with_latest_name() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.coordinator.join(&rid("r1"), &uid("A"), "Alicia");

    let users = f.registry.list_users(&rid("r1"));
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "Alicia");
}

// =========================================================================
// Leave
// =========================================================================

#[test]
fn test_leave_with_username_emits_user_left_then_system() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.coordinator.join(&rid("r1"), &uid("B"), "Bob");
    f.publisher.take();

    f.coordinator.leave(&rid("r1"), &uid("A"), Some("Alice"));

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, to_room("r1", Topic::Participants));
    assert_eq!(events[0].1["type"], "USER_LEFT");
    assert_eq!(events[0].1["participantCount"], 1);
    assert_eq!(events[0].1["participants"][0]["userId"], "B");
    assert_eq!(events[1].0, to_room("r1", Topic::Chat));
    assert_eq!(events[1].1["content"], "Alice покинул конференцию");
}

#[test]
fn test_leave_without_username_skips_system_line() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    f.coordinator.leave(&rid("r1"), &uid("A"), None);

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1["type"], "USER_LEFT");
    assert_eq!(events[0].1["participantCount"], 0);
    assert!(!f.registry.contains_room(&rid("r1")));
}

#[test]
fn test_leave_absent_user_still_broadcasts_user_left() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    f.coordinator.leave(&rid("r1"), &uid("ghost"), None);

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1["type"], "USER_LEFT");
    assert_eq!(events[0].1["participantCount"], 1);
    assert_eq!(f.registry.count(&rid("r1")), 1);
}

#[test]
fn test_join_join_leave_final_roster() {
    let f = fixture();
    f.coordinator.handle(Intent::Join {
        room_id: rid("r1"),
        user_id: uid("u1"),
        username: "Alice".into(),
    });
    f.coordinator.handle(Intent::Join {
        room_id: rid("r1"),
        user_id: uid("u2"),
        username: "Bob".into(),
    });
    f.coordinator.handle(Intent::Leave {
        room_id: rid("r1"),
        user_id: uid("u1"),
        username: None,
    });

    let users = f.registry.list_users(&rid("r1"));
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, uid("u2"));
    assert_eq!(users[0].username, "Bob");
    assert_eq!(f.registry.count(&rid("r1")), 1);
}

// =========================================================================
// Signaling through the coordinator
// =========================================================================

#[test]
fn test_offer_to_missing_target_yields_single_error_to_sender() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    f.coordinator.handle(offer("r1", "A", "B"));

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, to_user("A"));
    assert_eq!(
        events[0].1,
        json!({"type": "ERROR", "error": "USER_NOT_FOUND", "targetUserId": "B"})
    );
}

#[test]
fn test_offer_to_present_target_reaches_only_target() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.coordinator.join(&rid("r1"), &uid("B"), "Bob");
    f.publisher.take();

    f.coordinator.handle(offer("r1", "A", "B"));

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, to_user("B"));
    assert_eq!(events[0].1["type"], "offer");
    assert_eq!(events[0].1["fromUserId"], "A");
}

// =========================================================================
// Chat, status, announce
// =========================================================================

#[test]
fn test_chat_stamps_count_and_timestamp() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    let mut message = Fields::new();
    message.insert("roomId".into(), json!("r1"));
    message.insert("content".into(), json!("hi"));
    f.coordinator.handle(Intent::Chat {
        room_id: rid("r1"),
        message,
    });

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, to_room("r1", Topic::Chat));
    assert_eq!(events[0].1["content"], "hi");
    assert_eq!(events[0].1["participantCount"], 1);
    let timestamp = events[0].1["timestamp"].as_str().unwrap();
    assert!(!timestamp.is_empty());
}

#[test]
fn test_status_query_addressed_or_broadcast() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    f.coordinator.status_query(&rid("r1"), Some(&uid("A")));
    f.coordinator.status_query(&rid("r1"), None);

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, to_user("A"));
    assert_eq!(events[1].0, to_room("r1", Topic::Participants));
    assert!(events.iter().all(|(_, e)| e["type"] == "ROOM_STATUS"));
    assert!(events.iter().all(|(_, e)| e["participantCount"] == 1));
}

#[test]
fn test_status_query_unknown_room_is_empty_roster() {
    let f = fixture();

    f.coordinator.status_query(&rid("nowhere"), None);

    let events = f.publisher.take_json();
    assert_eq!(events[0].1["participantCount"], 0);
    assert_eq!(events[0].1["participants"], json!([]));
    assert!(!f.registry.contains_room(&rid("nowhere")));
}

#[test]
fn test_announce_posts_system_line() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    f.coordinator.announce(&rid("r1"), "Meeting ends in 5 minutes");

    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, to_room("r1", Topic::Chat));
    assert_eq!(events[0].1["type"], "SYSTEM");
    assert_eq!(events[0].1["content"], "Meeting ends in 5 minutes");
    assert_eq!(events[0].1["participantCount"], 1);
}

// =========================================================================
// Disconnect grace
// =========================================================================

#[test]
fn test_join_returns_the_new_sessions_joined_at() {
    let f = fixture();

    let joined_at = f.coordinator.join(&rid("r1"), &uid("A"), "Alice");

    let session = f.registry.find(&rid("r1"), &uid("A")).unwrap();
    assert_eq!(joined_at, Some(session.joined_at));
    assert_eq!(f.coordinator.join(&rid("r1"), &uid("B"), ""), None);
}

#[test]
fn test_mark_disconnected_sets_pending_and_broadcasts_status() {
    let f = fixture();
    let joined_at = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    f.publisher.take();

    assert!(f.coordinator.mark_disconnected(&rid("r1"), &uid("A"), joined_at));

    let session = f.registry.find(&rid("r1"), &uid("A")).unwrap();
    assert_eq!(session.status, SessionStatus::DisconnectedPending);
    let events = f.publisher.take_json();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, to_room("r1", Topic::Participants));
    assert_eq!(events[0].1["participants"][0]["status"], "disconnected-pending");
}

#[test]
fn test_mark_disconnected_unknown_user_is_noop() {
    let f = fixture();
    let stale = f.coordinator.join(&rid("r2"), &uid("A"), "Alice").unwrap();
    f.publisher.take();

    assert!(!f.coordinator.mark_disconnected(&rid("r1"), &uid("A"), stale));
    assert!(f.publisher.take().is_empty());
}

#[test]
fn test_mark_disconnected_after_rejoin_leaves_new_session_connected() {
    let f = fixture();
    let old = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    // The user reconnects on another connection before the old one is
    // cleaned up.
    let fresh = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    assert_ne!(old, fresh);
    f.publisher.take();

    assert!(!f.coordinator.mark_disconnected(&rid("r1"), &uid("A"), old));
    assert!(!f.coordinator.expire_if_pending(&rid("r1"), &uid("A"), old));
    assert!(!f.coordinator.expire_if_pending(&rid("r1"), &uid("A"), fresh));

    let session = f.registry.find(&rid("r1"), &uid("A")).unwrap();
    assert_eq!(session.status, SessionStatus::Connected);
    assert_eq!(session.joined_at, fresh);
    assert_eq!(f.registry.count(&rid("r1")), 1);
    assert!(f.publisher.take().is_empty());
}

#[test]
fn test_expire_if_pending_removes_and_announces() {
    let f = fixture();
    let joined_at = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    f.coordinator.mark_disconnected(&rid("r1"), &uid("A"), joined_at);
    f.publisher.take();

    assert!(f.coordinator.expire_if_pending(&rid("r1"), &uid("A"), joined_at));

    assert!(!f.registry.contains_room(&rid("r1")));
    let events = f.publisher.take_json();
    assert_eq!(events[0].1["type"], "USER_LEFT");
    assert_eq!(events[1].1["content"], "Alice покинул конференцию");
}

#[test]
fn test_expire_if_pending_after_rejoin_keeps_session() {
    let f = fixture();
    let joined_at = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    f.coordinator.mark_disconnected(&rid("r1"), &uid("A"), joined_at);
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    assert!(!f.coordinator.expire_if_pending(&rid("r1"), &uid("A"), joined_at));

    assert_eq!(f.registry.count(&rid("r1")), 1);
    assert!(f.publisher.take().is_empty());
}

#[test]
fn test_leave_session_removes_with_stored_username() {
    let f = fixture();
    let joined_at = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    f.coordinator.join(&rid("r1"), &uid("B"), "Bob");
    f.publisher.take();

    assert!(f.coordinator.leave_session(&rid("r1"), &uid("A"), joined_at));

    assert_eq!(f.registry.count(&rid("r1")), 1);
    let events = f.publisher.take_json();
    assert_eq!(events[0].1["type"], "USER_LEFT");
    assert_eq!(events[0].1["username"], "Alice");
    assert_eq!(events[1].1["content"], "Alice покинул конференцию");
}

#[test]
fn test_leave_session_after_rejoin_is_noop() {
    let f = fixture();
    let old = f.coordinator.join(&rid("r1"), &uid("A"), "Alice").unwrap();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.publisher.take();

    assert!(!f.coordinator.leave_session(&rid("r1"), &uid("A"), old));

    assert_eq!(f.registry.count(&rid("r1")), 1);
    assert!(f.publisher.take().is_empty());
}

// =========================================================================
// Debug topic
// =========================================================================

#[test]
fn test_debug_topic_off_by_default() {
    let f = fixture();
    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");

    let events = f.publisher.take();
    assert!(
        events
            .iter()
            .all(|(to, _)| *to != to_room("r1", Topic::Debug))
    );
}

#[test]
fn test_debug_topic_traces_membership_changes() {
    let f = fixture_with(PresenceConfig {
        debug_topic: true,
        ..PresenceConfig::default()
    });

    f.coordinator.join(&rid("r1"), &uid("A"), "Alice");
    f.coordinator.leave(&rid("r1"), &uid("A"), None);

    let debug: Vec<_> = f
        .publisher
        .take()
        .into_iter()
        .filter(|(to, _)| *to == to_room("r1", Topic::Debug))
        .map(|(_, e)| e)
        .collect();
    assert_eq!(debug.len(), 2);
    let Event::Debug(first) = &debug[0] else {
        panic!("expected debug event");
    };
    assert_eq!(first.kind, EventKind::Debug);
    assert_eq!(first.intent, "join");
    assert_eq!(first.participant_count, 1);
    let Event::Debug(second) = &debug[1] else {
        panic!("expected debug event");
    };
    assert_eq!(second.intent, "leave");
    assert_eq!(second.participant_count, 0);
}
