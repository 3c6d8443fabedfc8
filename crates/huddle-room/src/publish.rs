//! The outbound side: how the room layer hands events to whatever
//! delivers them.

use huddle_protocol::{Delivery, Event, RoomId, Topic, UserId};

/// Delivers events to connected clients.
///
/// Publishing is fire-and-forget: it returns immediately, reports no
/// delivery outcome, and must never block on network I/O. An event for a
/// user with no connection, or a topic with no subscribers, is silently
/// discarded.
///
/// Implementors provide [`publish`](Self::publish); the room layer calls
/// the two addressing shorthands. The server's pub/sub hub is the
/// production implementation. Tests use a recorder that just stores what
/// was published.
pub trait Publisher: Send + Sync + 'static {
    /// Delivers `event` to everyone `delivery` names.
    fn publish(&self, delivery: Delivery, event: Event);

    /// Sends `event` to exactly one user's private queue.
    fn send_to_user(&self, user_id: &UserId, event: Event) {
        self.publish(Delivery::User(user_id.clone()), event);
    }

    /// Sends `event` to every current subscriber of `room_id`'s `topic`.
    fn broadcast(&self, room_id: &RoomId, topic: Topic, event: Event) {
        self.publish(Delivery::Room(room_id.clone(), topic), event);
    }
}
