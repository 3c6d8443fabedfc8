//! In-process pub/sub: turns addressed and topic events into frames on
//! the right connections.
//!
//! Each connection registers an outbox (the sending half of an unbounded
//! channel drained by that connection's writer task). The hub keeps
//! three indexes over those outboxes:
//!
//! ```text
//! connections: ConnectionId → outbox, bound user, subscriptions
//! users:       UserId → {ConnectionId}            (addressed delivery)
//! topics:      (RoomId, Topic) → {ConnectionId}   (broadcast)
//! ```
//!
//! Publishing encodes the frame once and pushes the same bytes into
//! every target outbox. Pushing never waits; a closed outbox just means
//! the connection is going away and is skipped.

use std::collections::HashSet;

use dashmap::DashMap;
use huddle_protocol::{
    Codec, Delivery, Event, OutboundFrame, RoomId, Topic, USER_QUEUE, UserId,
};
use huddle_room::Publisher;
use huddle_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's outbound queue. Carries encoded frames.
pub type Outbox = mpsc::UnboundedSender<Vec<u8>>;

struct ConnectionEntry {
    outbox: Outbox,
    user_id: Option<UserId>,
    subscriptions: HashSet<(RoomId, Topic)>,
}

/// Fan-out hub shared by all connection handlers.
pub struct Hub<C: Codec> {
    codec: C,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    users: DashMap<UserId, HashSet<ConnectionId>>,
    topics: DashMap<(RoomId, Topic), HashSet<ConnectionId>>,
}

impl<C: Codec> Hub<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            connections: DashMap::new(),
            users: DashMap::new(),
            topics: DashMap::new(),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Adds a connection. It receives nothing until it is bound to a user
    /// or subscribes to a topic.
    pub fn register(&self, conn_id: ConnectionId, outbox: Outbox) {
        self.connections.insert(
            conn_id,
            ConnectionEntry {
                outbox,
                user_id: None,
                subscriptions: HashSet::new(),
            },
        );
    }

    /// Routes `user_id`'s addressed events to this connection. A user may
    /// be bound on several connections at once; each gets a copy.
    pub fn bind_user(&self, conn_id: ConnectionId, user_id: &UserId) {
        match self.connections.get_mut(&conn_id) {
            Some(mut entry) => entry.user_id = Some(user_id.clone()),
            None => return,
        }
        self.users
            .entry(user_id.clone())
            .or_default()
            .insert(conn_id);
    }

    pub fn subscribe(
        &self,
        conn_id: ConnectionId,
        room_id: &RoomId,
        topic: Topic,
    ) {
        let key = (room_id.clone(), topic);
        match self.connections.get_mut(&conn_id) {
            Some(mut entry) => {
                entry.subscriptions.insert(key.clone());
            }
            None => return,
        }
        self.topics.entry(key).or_default().insert(conn_id);
        tracing::debug!(%conn_id, %room_id, %topic, "subscribed");
    }

    pub fn unsubscribe(
        &self,
        conn_id: ConnectionId,
        room_id: &RoomId,
        topic: Topic,
    ) {
        let key = (room_id.clone(), topic);
        if let Some(mut entry) = self.connections.get_mut(&conn_id) {
            entry.subscriptions.remove(&key);
        }
        self.remove_subscriber(&key, conn_id);
    }

    /// Drops a connection and every index entry pointing at it.
    pub fn unregister(&self, conn_id: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&conn_id) else {
            return;
        };
        for key in &entry.subscriptions {
            self.remove_subscriber(key, conn_id);
        }
        if let Some(user_id) = &entry.user_id {
            if let Some(mut conns) = self.users.get_mut(user_id) {
                conns.remove(&conn_id);
            }
            self.users.remove_if(user_id, |_, conns| conns.is_empty());
        }
        tracing::debug!(%conn_id, "connection unregistered");
    }

    /// Whether any live connection is bound to `user_id`.
    pub fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.users
            .get(user_id)
            .is_some_and(|conns| !conns.is_empty())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subscriber_count(&self, room_id: &RoomId, topic: Topic) -> usize {
        self.topics
            .get(&(room_id.clone(), topic))
            .map_or(0, |conns| conns.len())
    }

    /// Sends an event to one specific connection, addressed as a user
    /// queue frame. Used for the handshake reply.
    pub fn send_to_connection(&self, conn_id: ConnectionId, event: &Event) {
        self.deliver(&[conn_id], USER_QUEUE.to_string(), event);
    }

    fn remove_subscriber(&self, key: &(RoomId, Topic), conn_id: ConnectionId) {
        if let Some(mut conns) = self.topics.get_mut(key) {
            conns.remove(&conn_id);
        }
        self.topics.remove_if(key, |_, conns| conns.is_empty());
    }

    /// Encodes once and pushes to every target outbox.
    fn deliver(
        &self,
        targets: &[ConnectionId],
        destination: String,
        event: &Event,
    ) {
        if targets.is_empty() {
            tracing::trace!(
                %destination,
                kind = event.type_name(),
                "no recipients"
            );
            return;
        }

        let frame = OutboundFrame {
            destination,
            body: event,
        };
        let bytes = match self.codec.encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, kind = event.type_name(), "encode failed");
                return;
            }
        };

        for conn_id in targets {
            let Some(entry) = self.connections.get(conn_id) else {
                continue;
            };
            // A closed outbox means the writer already exited.
            let _ = entry.outbox.send(bytes.clone());
        }
    }

    fn targets_for_user(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.users
            .get(user_id)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    fn targets_for_topic(
        &self,
        room_id: &RoomId,
        topic: Topic,
    ) -> Vec<ConnectionId> {
        self.topics
            .get(&(room_id.clone(), topic))
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl<C: Codec> Publisher for Hub<C> {
    fn publish(&self, delivery: Delivery, event: Event) {
        let targets = match &delivery {
            Delivery::User(user_id) => self.targets_for_user(user_id),
            Delivery::Room(room_id, topic) => {
                self.targets_for_topic(room_id, *topic)
            }
        };
        self.deliver(&targets, delivery.destination(), &event);
    }
}
