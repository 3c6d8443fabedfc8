//! Point-to-point routing of WebRTC offers, answers and ICE candidates.

use std::sync::Arc;

use huddle_protocol::{
    ErrorCode, ErrorEvent, Event, EventKind, SignalForward, SignalKind,
    SignalMessage,
};
use huddle_registry::RoomSessionRegistry;

use crate::{Publisher, RoomError};

/// Forwards signaling messages to their single target peer.
///
/// Only offers are checked against the registry. An answer or candidate
/// follows an offer that already reached its peer, so it's forwarded
/// without a lookup. The router never mutates the registry and never
/// broadcasts.
pub struct SignalingRouter<P: Publisher> {
    registry: Arc<RoomSessionRegistry>,
    publisher: Arc<P>,
}

impl<P: Publisher> SignalingRouter<P> {
    pub fn new(registry: Arc<RoomSessionRegistry>, publisher: Arc<P>) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    /// Delivers `msg` to its target, stamped with its sender and type.
    ///
    /// # Errors
    /// [`RoomError::TargetNotFound`] if an offer's target isn't in the
    /// room. In that case the sender has already been sent an `ERROR`
    /// event and nothing was forwarded.
    pub fn route(&self, msg: SignalMessage) -> Result<(), RoomError> {
        if msg.kind == SignalKind::Offer
            && self
                .registry
                .find(&msg.room_id, &msg.target_user_id)
                .is_none()
        {
            self.publisher.send_to_user(
                &msg.from_user_id,
                Event::Error(ErrorEvent {
                    kind: EventKind::Error,
                    error: ErrorCode::UserNotFound,
                    target_user_id: msg.target_user_id.clone(),
                }),
            );
            return Err(RoomError::TargetNotFound {
                room_id: msg.room_id,
                target_user_id: msg.target_user_id,
            });
        }

        tracing::debug!(
            room_id = %msg.room_id,
            from = %msg.from_user_id,
            to = %msg.target_user_id,
            kind = %msg.kind,
            "forwarding signal"
        );
        let target = msg.target_user_id.clone();
        self.publisher
            .send_to_user(&target, Event::Signal(SignalForward::stamp(msg)));
        Ok(())
    }
}
