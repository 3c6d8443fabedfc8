//! Per-connection handler: hello handshake, subscriptions, and intent
//! dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello {userId}` within the handshake timeout
//!   2. Register with the hub, start the writer task, send `WELCOME`
//!   3. Loop: receive frames → subscribe/unsubscribe or dispatch intents
//!   4. On exit: unregister, then put this connection's sessions into
//!      the disconnect grace period

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_protocol::{
    Codec, Control, Event, EventKind, Inbound, Intent, ProtocolError, RoomId,
    UserId, WelcomeEvent, decode_inbound,
};
use huddle_registry::RoomDirectory;
use huddle_transport::{
    Connection, ConnectionId, Received, WebSocketConnection,
};
use tokio::sync::mpsc;

use crate::HuddleError;
use crate::server::ServerState;

/// Sessions this connection created: `(room, user)` → the session's
/// `joined_at`, which tells it apart from a later re-join elsewhere.
type JoinedSessions = HashMap<(RoomId, UserId), DateTime<Utc>>;

/// Drop guard that releases a connection's hub entry and sessions when
/// the handler exits, including on panic. `Drop` is synchronous, so the
/// grace timer runs in a spawned task.
struct ConnectionGuard<C: Codec, D: RoomDirectory> {
    conn_id: ConnectionId,
    joined: JoinedSessions,
    state: Arc<ServerState<C, D>>,
}

impl<C: Codec, D: RoomDirectory> Drop for ConnectionGuard<C, D> {
    fn drop(&mut self) {
        self.state.hub.unregister(self.conn_id);
        let joined = std::mem::take(&mut self.joined);
        if joined.is_empty() {
            return;
        }
        let state = Arc::clone(&self.state);
        tokio::spawn(release_sessions(state, joined));
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec, D: RoomDirectory>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C, D>>,
) -> Result<(), HuddleError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let user_id = match perform_handshake(&conn, &state).await {
        Ok(user_id) => user_id,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, %user_id, "client connected");

    // --- Step 2: Register ---
    let (outbox, inbox) = mpsc::unbounded_channel();
    state.hub.register(conn_id, outbox);
    let mut guard = ConnectionGuard {
        conn_id,
        joined: HashMap::new(),
        state: Arc::clone(&state),
    };
    state.hub.bind_user(conn_id, &user_id);
    tokio::spawn(write_loop(Arc::clone(&conn), inbox));

    state.hub.send_to_connection(
        conn_id,
        &Event::Welcome(WelcomeEvent {
            kind: EventKind::Welcome,
            user_id: user_id.clone(),
        }),
    );

    // --- Step 3: Frame loop ---
    loop {
        let data = match conn.recv_timeout(state.config.idle_timeout).await {
            Ok(Received::Frame(data)) => data,
            Ok(Received::Closed) => {
                tracing::info!(%conn_id, %user_id, "connection closed cleanly");
                break;
            }
            Ok(Received::TimedOut) => {
                tracing::info!(%conn_id, %user_id, "connection idle, dropping");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let inbound = match decode_inbound(state.hub.codec(), &data) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "frame dropped");
                continue;
            }
        };

        match inbound {
            Inbound::Control(control) => {
                handle_control(&state, conn_id, control);
            }
            Inbound::Intent(intent) => {
                handle_intent(&state, &mut guard.joined, intent).await;
            }
        }
    }

    // guard drops here → hub entry removed, writer drains and closes,
    // joined sessions enter the grace period.
    Ok(())
}

/// Waits for the `hello` frame and returns the user it names.
async fn perform_handshake<C: Codec, D: RoomDirectory>(
    conn: &WebSocketConnection,
    state: &ServerState<C, D>,
) -> Result<UserId, HuddleError> {
    let limit = Some(state.config.handshake_timeout);
    let data = match conn.recv_timeout(limit).await? {
        Received::Frame(data) => data,
        Received::Closed => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Received::TimedOut => {
            return Err(ProtocolError::InvalidMessage(
                "hello timed out".into(),
            )
            .into());
        }
    };

    match decode_inbound(state.hub.codec(), &data)? {
        Inbound::Control(Control::Hello { user_id }) => Ok(user_id),
        _ => Err(ProtocolError::InvalidMessage(
            "first frame must be hello".into(),
        )
        .into()),
    }
}

fn handle_control<C: Codec, D: RoomDirectory>(
    state: &ServerState<C, D>,
    conn_id: ConnectionId,
    control: Control,
) {
    match control {
        Control::Subscribe { room_id, topic } => {
            state.hub.subscribe(conn_id, &room_id, topic);
        }
        Control::Unsubscribe { room_id, topic } => {
            state.hub.unsubscribe(conn_id, &room_id, topic);
        }
        Control::Hello { .. } => {
            tracing::debug!(%conn_id, "ignoring repeated hello");
        }
    }
}

async fn handle_intent<C: Codec, D: RoomDirectory>(
    state: &ServerState<C, D>,
    joined: &mut JoinedSessions,
    intent: Intent,
) {
    match intent {
        Intent::Join {
            room_id,
            user_id,
            username,
        } => {
            if state.config.require_known_room
                && !state.directory.room_exists(&room_id).await
            {
                tracing::debug!(%room_id, %user_id, "join dropped: unknown room");
                return;
            }
            if let Some(joined_at) =
                state.coordinator.join(&room_id, &user_id, &username)
            {
                joined.insert((room_id, user_id), joined_at);
            }
        }
        Intent::Leave {
            room_id,
            user_id,
            username,
        } => {
            state.coordinator.leave(&room_id, &user_id, username.as_deref());
            joined.remove(&(room_id, user_id));
        }
        other => state.coordinator.handle(other),
    }
}

/// Drains the outbox onto the socket until the hub drops the sender.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut inbox: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(frame) = inbox.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
            break;
        }
    }
    let _ = conn.close().await;
}

/// Marks a closed connection's sessions pending, waits out the grace
/// period, then removes those still pending.
///
/// Every step is keyed on the `joined_at` recorded at join time, so a
/// session re-joined from another connection is never touched.
async fn release_sessions<C: Codec, D: RoomDirectory>(
    state: Arc<ServerState<C, D>>,
    joined: JoinedSessions,
) {
    let grace = state.config.disconnect_grace;
    let coordinator = &state.coordinator;

    if grace.is_zero() {
        for ((room_id, user_id), joined_at) in joined {
            coordinator.leave_session(&room_id, &user_id, joined_at);
        }
        return;
    }

    let pending: Vec<_> = joined
        .into_iter()
        .filter(|((room_id, user_id), joined_at)| {
            coordinator.mark_disconnected(room_id, user_id, *joined_at)
        })
        .collect();
    if pending.is_empty() {
        return;
    }

    tokio::time::sleep(grace).await;
    for ((room_id, user_id), joined_at) in pending {
        coordinator.expire_if_pending(&room_id, &user_id, joined_at);
    }
}
