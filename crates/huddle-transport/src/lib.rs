//! Transport layer for the huddle relay.
//!
//! The relay only needs a narrow slice of a socket: accept a client,
//! exchange whole frames with it, notice when it goes quiet, close it.
//! [`Transport`] and [`Connection`] are that slice; the server is written
//! against them and never sees tungstenite types.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle for one client connection.
///
/// The hub keys its outboxes and subscriptions on it, and every log line
/// about a connection carries it as `conn_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next id. Ids start at 1 and are never reused within
    /// a process.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a bounded read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One complete inbound frame.
    Frame(Vec<u8>),
    /// The peer closed the connection or the stream ended.
    Closed,
    /// Nothing arrived within the limit.
    TimedOut,
}

/// Source of client connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client and completes its upgrade.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// One client connection carrying whole frames.
///
/// `send` and `recv` may run concurrently from different tasks: the
/// connection's reader can sit in `recv` while its writer pushes frames.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame. `Ok(None)` means the peer closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Like [`recv`](Self::recv), but gives up after `limit`. `None`
    /// waits indefinitely.
    ///
    /// Used for the `hello` deadline and for dropping idle clients.
    async fn recv_timeout(
        &self,
        limit: Option<Duration>,
    ) -> Result<Received, Self::Error> {
        let next = match limit {
            Some(limit) => {
                match tokio::time::timeout(limit, self.recv()).await {
                    Ok(next) => next,
                    Err(_) => return Ok(Received::TimedOut),
                }
            }
            None => self.recv().await,
        };
        Ok(match next? {
            Some(data) => Received::Frame(data),
            None => Received::Closed,
        })
    }

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// Remote address, for logs.
    fn peer_addr(&self) -> SocketAddr;
}
