//! `HuddleServer` builder and accept loop.
//!
//! This is the entry point for running the relay. It ties the layers
//! together: transport → protocol → room → hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use huddle_protocol::{Codec, JsonCodec};
use huddle_registry::{RoomDirectory, RoomSessionRegistry};
use huddle_room::{PresenceConfig, RoomLifecycleCoordinator};
use huddle_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{HuddleError, Hub, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Everything inside synchronizes itself, so handlers share it through
/// a plain `Arc` with no outer lock.
pub(crate) struct ServerState<C: Codec, D: RoomDirectory> {
    pub(crate) hub: Arc<Hub<C>>,
    pub(crate) coordinator: Arc<RoomLifecycleCoordinator<Hub<C>>>,
    pub(crate) directory: Arc<D>,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use huddle::prelude::*;
///
/// # async fn start() -> Result<(), HuddleError> {
/// let server = HuddleServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(MemoryRoomDirectory::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct HuddleServerBuilder {
    config: ServerConfig,
}

impl HuddleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_address = addr.to_string();
        self
    }

    /// Sets how long a dropped connection's sessions stay pending.
    pub fn disconnect_grace(mut self, grace: Duration) -> Self {
        self.config.disconnect_grace = grace;
        self
    }

    /// Sets the presence wording and debug topic switch.
    pub fn presence(mut self, presence: PresenceConfig) -> Self {
        self.config.presence = presence;
        self
    }

    /// Binds the listener and wires up the shared state.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<D: RoomDirectory>(
        self,
        directory: D,
    ) -> Result<HuddleServer<JsonCodec, D>, HuddleError> {
        let transport =
            WebSocketTransport::bind(&self.config.bind_address).await?;

        let registry = Arc::new(RoomSessionRegistry::new());
        let hub = Arc::new(Hub::new(JsonCodec));
        let coordinator = Arc::new(RoomLifecycleCoordinator::new(
            registry,
            Arc::clone(&hub),
            self.config.presence.clone(),
        ));

        let state = Arc::new(ServerState {
            hub,
            coordinator,
            directory: Arc::new(directory),
            config: self.config,
        });

        Ok(HuddleServer { transport, state })
    }
}

impl Default for HuddleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay.
///
/// Call [`run()`](Self::run) to start accepting connections. The
/// accessors hand out shared handles that stay valid while it runs.
pub struct HuddleServer<C: Codec, D: RoomDirectory> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C, D>>,
}

impl<C: Codec, D: RoomDirectory> HuddleServer<C, D> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HuddleError> {
        Ok(self.transport.local_addr()?)
    }

    /// The lifecycle coordinator, e.g. to post announcements.
    pub fn coordinator(&self) -> Arc<RoomLifecycleCoordinator<Hub<C>>> {
        Arc::clone(&self.state.coordinator)
    }

    pub fn registry(&self) -> Arc<RoomSessionRegistry> {
        Arc::clone(self.state.coordinator.registry())
    }

    pub fn directory(&self) -> Arc<D> {
        Arc::clone(&self.state.directory)
    }

    pub fn hub(&self) -> Arc<Hub<C>> {
        Arc::clone(&self.state.hub)
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated or the future is dropped.
    pub async fn run(mut self) -> Result<(), HuddleError> {
        tracing::info!(
            addr = %self.state.config.bind_address,
            "huddle relay running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
