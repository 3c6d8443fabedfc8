//! Server configuration.
//!
//! Loaded from `HUDDLE_*` environment variables. Every setting has a
//! default, so an empty environment yields a working relay.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use huddle_room::PresenceConfig;
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default time a dropped connection's sessions stay pending.
pub const DEFAULT_DISCONNECT_GRACE_SECONDS: u64 = 30;

/// Default time a new connection has to send `hello`.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS: u64 = 5;

/// Default time without any inbound frame before a connection is
/// dropped. 0 disables the check.
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 60;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// How long a dropped connection's sessions stay
    /// `disconnected-pending` before the user is removed. Zero removes
    /// them immediately.
    pub disconnect_grace: Duration,

    /// How long a new connection has to send `hello`.
    pub handshake_timeout: Duration,

    /// Drop a connection that sends nothing for this long. `None`
    /// disables the check.
    pub idle_timeout: Option<Duration>,

    /// Drop joins for rooms the room directory doesn't know.
    pub require_known_room: bool,

    /// Presence wording and the debug topic switch.
    pub presence: PresenceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            disconnect_grace: Duration::from_secs(
                DEFAULT_DISCONNECT_GRACE_SECONDS,
            ),
            handshake_timeout: Duration::from_secs(
                DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
            ),
            idle_timeout: Some(Duration::from_secs(
                DEFAULT_IDLE_TIMEOUT_SECONDS,
            )),
            require_known_room: false,
            presence: PresenceConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(
        vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("HUDDLE_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let disconnect_grace = Duration::from_secs(seconds(
            vars,
            "HUDDLE_DISCONNECT_GRACE_SECONDS",
            DEFAULT_DISCONNECT_GRACE_SECONDS,
        )?);

        let handshake_seconds = seconds(
            vars,
            "HUDDLE_HANDSHAKE_TIMEOUT_SECONDS",
            DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
        )?;
        if handshake_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "HUDDLE_HANDSHAKE_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        let idle_seconds = seconds(
            vars,
            "HUDDLE_IDLE_TIMEOUT_SECONDS",
            DEFAULT_IDLE_TIMEOUT_SECONDS,
        )?;
        let idle_timeout =
            (idle_seconds > 0).then(|| Duration::from_secs(idle_seconds));

        let require_known_room =
            flag(vars, "HUDDLE_REQUIRE_KNOWN_ROOM", false)?;

        let mut presence = PresenceConfig {
            debug_topic: flag(vars, "HUDDLE_DEBUG_TOPIC", false)?,
            ..PresenceConfig::default()
        };
        if let Some(name) = vars.get("HUDDLE_SYSTEM_USERNAME") {
            presence.system_username = name.clone();
        }

        Ok(Self {
            bind_address,
            disconnect_grace,
            handshake_timeout: Duration::from_secs(handshake_seconds),
            idle_timeout,
            require_known_room,
            presence,
        })
    }
}

fn seconds(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
    }
}

fn flag(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
    }
}
