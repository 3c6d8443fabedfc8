//! Presence wording and switches.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PresenceConfig
// ---------------------------------------------------------------------------

/// Controls how presence is announced to a room.
///
/// The defaults produce the Russian-language chat lines existing clients
/// display, posted as user `system` named `Система`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// `userId` on every `SYSTEM` chat line.
    pub system_user_id: String,

    /// `username` on every `SYSTEM` chat line.
    pub system_username: String,

    /// Appended to the username when someone joins.
    pub joined_suffix: String,

    /// Appended to the username when someone leaves.
    pub left_suffix: String,

    /// Publish a `DEBUG` event to the room's debug topic after every
    /// membership change.
    pub debug_topic: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            system_user_id: "system".to_string(),
            system_username: "Система".to_string(),
            joined_suffix: " присоединился к конференции".to_string(),
            left_suffix: " покинул конференцию".to_string(),
            debug_topic: false,
        }
    }
}
