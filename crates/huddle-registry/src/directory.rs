//! Room directory: which rooms exist, independent of who is in them.
//!
//! The relay itself never needs this; a room in the session registry
//! springs into existence on first join. The directory is what a lobby
//! or invitation flow talks to: create a room, hand out its invite code,
//! resolve the code back to a room. The server can optionally refuse
//! joins to rooms the directory doesn't know.
//!
//! [`RoomDirectory`] is the seam for a real store. [`MemoryRoomDirectory`]
//! keeps everything in process.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_protocol::{RoomId, UserId};
use rand::Rng;
use serde::Serialize;

use crate::DirectoryError;

/// Length of a generated room id.
const ROOM_ID_LEN: usize = 8;

/// Length of a generated invite code.
const INVITE_CODE_LEN: usize = 8;

/// Alphabet for invite codes. Upper-case so codes can be read aloud.
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How many random draws to make before giving up on uniqueness.
const MAX_DRAWS: usize = 16;

/// Default capacity when the creator doesn't pick one.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 10;

/// A room as the directory knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub owner_id: UserId,
    pub invite_code: String,
    pub max_participants: usize,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

/// Parameters for [`RoomDirectory::create_room`].
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub owner_id: UserId,
    /// `None` uses [`DEFAULT_MAX_PARTICIPANTS`].
    pub max_participants: Option<usize>,
}

/// Stores rooms and resolves invite codes.
///
/// Implementations must be shareable across connection tasks, hence the
/// `Send + Sync + 'static` bound, and every method returns a `Send`
/// future so callers can use it from spawned tasks.
///
/// Lookups only return active rooms.
pub trait RoomDirectory: Send + Sync + 'static {
    /// Creates a room with a fresh id and a fresh invite code.
    ///
    /// # Errors
    /// `InvalidName` for a blank name, `InvalidCapacity` for a zero
    /// capacity.
    fn create_room(
        &self,
        room: NewRoom,
    ) -> impl std::future::Future<Output = Result<Room, DirectoryError>> + Send;

    /// Looks a room up by id.
    fn find_room(
        &self,
        room_id: &RoomId,
    ) -> impl std::future::Future<Output = Option<Room>> + Send;

    /// Resolves an invite code to its room.
    fn find_room_by_invite_code(
        &self,
        code: &str,
    ) -> impl std::future::Future<Output = Option<Room>> + Send;

    /// Whether an active room with this id exists.
    fn room_exists(
        &self,
        room_id: &RoomId,
    ) -> impl std::future::Future<Output = bool> + Send;

    /// Whether this invite code is taken.
    fn invite_code_exists(
        &self,
        code: &str,
    ) -> impl std::future::Future<Output = bool> + Send;

    /// Marks a room inactive. Its id and invite code stay reserved.
    ///
    /// Returns `false` if the room was unknown.
    fn deactivate_room(
        &self,
        room_id: &RoomId,
    ) -> impl std::future::Future<Output = bool> + Send;
}

// ---------------------------------------------------------------------------
// MemoryRoomDirectory
// ---------------------------------------------------------------------------

/// In-process [`RoomDirectory`]. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRoomDirectory {
    rooms: DashMap<RoomId, Room>,
    invites: DashMap<String, RoomId>,
}

impl MemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms ever created, active or not.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Reserves an unused room id.
    fn allocate_id(&self) -> Result<RoomId, DirectoryError> {
        for _ in 0..MAX_DRAWS {
            let id = RoomId::new(short_uuid());
            if !self.rooms.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(DirectoryError::Exhausted("room id"))
    }

    /// Reserves an unused invite code for `room_id`.
    ///
    /// The reservation goes through the map entry, so two concurrent
    /// creations can't end up sharing a code.
    fn allocate_invite(
        &self,
        room_id: &RoomId,
    ) -> Result<String, DirectoryError> {
        for _ in 0..MAX_DRAWS {
            let code = invite_code();
            if let Entry::Vacant(slot) = self.invites.entry(code.clone()) {
                slot.insert(room_id.clone());
                return Ok(code);
            }
        }
        Err(DirectoryError::Exhausted("invite code"))
    }
}

impl RoomDirectory for MemoryRoomDirectory {
    async fn create_room(&self, room: NewRoom) -> Result<Room, DirectoryError> {
        let name = room.name.trim();
        if name.is_empty() {
            return Err(DirectoryError::InvalidName);
        }
        let max_participants =
            room.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
        if max_participants == 0 {
            return Err(DirectoryError::InvalidCapacity(max_participants));
        }

        let id = self.allocate_id()?;
        let invite_code = self.allocate_invite(&id)?;
        let created = Room {
            id: id.clone(),
            name: name.to_string(),
            owner_id: room.owner_id,
            invite_code,
            max_participants,
            created_at: Utc::now(),
            active: true,
        };
        self.rooms.insert(id, created.clone());

        tracing::info!(
            room_id = %created.id,
            owner_id = %created.owner_id,
            "room created"
        );
        Ok(created)
    }

    async fn find_room(&self, room_id: &RoomId) -> Option<Room> {
        self.rooms
            .get(room_id)
            .filter(|room| room.active)
            .map(|room| room.value().clone())
    }

    async fn find_room_by_invite_code(&self, code: &str) -> Option<Room> {
        let room_id = self.invites.get(code).map(|id| id.value().clone())?;
        self.find_room(&room_id).await
    }

    async fn room_exists(&self, room_id: &RoomId) -> bool {
        self.rooms.get(room_id).is_some_and(|room| room.active)
    }

    async fn invite_code_exists(&self, code: &str) -> bool {
        self.invites.contains_key(code)
    }

    async fn deactivate_room(&self, room_id: &RoomId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.active = false;
                tracing::info!(%room_id, "room deactivated");
                true
            }
            None => false,
        }
    }
}

/// First eight characters of a random v4 UUID.
fn short_uuid() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ROOM_ID_LEN);
    id
}

fn invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..INVITE_ALPHABET.len());
            char::from(INVITE_ALPHABET[idx])
        })
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
