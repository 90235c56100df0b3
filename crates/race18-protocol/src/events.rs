//! Inbound and outbound events, and the envelope that carries them.
//!
//! Every frame on the wire is a JSON object of the shape
//!
//! ```text
//! { "type": "ROLL_DICE", "payload": { ... }, "timestamp": 1718035200000 }
//! ```
//!
//! The `type`/`payload` pair comes from the event enums (adjacently tagged),
//! and the [`Envelope`] adds the `timestamp` next to them.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{ActionStatus, PlayerId, PlayerView, RoomId, RoomSnapshot};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Actions a client can request.
///
/// Room and player are never part of a gameplay payload: the server binds
/// them to the connection at create/join time, so a client cannot act on
/// behalf of someone else.
///
/// Name and room id fields default to empty strings when absent from the
/// payload object, so a missing field and a blank one are rejected by the
/// same validation. The payload object itself is required for
/// `CREATE_ROOM` and `JOIN_ROOM`; without it the frame does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Open a new room and join it as its first player.
    CreateRoom {
        #[serde(default)]
        player_name: String,
    },

    /// Join an existing room by code.
    JoinRoom {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        player_name: String,
    },

    /// Roll the die on your turn.
    RollDice,

    /// Stop rolling and keep the current score.
    Hold,

    /// Reset the room for another round.
    NewGame,

    /// Leave the room but keep the connection open.
    LeaveRoom,
}

impl ClientEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "CREATE_ROOM",
            Self::JoinRoom { .. } => "JOIN_ROOM",
            Self::RollDice => "ROLL_DICE",
            Self::Hold => "HOLD",
            Self::NewGame => "NEW_GAME",
            Self::LeaveRoom => "LEAVE_ROOM",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Notifications the server sends.
///
/// Most variants embed a full [`RoomSnapshot`] so a client can always
/// re-render from the latest event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Reply to the creator of a room.
    RoomCreated {
        room_id: RoomId,
        player_id: PlayerId,
        room_state: RoomSnapshot,
    },

    /// Sent to the joiner (carrying their own id) and to everyone else.
    PlayerJoined {
        player_id: PlayerId,
        room_state: RoomSnapshot,
    },

    PlayerLeft {
        player_id: PlayerId,
        room_state: RoomSnapshot,
        message: String,
    },

    /// Result of a roll, broadcast to the whole room.
    DiceRolled {
        player_id: PlayerId,
        player_name: String,
        roll: u8,
        new_score: u32,
        status: ActionStatus,
        message: String,
    },

    GameStateUpdate {
        room_state: RoomSnapshot,
        message: String,
    },

    TurnChanged {
        current_turn: Option<PlayerId>,
        room_state: RoomSnapshot,
    },

    /// The round ended. `winner` is `None` when everybody busted or the
    /// room dropped below two players.
    GameOver {
        winner: Option<PlayerView>,
        room_state: RoomSnapshot,
        message: String,
    },

    /// A rejected action. Sent only to the connection that caused it.
    Error { message: String },
}

impl ServerEvent {
    /// Shorthand for an [`ServerEvent::Error`].
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "ROOM_CREATED",
            Self::PlayerJoined { .. } => "PLAYER_JOINED",
            Self::PlayerLeft { .. } => "PLAYER_LEFT",
            Self::DiceRolled { .. } => "DICE_ROLLED",
            Self::GameStateUpdate { .. } => "GAME_STATE_UPDATE",
            Self::TurnChanged { .. } => "TURN_CHANGED",
            Self::GameOver { .. } => "GAME_OVER",
            Self::Error { .. } => "ERROR",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame: an event plus the time it was sent.
///
/// `#[serde(flatten)]` lifts the event's `type` and `payload` keys to the
/// top level, so the JSON has exactly three keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<E> {
    #[serde(flatten)]
    pub event: E,

    /// Milliseconds since the Unix epoch. Clients may omit it.
    #[serde(default)]
    pub timestamp: u64,
}

impl<E> Envelope<E> {
    /// Wraps an event, stamped with the current wall-clock time.
    pub fn now(event: E) -> Self {
        Self {
            event,
            timestamp: unix_millis(),
        }
    }
}

/// Milliseconds since the Unix epoch (0 if the clock is before 1970).
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
