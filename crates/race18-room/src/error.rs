//! Error types for the room layer.
//!
//! Every variant is an expected rule violation, returned as a value and
//! never raised as a panic. The `Display` text is short and written for
//! players: the server forwards it verbatim in an `ERROR` event.

use race18_protocol::{PlayerId, PlayerStatus, RoomId};

use crate::MAX_PLAYER_NAME_LEN;

/// Errors that can occur during room and game operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    // -- Validation --
    /// The player name was missing or blank after trimming.
    #[error("Player name is required")]
    EmptyName,

    /// The player name is longer than [`MAX_PLAYER_NAME_LEN`] characters.
    #[error("Player name must be at most {} characters", MAX_PLAYER_NAME_LEN)]
    NameTooLong,

    /// A join request carried no room code.
    #[error("Room ID is required")]
    MissingRoomId,

    // -- Not found --
    /// The room does not exist (never did, or was swept).
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    /// The player is not a member of this room.
    #[error("Player {0} is not in this room")]
    PlayerNotFound(PlayerId),

    /// The connection has not created or joined a room.
    #[error("You are not in a room")]
    NotInRoom,

    // -- Preconditions --
    /// The room is at capacity.
    #[error("Room {0} is full")]
    RoomFull(RoomId),

    /// The player id is already on the roster.
    #[error("Player {0} is already in this room")]
    AlreadyInRoom(PlayerId),

    /// The connection already plays in a room.
    #[error("You are already in room {0}")]
    AlreadyJoined(RoomId),

    /// The round has not started (fewer than two players so far).
    #[error("Waiting for another player to join")]
    GameNotStarted,

    /// The round is over; start a new game first.
    #[error("Game is over")]
    GameOver,

    /// Someone else holds the turn.
    #[error("Not your turn")]
    NotYourTurn,

    /// Only active players can hold.
    #[error("Cannot hold: you are already {0}")]
    CannotHold(PlayerStatus),
}
