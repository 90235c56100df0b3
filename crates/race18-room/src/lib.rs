//! Rooms and rules for Race to 18.
//!
//! Everything here is synchronous and lock-free: the server owns one
//! [`RoomRegistry`] inside its dispatcher task and applies events to it
//! one at a time.
//!
//! # Key types
//!
//! - [`GameState`]: the rules engine (scoring, bust, hold, winner)
//! - [`GameRoom`]: roster, turn cursor, and one round of play
//! - [`RoomRegistry`]: room creation by code, lookup, and the idle sweep
//! - [`Dice`]: where rolls come from ([`ServerDice`] in production)

mod config;
mod error;
mod game;
mod player;
mod registry;
mod room;

pub use config::{MAX_PLAYER_NAME_LEN, RoomConfig, TARGET_SCORE};
pub use error::RoomError;
pub use game::{ActionOutcome, Dice, GameState, ScriptedDice, ServerDice};
pub use player::{Player, validate_player_name};
pub use registry::{DiceFactory, ROOM_CODE_LEN, RoomRegistry};
pub use room::{GameRoom, RollResult, TurnEnd};
