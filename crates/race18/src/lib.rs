//! # Race to 18
//!
//! A server-authoritative multiplayer dice game. Players gather in a room,
//! take turns rolling a six-sided die, and race to get as close to 18 as
//! possible without going over.
//!
//! The server rolls every die, enforces whose turn it is, and decides the
//! winner; clients only ask to roll, hold, or start over.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use race18::prelude::*;
//!
//! # async fn run() -> Result<(), Race18Error> {
//! let server = Race18Server::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Layers
//!
//! - `race18-transport`: WebSocket connections
//! - `race18-protocol`: events and the JSON envelope
//! - `race18-session`: which connection plays as whom
//! - `race18-room`: rooms, turns and the rules
//! - this crate: the dispatcher task, connection handlers and the server

mod config;
mod dispatch;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_BIND_ADDR, ServerConfig};
pub use dispatch::{
    Dispatcher, DispatcherHandle, INTERNAL_ERROR, INVALID_MESSAGE, Inbound, spawn_dispatcher,
};
pub use error::Race18Error;
pub use server::{Race18Server, Race18ServerBuilder};

/// Everything needed to run a server or talk to one in tests.
pub mod prelude {
    pub use crate::{Race18Error, Race18Server, Race18ServerBuilder, ServerConfig};
    pub use race18_protocol::{
        ActionStatus, ClientEvent, Codec, Envelope, JsonCodec, PlayerId, PlayerStatus, PlayerView,
        RoomId, RoomSnapshot, ServerEvent,
    };
    pub use race18_room::{Dice, RoomConfig, ScriptedDice, ServerDice};
}
