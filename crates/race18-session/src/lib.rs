//! Connection session management for Race to 18.
//!
//! This crate owns the glue between a network connection and the game:
//!
//! 1. **Identity**: every connection gets a [`SessionId`]
//! 2. **Binding**: which room and player a connection acts as ([`Binding`])
//! 3. **Delivery**: the [`Outbox`] trait rooms broadcast through, and the
//!    [`SessionRegistry`] that implements it over per-connection channels
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← broadcasts through Outbox, stores SessionId per player
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId, RoomId, ServerEvent
//! ```

mod error;
mod outbox;
mod registry;
mod session;

pub use error::SessionError;
pub use outbox::Outbox;
pub use registry::SessionRegistry;
pub use session::{Binding, OUTBOUND_CHANNEL_SIZE, Session, SessionId, SessionSender};
