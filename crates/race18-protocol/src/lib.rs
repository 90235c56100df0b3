//! Wire protocol for Race to 18.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`PlayerStatus`], [`RoomSnapshot`]):
//!   identities and the public view of a room.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]): what
//!   travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or game rules.

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{unix_millis, ClientEvent, Envelope, ServerEvent};
pub use types::{ActionStatus, PlayerId, PlayerStatus, PlayerView, RoomId, RoomSnapshot};
