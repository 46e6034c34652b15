//! Wire protocol for chatrelay.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Message`], [`MessageKind`], [`WireRecord`]): the chat
//!   records that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about sockets or users. Framing is the
//! transport's job, and deciding who receives what is the server's.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Router (registry lookups)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Message, MessageKind, WireRecord, SERVER_NAME};
