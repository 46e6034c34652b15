//! # chatrelay
//!
//! A chat relay server reachable over TCP and UDP at the same time.
//!
//! Clients log in under a unique name, then send public messages (relayed
//! to every logged-in user, the sender included) or private messages
//! (relayed to one named user). Users on either transport can talk to
//! each other; the server stamps each relayed message with the transport
//! it arrived on.
//!
//! The crate ties the layers together:
//!
//! - [`chatrelay_transport`]: framed TCP connections and the shared UDP socket
//! - [`chatrelay_protocol`]: the JSON message records
//! - [`chatrelay_registry`]: who is logged in, and how to reach them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn start() -> Result<(), ChatRelayError> {
//! let server = ChatServer::builder()
//!     .bind("0.0.0.0:8888")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod router;
mod server;

pub use config::{ServerConfig, TransportMode};
pub use error::ChatRelayError;
pub use server::{lan_address, ChatServer, ChatServerBuilder};

/// Everything needed to start a server or write a client.
pub mod prelude {
    pub use crate::{ChatRelayError, ChatServer, ChatServerBuilder, ServerConfig, TransportMode};
    pub use chatrelay_protocol::{Codec, JsonCodec, Message, MessageKind, SERVER_NAME};
    pub use chatrelay_registry::{ClientRegistry, RegistryError};
    pub use chatrelay_transport::{
        DatagramTransport, StreamTransport, Transport, TransportHandle, TransportKind,
    };
}
