//! Transport abstraction layer for chatrelay.
//!
//! Provides the [`Listener`] and [`Transport`] traits that abstract over
//! the two ways a chat client can reach the server:
//!
//! - [`StreamTransport`]: a TCP connection. TCP has no message
//!   boundaries, so every message is framed with a 4-byte big-endian
//!   length prefix (see [`encode_frame`] / [`read_frame`]).
//! - [`DatagramTransport`]: a UDP socket. Every datagram is one message,
//!   and every send needs an explicit destination.
//!
//! Routing code never looks at which variant it holds. It talks to a
//! [`TransportHandle`], which is chosen once when the connection or socket
//! is created and forwards every call to the variant inside.

#![allow(async_fn_in_trait)]

mod datagram;
mod error;
mod frame;
mod handle;
mod stream;

pub use datagram::{DatagramTransport, MAX_DATAGRAM_SIZE};
pub use error::TransportError;
pub use frame::{encode_frame, read_frame, write_frame, LENGTH_PREFIX_LEN};
pub use handle::TransportHandle;
pub use stream::{StreamListener, StreamTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Which kind of transport a message arrived on.
///
/// Used for the informational `sender_protocol` label that the server
/// stamps on relayed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Connection-oriented TCP stream.
    Stream,
    /// Connectionless UDP datagrams.
    Datagram,
}

impl TransportKind {
    /// The label used on the wire: `"TCP"` or `"UDP"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Stream => "TCP",
            Self::Datagram => "UDP",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts new incoming stream connections.
pub trait Listener: Send + Sync + 'static {
    /// The transport type produced for each accepted connection.
    type Transport: Transport;
    /// The error type for listener operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Transport, Self::Error>;

    /// Returns the address the listener is bound to.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// One end of a transport that can send and receive whole messages.
pub trait Transport: Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one message.
    ///
    /// Stream transports ignore `dest` (the peer is fixed). Datagram
    /// transports require it.
    async fn send(
        &self,
        data: &[u8],
        dest: Option<SocketAddr>,
    ) -> Result<(), Self::Error>;

    /// Receives the next whole message and the address it came from.
    ///
    /// Returns `Ok(None)` at end-of-input, i.e. when the peer closed the
    /// stream (possibly in the middle of a frame).
    async fn recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, Self::Error>;

    /// Closes the transport.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the local address of the transport.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;

    /// Returns which kind of transport this is.
    fn kind(&self) -> TransportKind;
}
