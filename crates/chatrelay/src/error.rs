//! Unified error type for the chat relay server.

use chatrelay_protocol::ProtocolError;
use chatrelay_registry::RegistryError;
use chatrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The server itself only returns the `Transport` variant, from startup and
/// from a listener loop that gave up. Errors that happen while serving a
/// single client are logged (or turned into an `ERROR` reply) and never
/// reach this type. The `Protocol` and `Registry` variants let library
/// callers that drive a [`Codec`] or a [`ClientRegistry`] directly use `?`
/// with this one error type.
///
/// [`Codec`]: chatrelay_protocol::Codec
/// [`ClientRegistry`]: chatrelay_registry::ClientRegistry
#[derive(Debug, thiserror::Error)]
pub enum ChatRelayError {
    /// A transport-level error (bind, accept, receive, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid record).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry-level error (full, name taken).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
