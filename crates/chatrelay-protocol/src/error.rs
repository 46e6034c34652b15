//! Error types for the protocol layer.
//!
//! Each chatrelay crate defines its own error enum, so a `ProtocolError`
//! always means the problem is in turning records into bytes or back,
//! never in networking or in the registry.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a record into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a record).
    ///
    /// Common causes: malformed JSON, a missing `type` or `sender`, an
    /// unknown `type`, or a datagram that was cut short.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The record parsed but breaks a protocol rule, e.g. a
    /// `PRIVATE_MSG` with no `target`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
