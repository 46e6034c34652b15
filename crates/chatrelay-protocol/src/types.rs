//! Chat message types and their wire shape.
//!
//! Inside the server every message is a [`Message`]: a Rust enum with one
//! variant per message kind, so a `target` can only ever exist on a
//! private message. On the wire the same message is a flat
//! [`WireRecord`] with five fields, which is what clients in any language
//! read and write:
//!
//! ```json
//! {"type": "PRIVATE_MSG", "sender": "alice", "payload": "secret",
//!  "target": "bob", "sender_protocol": "TCP"}
//! ```
//!
//! `#[serde(into = ..., try_from = ...)]` routes every (de)serialization
//! of `Message` through `WireRecord`, so the two can never drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

/// The pseudo-user the server speaks as in `ACK`, `ERROR` and system
/// notices.
pub const SERVER_NAME: &str = "SERVER";

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The `type` field of a record.
///
/// `rename_all = "SCREAMING_SNAKE_CASE"` turns `PublicMsg` into
/// `"PUBLIC_MSG"`. A record whose `type` is not one of these five fails to
/// decode, which is how unknown types get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Client → Server: claim a username.
    Login,
    /// Either direction: text for everyone.
    PublicMsg,
    /// Either direction: text for one user.
    PrivateMsg,
    /// Server → Client: something went wrong.
    Error,
    /// Server → Client: login accepted.
    Ack,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Login => "LOGIN",
            Self::PublicMsg => "PUBLIC_MSG",
            Self::PrivateMsg => "PRIVATE_MSG",
            Self::Error => "ERROR",
            Self::Ack => "ACK",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// WireRecord: the flat five-field shape
// ---------------------------------------------------------------------------

/// The record exactly as it travels on the wire.
///
/// `payload` defaults to an empty string and the two optional fields to
/// `null` when a client leaves them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub sender_protocol: Option<String>,
}

// ---------------------------------------------------------------------------
// Message: the typed record
// ---------------------------------------------------------------------------

/// One chat message.
///
/// Messages are values: the server never edits a message it received. To
/// relay one, it builds a fresh `Message` with the fields it wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireRecord", try_from = "WireRecord")]
pub enum Message {
    /// `sender` is the username being claimed.
    Login { sender: String },

    /// Text for every logged-in user.
    PublicMsg {
        sender: String,
        payload: String,
        /// `"TCP"` or `"UDP"`, stamped by the server when relaying.
        sender_protocol: Option<String>,
    },

    /// Text for a single user.
    PrivateMsg {
        sender: String,
        target: String,
        payload: String,
        sender_protocol: Option<String>,
    },

    /// A human-readable failure reason.
    Error { sender: String, payload: String },

    /// A human-readable confirmation.
    Ack { sender: String, payload: String },
}

impl Message {
    /// A login request for `username`.
    pub fn login(username: impl Into<String>) -> Self {
        Self::Login {
            sender: username.into(),
        }
    }

    /// A public message with no transport label.
    pub fn public(sender: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::PublicMsg {
            sender: sender.into(),
            payload: payload.into(),
            sender_protocol: None,
        }
    }

    /// A private message with no transport label.
    pub fn private(
        sender: impl Into<String>,
        target: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::PrivateMsg {
            sender: sender.into(),
            target: target.into(),
            payload: payload.into(),
            sender_protocol: None,
        }
    }

    /// An `ERROR` from the server.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            sender: SERVER_NAME.to_string(),
            payload: reason.into(),
        }
    }

    /// An `ACK` from the server.
    pub fn ack(text: impl Into<String>) -> Self {
        Self::Ack {
            sender: SERVER_NAME.to_string(),
            payload: text.into(),
        }
    }

    /// A public notice from the server ("alice entró al chat").
    pub fn notice(text: impl Into<String>) -> Self {
        Self::public(SERVER_NAME, text)
    }

    /// Returns the same message stamped with a transport label. Only the
    /// two text variants carry one; the others come back unchanged.
    pub fn with_sender_protocol(self, label: impl Into<String>) -> Self {
        match self {
            Self::PublicMsg {
                sender, payload, ..
            } => Self::PublicMsg {
                sender,
                payload,
                sender_protocol: Some(label.into()),
            },
            Self::PrivateMsg {
                sender,
                target,
                payload,
                ..
            } => Self::PrivateMsg {
                sender,
                target,
                payload,
                sender_protocol: Some(label.into()),
            },
            other => other,
        }
    }

    /// The record's `type`.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Login { .. } => MessageKind::Login,
            Self::PublicMsg { .. } => MessageKind::PublicMsg,
            Self::PrivateMsg { .. } => MessageKind::PrivateMsg,
            Self::Error { .. } => MessageKind::Error,
            Self::Ack { .. } => MessageKind::Ack,
        }
    }

    /// The declared sender. Not trustworthy on its own: the server checks
    /// it against the registry before acting on it.
    pub fn sender(&self) -> &str {
        match self {
            Self::Login { sender }
            | Self::PublicMsg { sender, .. }
            | Self::PrivateMsg { sender, .. }
            | Self::Error { sender, .. }
            | Self::Ack { sender, .. } => sender,
        }
    }

    /// The text body. Empty for `LOGIN`.
    pub fn payload(&self) -> &str {
        match self {
            Self::Login { .. } => "",
            Self::PublicMsg { payload, .. }
            | Self::PrivateMsg { payload, .. }
            | Self::Error { payload, .. }
            | Self::Ack { payload, .. } => payload,
        }
    }
}

impl From<Message> for WireRecord {
    fn from(msg: Message) -> Self {
        let kind = msg.kind();
        match msg {
            Message::Login { sender } => WireRecord {
                kind,
                sender,
                payload: String::new(),
                target: None,
                sender_protocol: None,
            },
            Message::PublicMsg {
                sender,
                payload,
                sender_protocol,
            } => WireRecord {
                kind,
                sender,
                payload,
                target: None,
                sender_protocol,
            },
            Message::PrivateMsg {
                sender,
                target,
                payload,
                sender_protocol,
            } => WireRecord {
                kind,
                sender,
                payload,
                target: Some(target),
                sender_protocol,
            },
            Message::Error { sender, payload } | Message::Ack { sender, payload } => {
                WireRecord {
                    kind,
                    sender,
                    payload,
                    target: None,
                    sender_protocol: None,
                }
            }
        }
    }
}

/// Fields a kind does not use are ignored. The one combination that can't
/// be represented is a `PRIVATE_MSG` with nobody to deliver it to.
impl TryFrom<WireRecord> for Message {
    type Error = ProtocolError;

    fn try_from(record: WireRecord) -> Result<Self, ProtocolError> {
        let WireRecord {
            kind,
            sender,
            payload,
            target,
            sender_protocol,
        } = record;

        Ok(match kind {
            MessageKind::Login => Message::Login { sender },
            MessageKind::PublicMsg => Message::PublicMsg {
                sender,
                payload,
                sender_protocol,
            },
            MessageKind::PrivateMsg => {
                let target = target.ok_or_else(|| {
                    ProtocolError::InvalidMessage("PRIVATE_MSG without target".into())
                })?;
                Message::PrivateMsg {
                    sender,
                    target,
                    payload,
                    sender_protocol,
                }
            }
            MessageKind::Error => Message::Error { sender, payload },
            MessageKind::Ack => Message::Ack { sender, payload },
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
