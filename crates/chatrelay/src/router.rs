//! Message routing: login, public broadcast, and private delivery.
//!
//! Both transports end up here. The stream handler calls [`route`] with
//! the name its connection logged in under; the datagram loop has no
//! per-client state and lets the registry answer "who is this?" for every
//! datagram.
//!
//! Every outbound send is best effort. A recipient that vanished or whose
//! socket errors is skipped, and the failure is logged at `debug` and
//! never reaches the sender.

use std::net::SocketAddr;

use chatrelay_protocol::{Codec, Message, SERVER_NAME};
use chatrelay_registry::ClientEntry;
use chatrelay_transport::{Transport, TransportHandle, TransportKind};

use crate::server::ServerState;

/// Greeting sent in the `ACK` for a successful login.
pub(crate) const WELCOME: &str = "Bienvenido al servidor";

/// Reply to anything but `LOGIN` from an unauthenticated sender.
pub(crate) const NOT_LOGGED_IN: &str = "not logged in";

/// How the sender of an inbound message is identified.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Session<'a> {
    /// A stream connection and the name it is logged in under, if any.
    Stream(Option<&'a str>),
    /// A datagram. Identity is looked up in the registry every time.
    Datagram,
}

/// One decoded message and where it came from.
pub(crate) struct Inbound<'a> {
    /// The sender's address. Replies go here.
    pub(crate) origin: SocketAddr,
    /// The transport it arrived on.
    pub(crate) transport: &'a TransportHandle,
    pub(crate) session: Session<'a>,
}

/// Routes one decoded message.
///
/// Returns the username that was just registered if `msg` was a
/// successful `LOGIN`, so a stream handler can remember it.
pub(crate) async fn route<C: Codec>(
    state: &ServerState<C>,
    msg: Message,
    inbound: &Inbound<'_>,
) -> Option<String> {
    if let Message::Login { sender } = msg {
        return login(state, sender, inbound).await;
    }

    if !is_authenticated(state, msg.sender(), inbound).await {
        tracing::debug!(
            origin = %inbound.origin,
            sender = msg.sender(),
            kind = %msg.kind(),
            "message from unauthenticated sender"
        );
        reply(state, inbound, &Message::error(NOT_LOGGED_IN)).await;
        return None;
    }

    let kind = inbound.transport.kind();
    match msg {
        Message::PublicMsg {
            sender, payload, ..
        } => {
            tracing::info!(protocol = %kind, %sender, text = %payload, "public message");
            let relay = Message::public(sender, payload).with_sender_protocol(kind.label());
            broadcast(state, &relay).await;
        }

        Message::PrivateMsg {
            sender,
            target,
            payload,
            ..
        } => {
            tracing::info!(protocol = %kind, %sender, %target, text = %payload, "private message");
            match state.registry.lookup(&target).await {
                Some(entry) => {
                    let relay = Message::private(sender, target, payload)
                        .with_sender_protocol(kind.label());
                    if let Some(bytes) = encode(state, &relay) {
                        deliver(&entry, &bytes).await;
                    }
                }
                None => {
                    let error = Message::error(format!("user {target} not found"));
                    reply(state, inbound, &error).await;
                }
            }
        }

        other => {
            tracing::debug!(sender = other.sender(), kind = %other.kind(), "ignoring client message");
        }
    }

    None
}

/// Handles a `LOGIN`. On success everyone (the new user included) gets a
/// join notice, and then the new user gets an `ACK`.
///
/// A stream connection that is already logged in is renamed: the new name
/// is registered first, and only then is the old one released, so a
/// rejected rename leaves the session as it was.
async fn login<C: Codec>(
    state: &ServerState<C>,
    username: String,
    inbound: &Inbound<'_>,
) -> Option<String> {
    if let Err(reason) = validate_username(&username) {
        tracing::warn!(origin = %inbound.origin, %username, reason, "login rejected");
        reply(state, inbound, &Message::error(reason)).await;
        return None;
    }

    if let Err(e) = state
        .registry
        .add(&username, inbound.origin, inbound.transport.clone())
        .await
    {
        tracing::warn!(origin = %inbound.origin, %username, reason = %e, "login rejected");
        reply(state, inbound, &Message::error(e.to_string())).await;
        return None;
    }

    // Unregister the old name before announcing, so the connection isn't
    // reachable twice.
    let previous = match inbound.session {
        Session::Stream(Some(previous)) => state.registry.remove(previous).await.map(|e| e.username),
        _ => None,
    };

    tracing::info!(
        %username,
        protocol = %inbound.transport.kind(),
        origin = %inbound.origin,
        "user logged in"
    );
    broadcast(state, &Message::notice(format!("{username} entró al chat"))).await;
    reply(state, inbound, &Message::ack(WELCOME)).await;

    if let Some(previous) = previous {
        tracing::info!(username = %previous, renamed_to = %username, "user left");
        broadcast(state, &Message::notice(format!("{previous} salió del chat"))).await;
    }
    Some(username)
}

/// Rejects names that could never be told apart from server traffic.
fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.trim().is_empty() {
        return Err("username must not be empty");
    }
    if username == SERVER_NAME {
        return Err("username SERVER is reserved");
    }
    Ok(())
}

/// Decides whether `sender` may act through this inbound message.
///
/// A stream connection may only speak for the name it logged in under.
/// A datagram is accepted if `sender` is registered as a datagram user at
/// exactly the address the datagram came from.
async fn is_authenticated<C: Codec>(
    state: &ServerState<C>,
    sender: &str,
    inbound: &Inbound<'_>,
) -> bool {
    match inbound.session {
        Session::Stream(username) => username == Some(sender),
        Session::Datagram => match state.registry.lookup(sender).await {
            Some(entry) => {
                entry.endpoint == inbound.origin
                    && entry.transport.kind() == TransportKind::Datagram
            }
            None => false,
        },
    }
}

/// Removes `username` and tells everyone who is left. A no-op if the
/// name is already gone.
pub(crate) async fn end_session<C: Codec>(state: &ServerState<C>, username: &str) {
    if state.registry.remove(username).await.is_none() {
        return;
    }
    tracing::info!(username, "user left");
    broadcast(state, &Message::notice(format!("{username} salió del chat"))).await;
}

/// Sends `msg` to every registered user, including its sender.
pub(crate) async fn broadcast<C: Codec>(state: &ServerState<C>, msg: &Message) {
    let Some(bytes) = encode(state, msg) else {
        return;
    };
    for username in state.registry.snapshot_usernames().await {
        // Users who left after the snapshot are simply skipped.
        if let Some(entry) = state.registry.lookup(&username).await {
            deliver(&entry, &bytes).await;
        }
    }
}

/// Sends `msg` back to whoever sent the inbound message.
async fn reply<C: Codec>(state: &ServerState<C>, inbound: &Inbound<'_>, msg: &Message) {
    let Some(bytes) = encode(state, msg) else {
        return;
    };
    if let Err(e) = inbound.transport.send(&bytes, Some(inbound.origin)).await {
        tracing::debug!(origin = %inbound.origin, error = %e, "reply failed");
    }
}

async fn deliver(entry: &ClientEntry<TransportHandle>, bytes: &[u8]) {
    if let Err(e) = entry.transport.send(bytes, Some(entry.endpoint)).await {
        tracing::debug!(username = %entry.username, error = %e, "delivery failed");
    }
}

fn encode<C: Codec>(state: &ServerState<C>, msg: &Message) -> Option<Vec<u8>> {
    match state.codec.encode(msg) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!(kind = %msg.kind(), error = %e, "failed to encode message");
            None
        }
    }
}
