//! Per-connection handler for stream clients.
//!
//! Each accepted TCP connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive frames → decode → hand to the router
//!   2. Remember the name of the latest successful `LOGIN`
//!   3. On end-of-stream or a receive error, tear the session down:
//!      unregister the user, announce the departure, close the socket

use std::sync::Arc;

use chatrelay_protocol::{Codec, Message};
use chatrelay_transport::{StreamTransport, Transport, TransportHandle};

use crate::router::{end_session, route, Inbound, Session};
use crate::server::ServerState;

/// Drop guard that ends a connection's session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async work.
struct SessionGuard<C: Codec> {
    username: Option<String>,
    transport: TransportHandle,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        let username = self.username.take();
        let transport = self.transport.clone();
        let state = Arc::clone(&self.state);
        // No runtime means the whole process is going down anyway.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            if let Some(username) = username {
                end_session(&state, &username).await;
            }
            if let Err(e) = transport.close().await {
                tracing::debug!(error = %e, "close after session end failed");
            }
        });
    }
}

/// Handles a single stream connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: StreamTransport,
    state: Arc<ServerState<C>>,
) {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let transport = TransportHandle::from(Arc::clone(&conn));
    let mut guard = SessionGuard {
        username: None,
        transport: transport.clone(),
        state: Arc::clone(&state),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some((data, _))) => data,
            Ok(None) => {
                tracing::info!(%conn_id, %peer, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let msg: Message = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode message");
                continue;
            }
        };

        let inbound = Inbound {
            origin: peer,
            transport: &transport,
            session: Session::Stream(guard.username.as_deref()),
        };
        if let Some(username) = route(&state, msg, &inbound).await {
            guard.username = Some(username);
        }
    }

    // guard drops here → session teardown fires.
}
