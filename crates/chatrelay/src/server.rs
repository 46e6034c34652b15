//! `ChatServer` builder and listener loops.
//!
//! This is the entry point for running a chat relay. It ties together all
//! the layers: transport → protocol → router → registry.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use chatrelay_protocol::{Codec, JsonCodec, Message};
use chatrelay_registry::{ClientRegistry, RegistryConfig};
use chatrelay_transport::{
    DatagramTransport, Listener, StreamListener, Transport, TransportError, TransportHandle,
};
use tokio::net::UdpSocket;

use crate::config::{ServerConfig, TransportMode};
use crate::handler::handle_connection;
use crate::router::{route, Inbound, Session};
use crate::ChatRelayError;

/// A listener loop gives up after this many failures in a row.
const MAX_CONSECUTIVE_FAILURES: u32 = 64;

/// Pause after a failed accept/receive before trying again.
const FAILURE_BACKOFF: Duration = Duration::from_millis(10);

/// Shared server state passed to each connection handler task and to the
/// datagram loop.
///
/// The registry has its own lock; nothing else here is mutable.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Arc<ClientRegistry<TransportHandle>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a chat server.
///
/// # Example
///
/// ```rust,no_run
/// use chatrelay::prelude::*;
///
/// # async fn run() -> Result<(), ChatRelayError> {
/// let server = ChatServer::builder()
///     .bind("0.0.0.0:8888")
///     .mode(TransportMode::Both)
///     .max_clients(5)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChatServerBuilder {
    bind_addr: String,
    mode: TransportMode,
    registry_config: RegistryConfig,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8888".to_string(),
            mode: TransportMode::Both,
            registry_config: RegistryConfig::default(),
        }
    }

    /// Creates a builder from parsed command-line settings.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .bind(&config.bind_addr().to_string())
            .mode(config.mode)
            .max_clients(config.max_clients)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets which transports to serve.
    pub fn mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets how many users may be logged in at once.
    pub fn max_clients(mut self, max_clients: usize) -> Self {
        self.registry_config.max_clients = max_clients;
        self
    }

    /// Binds the sockets and builds the server.
    ///
    /// In [`TransportMode::Both`] the UDP socket binds the port the TCP
    /// listener obtained, so binding port 0 still yields one shared port.
    pub async fn build(self) -> Result<ChatServer<JsonCodec>, ChatRelayError> {
        let stream = if self.mode.has_stream() {
            Some(StreamListener::bind(self.bind_addr.as_str()).await?)
        } else {
            None
        };

        let datagram = if self.mode.has_datagram() {
            let socket = match &stream {
                Some(listener) => DatagramTransport::bind(listener.local_addr()?).await?,
                None => DatagramTransport::bind(self.bind_addr.as_str()).await?,
            };
            Some(socket)
        } else {
            None
        };

        let state = Arc::new(ServerState {
            registry: Arc::new(ClientRegistry::new(self.registry_config)),
            codec: JsonCodec,
        });

        Ok(ChatServer {
            stream,
            datagram,
            state,
        })
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound chat server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct ChatServer<C: Codec> {
    stream: Option<StreamListener>,
    datagram: Option<DatagramTransport>,
    state: Arc<ServerState<C>>,
}

impl ChatServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }
}

impl<C: Codec> ChatServer<C> {
    /// The TCP listener's address, if TCP is served.
    pub fn stream_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// The UDP socket's address, if UDP is served.
    pub fn datagram_addr(&self) -> Option<SocketAddr> {
        self.datagram.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Returns the local address the server is bound to. In
    /// [`TransportMode::Both`] both transports share it.
    pub fn local_addr(&self) -> Result<SocketAddr, ChatRelayError> {
        match (&self.stream, &self.datagram) {
            (Some(listener), _) => Ok(listener.local_addr()?),
            (None, Some(socket)) => Ok(socket.local_addr()?),
            (None, None) => Err(TransportError::ConnectionClosed("no transport bound".into()).into()),
        }
    }

    /// The registry of logged-in users. Stays valid after [`run()`]
    /// takes the server.
    ///
    /// [`run()`]: Self::run
    pub fn registry(&self) -> Arc<ClientRegistry<TransportHandle>> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the listener loops.
    ///
    /// Each transport gets its own task, so one loop failing never stops
    /// the other. Returns once every loop has stopped, with the last
    /// loop error if any. Runs until the process is terminated otherwise.
    pub async fn run(self) -> Result<(), ChatRelayError> {
        tracing::info!(
            tcp = ?self.stream_addr(),
            udp = ?self.datagram_addr(),
            "chat relay running"
        );

        let mut loops = Vec::with_capacity(2);
        if let Some(listener) = self.stream {
            loops.push(tokio::spawn(run_stream_loop(listener, Arc::clone(&self.state))));
        }
        if let Some(socket) = self.datagram {
            loops.push(tokio::spawn(run_datagram_loop(socket, Arc::clone(&self.state))));
        }

        let mut last_error = None;
        for handle in loops {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "listener loop stopped");
                    last_error = Some(e);
                }
                Err(e) => tracing::error!(error = %e, "listener loop panicked"),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Accepts TCP connections and spawns a handler task for each.
async fn run_stream_loop<C: Codec>(
    mut listener: StreamListener,
    state: Arc<ServerState<C>>,
) -> Result<(), ChatRelayError> {
    let mut failures = 0;
    loop {
        match listener.accept().await {
            Ok(conn) => {
                failures = 0;
                tokio::spawn(handle_connection(conn, Arc::clone(&state)));
            }
            Err(e) => {
                failures += 1;
                tracing::error!(error = %e, failures, "accept failed");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(e.into());
                }
                tokio::time::sleep(FAILURE_BACKOFF).await;
            }
        }
    }
}

/// Receives datagrams on the shared UDP socket and routes each one.
///
/// Datagrams are handled one at a time, in arrival order.
async fn run_datagram_loop<C: Codec>(
    socket: DatagramTransport,
    state: Arc<ServerState<C>>,
) -> Result<(), ChatRelayError> {
    let transport = TransportHandle::from(socket.clone());
    let mut failures = 0;
    loop {
        let (data, origin) = match socket.recv().await {
            Ok(Some(received)) => {
                failures = 0;
                received
            }
            Ok(None) => continue,
            Err(e) => {
                failures += 1;
                tracing::error!(error = %e, failures, "datagram receive failed");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(e.into());
                }
                tokio::time::sleep(FAILURE_BACKOFF).await;
                continue;
            }
        };

        let msg: Message = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%origin, error = %e, "failed to decode datagram");
                continue;
            }
        };

        let inbound = Inbound {
            origin,
            transport: &transport,
            session: Session::Datagram,
        };
        route(&state, msg, &inbound).await;
    }
}

/// Finds the address other machines on the LAN can reach this host at.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface. Returns `None` on a machine with no route out.
pub async fn lan_address() -> Option<IpAddr> {
    let probe = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    probe.connect("8.8.8.8:80").await.ok()?;
    probe.local_addr().ok().map(|addr| addr.ip())
}
