//! TCP stream transport with length-prefix framing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

use crate::frame::{read_frame, write_frame};
use crate::{ConnectionId, Listener, Transport, TransportError, TransportKind};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Listener`] that hands out one [`StreamTransport`] per client.
#[derive(Debug)]
pub struct StreamListener {
    listener: TcpListener,
}

impl StreamListener {
    /// Binds a new stream listener to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "stream transport listening");
        }
        Ok(Self { listener })
    }
}

impl Listener for StreamListener {
    type Transport = StreamTransport;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Transport, Self::Error> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn =
            StreamTransport::from_stream(stream).map_err(TransportError::AcceptFailed)?;
        tracing::debug!(id = %conn.id, peer = %conn.peer, "accepted stream connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener.local_addr().map_err(TransportError::BindFailed)
    }
}

/// A single framed TCP connection.
///
/// The socket is split so that the session handler can sit in `recv`
/// while other tasks deliver broadcasts through `send`. Each half has its
/// own lock: one frame is written per lock acquisition, so concurrent
/// senders never interleave bytes.
#[derive(Debug)]
pub struct StreamTransport {
    id: ConnectionId,
    peer: SocketAddr,
    local: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl StreamTransport {
    /// Connects to a stream server. This is the client side of the
    /// framing the server speaks.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
        Self::from_stream(stream)
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))
    }

    fn from_stream(stream: TcpStream) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            id: ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            peer,
            local,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for StreamTransport {
    type Error = TransportError;

    async fn send(
        &self,
        data: &[u8],
        _dest: Option<SocketAddr>,
    ) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, data).await
    }

    async fn recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, Self::Error> {
        let mut reader = self.reader.lock().await;
        match read_frame(&mut *reader).await {
            Ok(Some(data)) => Ok(Some((data, self.peer))),
            Ok(None) => Ok(None),
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        Ok(self.local)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }
}
