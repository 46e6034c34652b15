use std::net::SocketAddr;
use std::sync::Arc;

use crate::{
    DatagramTransport, StreamTransport, Transport, TransportError, TransportKind,
};

/// A shareable handle to either transport variant.
///
/// The variant is fixed when the handle is built; callers only use the
/// [`Transport`] methods. Clones refer to the same underlying socket.
#[derive(Debug, Clone)]
pub enum TransportHandle {
    /// A framed TCP connection to one client.
    Stream(Arc<StreamTransport>),
    /// The server's shared UDP socket.
    Datagram(DatagramTransport),
}

impl From<Arc<StreamTransport>> for TransportHandle {
    fn from(conn: Arc<StreamTransport>) -> Self {
        Self::Stream(conn)
    }
}

impl From<DatagramTransport> for TransportHandle {
    fn from(socket: DatagramTransport) -> Self {
        Self::Datagram(socket)
    }
}

impl Transport for TransportHandle {
    type Error = TransportError;

    async fn send(
        &self,
        data: &[u8],
        dest: Option<SocketAddr>,
    ) -> Result<(), Self::Error> {
        match self {
            Self::Stream(conn) => conn.send(data, dest).await,
            Self::Datagram(socket) => socket.send(data, dest).await,
        }
    }

    async fn recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, Self::Error> {
        match self {
            Self::Stream(conn) => conn.recv().await,
            Self::Datagram(socket) => socket.recv().await,
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        match self {
            Self::Stream(conn) => conn.close().await,
            Self::Datagram(socket) => socket.close().await,
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        match self {
            Self::Stream(conn) => conn.local_addr(),
            Self::Datagram(socket) => socket.local_addr(),
        }
    }

    fn kind(&self) -> TransportKind {
        match self {
            Self::Stream(conn) => conn.kind(),
            Self::Datagram(socket) => socket.kind(),
        }
    }
}
