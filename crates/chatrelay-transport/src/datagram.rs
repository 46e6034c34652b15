//! UDP datagram transport: one message per datagram.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::{Transport, TransportError, TransportKind};

/// Largest datagram the receiver reads. Anything longer is truncated by
/// the OS.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// A bound UDP socket.
///
/// Cheap to clone: every clone shares the same socket. The server keeps
/// one socket for all datagram clients and stores a clone of it in each
/// registry entry, next to that client's address.
#[derive(Debug, Clone)]
pub struct DatagramTransport {
    socket: Arc<UdpSocket>,
}

impl DatagramTransport {
    /// Binds a UDP socket. Use port 0 on the client side to let the OS
    /// pick one.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        if let Ok(local) = socket.local_addr() {
            tracing::info!(%local, "datagram transport bound");
        }
        Ok(Self {
            socket: Arc::new(socket),
        })
    }
}

impl Transport for DatagramTransport {
    type Error = TransportError;

    async fn send(
        &self,
        data: &[u8],
        dest: Option<SocketAddr>,
    ) -> Result<(), Self::Error> {
        let dest = dest.ok_or(TransportError::MissingDestination)?;
        self.socket
            .send_to(data, dest)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    /// Never returns `Ok(None)`: a datagram socket has no end-of-input.
    async fn recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, Self::Error> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        buf.truncate(len);
        Ok(Some((buf, from)))
    }

    /// The socket is released when the last clone is dropped.
    async fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.socket.local_addr().map_err(TransportError::BindFailed)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }
}
