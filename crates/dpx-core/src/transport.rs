use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Abstract reliable byte transport carrying Diameter frames.
///
/// Lets the peer engine run over TCP, TLS wrappers or in-memory pipes
/// transparently.
#[async_trait]
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {
    /// Get remote peer address.
    fn peer_addr(&self) -> std::io::Result<SocketAddr>;

    /// Get local address.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

#[async_trait]
impl Transport for tokio::net::TcpStream {
    fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.peer_addr()
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.local_addr()
    }
}
