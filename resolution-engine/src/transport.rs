use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Datagram I/O over one bound socket. The engine never binds or closes it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn receive(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;

    async fn send_to(&self, bytes: &[u8], to: SocketAddr) -> std::io::Result<usize>;
}

#[async_trait]
impl Transport for UdpSocket {
    async fn receive(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }

    async fn send_to(&self, bytes: &[u8], to: SocketAddr) -> std::io::Result<usize> {
        UdpSocket::send_to(self, bytes, to).await
    }
}
