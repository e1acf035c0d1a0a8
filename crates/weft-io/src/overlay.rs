//! Overlay UDP transport between neighbouring routers and endhosts.
//!
//! An [`Overlay`] pairs the address a neighbour should send to (public)
//! with the address the socket actually binds (bind), which differ behind
//! NAT or on asymmetrically-routed hosts. Unset bind parts fall back to
//! the public values.

use std::net::{IpAddr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::OverlayError;

/// Overlay port that non-router endpoints of this transport family bind.
pub const ENDHOST_PORT: u16 = 30041;

/// Kernel send/receive buffer requested for every overlay socket (5 MiB).
pub const SOCKET_BUFFER_SIZE: usize = 5 * (1 << 20);

/// A public/bind address pair plus the means to open sockets on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub_ip: IpAddr,
    pub_port: u16,
    bind_ip: Option<IpAddr>,
    bind_port: Option<u16>,
}

impl Overlay {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            pub_ip: ip,
            pub_port: port,
            bind_ip: None,
            bind_port: None,
        }
    }

    /// Set a distinct bind address for NAT/asymmetric deployments.
    pub fn with_bind(mut self, ip: Option<IpAddr>, port: Option<u16>) -> Self {
        self.bind_ip = ip;
        self.bind_port = port;
        self
    }

    /// The address neighbours send to.
    pub fn public_addr(&self) -> SocketAddr {
        SocketAddr::new(self.pub_ip, self.pub_port)
    }

    /// The address the socket binds; unset parts default to the public
    /// address.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.bind_ip.unwrap_or(self.pub_ip),
            self.bind_port.unwrap_or(self.pub_port),
        )
    }

    /// Open a receiving socket at the bind address.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen(&self) -> Result<UdpSocket, OverlayError> {
        self.open(None)
    }

    /// Open a socket bound locally and associated with one fixed peer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, remote: SocketAddr) -> Result<UdpSocket, OverlayError> {
        self.open(Some(remote))
    }

    fn open(&self, remote: Option<SocketAddr>) -> Result<UdpSocket, OverlayError> {
        let bind = self.bind_addr();
        let socket = Socket::new(Domain::for_address(bind), Type::DGRAM, Some(Protocol::UDP))?;
        socket
            .set_recv_buffer_size(SOCKET_BUFFER_SIZE)
            .map_err(OverlayError::BufferSize)?;
        socket
            .set_send_buffer_size(SOCKET_BUFFER_SIZE)
            .map_err(OverlayError::BufferSize)?;
        socket.set_nonblocking(true)?;
        socket.bind(&bind.into())?;
        if let Some(remote) = remote {
            socket.connect(&remote.into())?;
        }
        let socket = UdpSocket::from_std(socket.into())?;
        Ok(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_defaults_to_public() {
        let over = Overlay::new("192.0.2.1".parse().unwrap(), 50000);
        assert_eq!(over.public_addr(), "192.0.2.1:50000".parse().unwrap());
        assert_eq!(over.bind_addr(), over.public_addr());
    }

    #[test]
    fn bind_overrides_apply_independently() {
        let over = Overlay::new("192.0.2.1".parse().unwrap(), 50000)
            .with_bind(Some("10.0.0.1".parse().unwrap()), None);
        assert_eq!(over.bind_addr(), "10.0.0.1:50000".parse().unwrap());

        let over = Overlay::new("192.0.2.1".parse().unwrap(), 50000)
            .with_bind(None, Some(50001));
        assert_eq!(over.bind_addr(), "192.0.2.1:50001".parse().unwrap());
    }

    #[tokio::test]
    async fn listen_and_connect_roundtrip() {
        let listener = Overlay::new("127.0.0.1".parse().unwrap(), 0)
            .listen()
            .unwrap();
        let listen_addr = listener.local_addr().unwrap();

        let sender = Overlay::new("127.0.0.1".parse().unwrap(), 0)
            .connect(listen_addr)
            .unwrap();

        sender.send(b"overlay ping").await.unwrap();

        let mut buf = [0u8; 64];
        let (n, src) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"overlay ping");
        assert_eq!(src, sender.local_addr().unwrap());
    }
}
