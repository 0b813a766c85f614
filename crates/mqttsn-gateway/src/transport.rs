// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// UDP transport and the datagram sink seam used for fan-out.

use std::net::{SocketAddr, ToSocketAddrs};

use tokio::net::UdpSocket;

use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Non-blocking, fire-and-forget datagram output.
///
/// The engine delivers broker messages through this trait so fan-out can be
/// exercised without a socket.
pub trait DatagramSink: Send + Sync {
    fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<(), GatewayError>;
}

// ---------------------------------------------------------------------------
// UDP transport
// ---------------------------------------------------------------------------

/// UDP socket created with `socket2` and driven by tokio.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `host:port`. Must be called from within a tokio runtime.
    ///
    /// No `SO_REUSEADDR`: a port held by another gateway is a bind error.
    pub fn bind(host: &str, port: u16) -> Result<Self, GatewayError> {
        let label = format!("{}:{}", host, port);
        let bind_err = |source: std::io::Error| GatewayError::Bind {
            addr: label.clone(),
            source,
        };

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| {
                bind_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address did not resolve",
                ))
            })?;

        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )
        .map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let socket = UdpSocket::from_std(socket.into()).map_err(bind_err)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GatewayError> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next datagram.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), GatewayError> {
        Ok(self.socket.recv_from(buf).await?)
    }

    /// Send a reply, waiting for socket capacity if needed.
    pub async fn send(&self, addr: SocketAddr, data: &[u8]) -> Result<(), GatewayError> {
        self.socket
            .send_to(data, addr)
            .await
            .map_err(|source| GatewayError::Send { addr, source })?;
        Ok(())
    }
}

impl DatagramSink for UdpTransport {
    fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<(), GatewayError> {
        self.socket
            .try_send_to(data, addr)
            .map_err(|source| GatewayError::Send { addr, source })?;
        Ok(())
    }
}
