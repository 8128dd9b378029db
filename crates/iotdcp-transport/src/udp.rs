use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Largest datagram the endpoint reads in one call.
pub const MAX_DATAGRAM: usize = 65_507;

/// A bound UDP socket.
#[derive(Debug)]
pub struct DatagramSocket {
    socket: UdpSocket,
}

impl DatagramSocket {
    /// Bind to `addr` (e.g. `0.0.0.0:2570`).
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let socket = UdpSocket::bind(&addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        tracing::debug!(local = ?socket.local_addr().ok(), "datagram socket bound");
        Ok(Self { socket })
    }

    /// Bind to an ephemeral port on all interfaces.
    pub fn bind_any() -> Result<Self> {
        Self::bind("0.0.0.0:0")
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Allow sending to broadcast addresses.
    pub fn set_broadcast(&self, enabled: bool) -> Result<()> {
        Ok(self.socket.set_broadcast(enabled)?)
    }

    /// `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.socket.set_read_timeout(timeout)?)
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.socket.set_write_timeout(timeout)?)
    }

    /// Receive one datagram.
    ///
    /// Returns `Ok(None)` when the read timeout elapses.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        loop {
            match self.socket.recv_from(buf) {
                Ok(received) => return Ok(Some(received)),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Send one datagram to `target`.
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        loop {
            match self.socket.send_to(buf, target) {
                Ok(sent) => return Ok(sent),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Try to clone this socket (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
        })
    }

    /// Borrow the std socket.
    pub fn as_std(&self) -> &UdpSocket {
        &self.socket
    }

    /// Convert into a tokio socket for use on a runtime.
    #[cfg(feature = "async")]
    pub fn into_tokio(self) -> Result<tokio::net::UdpSocket> {
        self.socket.set_nonblocking(true)?;
        Ok(tokio::net::UdpSocket::from_std(self.socket)?)
    }
}

/// Resolve `host:port` (or a bare host with `default_port`) to one address.
pub fn resolve(target: &str, default_port: u16) -> Result<SocketAddr> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    let candidate = match target.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => target.to_string(),
        _ => format!("{target}:{default_port}"),
    };
    candidate
        .to_socket_addrs()
        .map_err(|_| TransportError::Resolve(target.to_string()))?
        .next()
        .ok_or_else(|| TransportError::Resolve(target.to_string()))
}
