//! Ownership wrapper around one OS socket descriptor.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::{SockAddr, Socket};

use crate::ProtocolKind;

/// Owns exactly one socket descriptor for its whole lifetime.
///
/// The descriptor is created eagerly in [`SocketHandle::open`] and closed when the handle drops,
/// on every exit path including construction failure further up the stack. No handle shares its
/// descriptor with another.
#[derive(Debug)]
pub(crate) struct SocketHandle {
    socket: Socket,
}

impl SocketHandle {
    /// Creates the descriptor for `kind` and applies the blocking mode, once.
    ///
    /// The mode is never changed afterwards; a non-blocking handle stays non-blocking for its
    /// whole lifetime.
    pub(crate) fn open(kind: ProtocolKind, blocking: bool) -> io::Result<Self> {
        let socket = Socket::new(kind.domain(), kind.socket_type(), Some(kind.protocol()))?;
        if !blocking {
            socket.set_nonblocking(true)?;
        }
        Ok(Self { socket })
    }

    /// Wraps a descriptor produced by `accept`.
    ///
    /// The blocking mode is applied explicitly; inheritance of the flag across `accept` is
    /// platform-dependent.
    pub(crate) fn adopt(socket: Socket, blocking: bool) -> io::Result<Self> {
        socket.set_nonblocking(!blocking)?;
        Ok(Self { socket })
    }

    pub(crate) fn bind(&self, address: &SockAddr) -> io::Result<()> {
        self.socket.bind(address)
    }

    pub(crate) fn listen(&self, backlog: i32) -> io::Result<()> {
        self.socket.listen(backlog)
    }

    pub(crate) fn connect(&self, address: &SockAddr) -> io::Result<()> {
        self.socket.connect(address)
    }

    pub(crate) fn accept(&self) -> io::Result<(Socket, SockAddr)> {
        self.socket.accept()
    }

    pub(crate) fn send(&self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send(payload)
    }

    /// One OS read into `buffer`; returns whatever byte count that single read yielded.
    pub(crate) fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        (&self.socket).read(buffer)
    }

    /// Queries the locally bound address, used to read back an OS-assigned port.
    pub(crate) fn local_addr(&self) -> io::Result<Option<SocketAddr>> {
        Ok(self.socket.local_addr()?.as_socket())
    }
}

impl AsRawFd for SocketHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
