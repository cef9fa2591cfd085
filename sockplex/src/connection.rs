//! The connection variants and their role state machines.

use std::os::fd::{AsRawFd, RawFd};

use socket2::SockAddr;

use crate::error::ConnectionError;
use crate::socket::SocketHandle;
use crate::{Endpoint, ProtocolKind};

/// Upper bound for one receive call, the UDP payload ceiling.
///
/// One receive returns exactly what one OS read yields, up to this many bytes; the crate performs
/// no reassembly or length framing.
pub const MAX_MESSAGE_LENGTH: usize = 65507;

/// Listen backlog applied by TCP binds.
const TCP_BACKLOG: i32 = 1024;

/// A single two-party communication channel over one OS socket.
///
/// The four closed variants cover the TCP/UDP, IPv4/IPv6 matrix; every operation dispatches over
/// them with an exhaustive match. The descriptor is allocated eagerly at construction and is
/// valid until the connection drops; no two connections share one.
///
/// The role is chosen by the caller through which operation they invoke: [`Connection::bind`]
/// followed by [`Connection::accept_next`] for servers, [`Connection::connect_to`] for clients.
#[derive(Debug)]
pub enum Connection {
    /// Connection-oriented channel over IPv4.
    TcpV4(TcpConnection),

    /// Connection-oriented channel over IPv6.
    TcpV6(TcpConnection),

    /// Datagram channel over IPv4.
    UdpV4(UdpConnection),

    /// Datagram channel over IPv6.
    UdpV6(UdpConnection),
}

impl Connection {
    pub(crate) fn open(
        kind: ProtocolKind,
        endpoint: Endpoint,
        blocking: bool,
    ) -> Result<Self, ConnectionError> {
        // Resolution strictly precedes descriptor creation: a failed resolve leaves the
        // descriptor table untouched.
        let resolved = endpoint.resolve(kind)?;

        Ok(match kind {
            ProtocolKind::TcpV4 => Self::TcpV4(TcpConnection::open(kind, endpoint, resolved, blocking)?),
            ProtocolKind::TcpV6 => Self::TcpV6(TcpConnection::open(kind, endpoint, resolved, blocking)?),
            ProtocolKind::UdpV4 => Self::UdpV4(UdpConnection::open(kind, endpoint, resolved, blocking)?),
            ProtocolKind::UdpV6 => Self::UdpV6(UdpConnection::open(kind, endpoint, resolved, blocking)?),
        })
    }

    /// Binds the socket to the resolved local address.
    ///
    /// For TCP this also starts listening (backlog 1024) in the same transition, moving the
    /// connection into its server role. When the endpoint's port was unspecified, the
    /// OS-assigned ephemeral port is read back and available through [`Connection::port`]
    /// afterwards.
    ///
    /// Binding an already-bound connection fails with [`ConnectionError::AlreadyBound`].
    pub fn bind(&mut self) -> Result<(), ConnectionError> {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => inner.bind(),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.bind(),
        }
    }

    /// Connects to the resolved peer address, taking the client role.
    ///
    /// In non-blocking mode an in-flight handshake surfaces as
    /// [`ConnectionError::WouldBlock`]; calling again once the socket is writable either
    /// completes (the OS reports the socket as already connected) or fails with the handshake
    /// error.
    pub fn connect_to(&mut self) -> Result<(), ConnectionError> {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => inner.connect_to(),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.connect_to(),
        }
    }

    /// Accepts the next incoming peer, yielding a new, independently owned connection in the
    /// connected state. The listening connection itself stays in its listening state.
    ///
    /// Only valid on a bound TCP connection; datagram variants have no accept semantics.
    pub fn accept_next(&mut self) -> Result<Connection, ConnectionError> {
        match self {
            Self::TcpV4(inner) => Ok(Self::TcpV4(inner.accept_next()?)),
            Self::TcpV6(inner) => Ok(Self::TcpV6(inner.accept_next()?)),
            Self::UdpV4(_) | Self::UdpV6(_) => Err(ConnectionError::InvalidState(
                "accept_next requires a listening TCP connection",
            )),
        }
    }

    /// Sends the full payload in a single OS write.
    ///
    /// A short write is fatal ([`ConnectionError::ShortWrite`]), not retried or resumed. For
    /// datagram variants one send is one datagram; for TCP, message boundaries are not preserved
    /// across separate sends.
    pub fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => inner.send(payload),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.send(payload),
        }
    }

    /// Sends the payload on `peer`'s descriptor instead of this connection's own.
    ///
    /// A TCP server replies to one accepted child this way. For datagram variants there is no
    /// separate peer descriptor and this collapses to plain [`Connection::send`].
    pub fn send_to(&self, payload: &[u8], peer: &Connection) -> Result<(), ConnectionError> {
        match self {
            Self::TcpV4(_) | Self::TcpV6(_) => peer.send(payload),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.send(payload),
        }
    }

    /// Receives up to [`MAX_MESSAGE_LENGTH`] bytes in one OS read.
    ///
    /// A zero-length read on a TCP connection signals an orderly close by the peer and is
    /// reported as [`ConnectionError::ClosedByPeer`]; a zero-length UDP datagram is an ordinary
    /// empty message.
    pub fn receive(&self) -> Result<Vec<u8>, ConnectionError> {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => inner.receive(),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.receive(),
        }
    }

    /// Receives on `peer`'s descriptor instead of this connection's own.
    ///
    /// The TCP server-side counterpart of [`Connection::send_to`]; for datagram variants this
    /// collapses to plain [`Connection::receive`].
    pub fn receive_from(&self, peer: &Connection) -> Result<Vec<u8>, ConnectionError> {
        match self {
            Self::TcpV4(_) | Self::TcpV6(_) => peer.receive(),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.receive(),
        }
    }

    /// Reserved extension point for socket options.
    ///
    /// Always fails with [`ConnectionError::NotImplemented`] so an absent effect cannot be
    /// mistaken for success.
    pub fn change_options(&mut self) -> Result<(), ConnectionError> {
        Err(ConnectionError::NotImplemented)
    }

    /// The concrete kind of this connection.
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Self::TcpV4(_) => ProtocolKind::TcpV4,
            Self::TcpV6(_) => ProtocolKind::TcpV6,
            Self::UdpV4(_) => ProtocolKind::UdpV4,
            Self::UdpV6(_) => ProtocolKind::UdpV6,
        }
    }

    /// The raw socket descriptor. Owned by this connection; closing it elsewhere is out of
    /// contract.
    pub fn descriptor(&self) -> RawFd {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => inner.socket.as_raw_fd(),
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.socket.as_raw_fd(),
        }
    }

    /// The endpoint this connection was created for (for accepted children: the peer).
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => &inner.endpoint,
            Self::UdpV4(inner) | Self::UdpV6(inner) => &inner.endpoint,
        }
    }

    /// The endpoint's port, once known.
    ///
    /// After an auto-port bind this is the OS-assigned ephemeral port.
    pub fn port(&self) -> Option<u16> {
        self.endpoint().port()
    }

    /// Whether operations on this connection block until completion.
    pub fn is_blocking(&self) -> bool {
        match self {
            Self::TcpV4(inner) | Self::TcpV6(inner) => inner.blocking,
            Self::UdpV4(inner) | Self::UdpV6(inner) => inner.blocking,
        }
    }
}

/// Role state of a connection-oriented socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TcpState {
    Created,
    Listening,
    Connected,
}

/// Connection-oriented internals shared by the IPv4 and IPv6 variants.
#[derive(Debug)]
pub struct TcpConnection {
    socket: SocketHandle,
    endpoint: Endpoint,
    resolved: SockAddr,
    state: TcpState,
    blocking: bool,
}

impl TcpConnection {
    fn open(
        kind: ProtocolKind,
        endpoint: Endpoint,
        resolved: SockAddr,
        blocking: bool,
    ) -> Result<Self, ConnectionError> {
        let socket = SocketHandle::open(kind, blocking).map_err(ConnectionError::SocketCreation)?;
        Ok(Self {
            socket,
            endpoint,
            resolved,
            state: TcpState::Created,
            blocking,
        })
    }

    fn bind(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            TcpState::Created => {}
            TcpState::Listening => return Err(ConnectionError::AlreadyBound),
            TcpState::Connected => {
                return Err(ConnectionError::InvalidState(
                    "cannot bind a connected connection",
                ));
            }
        }

        self.socket
            .bind(&self.resolved)
            .map_err(ConnectionError::Bind)?;
        self.socket
            .listen(TCP_BACKLOG)
            .map_err(ConnectionError::Bind)?;
        self.state = TcpState::Listening;

        cache_assigned_port(&self.socket, &mut self.endpoint).map_err(ConnectionError::Bind)?;
        tracing::debug!(endpoint = %self.endpoint, "listening");
        Ok(())
    }

    fn connect_to(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            TcpState::Created => {}
            TcpState::Listening => {
                return Err(ConnectionError::InvalidState(
                    "cannot connect a listening connection",
                ));
            }
            TcpState::Connected => {
                return Err(ConnectionError::InvalidState("already connected"));
            }
        }

        match self.socket.connect(&self.resolved) {
            Ok(()) => {}
            // A repeated non-blocking connect reports completion as EISCONN.
            Err(error) if error.raw_os_error() == Some(libc::EISCONN) => {}
            Err(error) => return Err(ConnectionError::from_connect_io(error)),
        }
        self.state = TcpState::Connected;
        tracing::debug!(endpoint = %self.endpoint, "connected");
        Ok(())
    }

    fn accept_next(&mut self) -> Result<Self, ConnectionError> {
        if self.state != TcpState::Listening {
            return Err(ConnectionError::InvalidState(
                "accept_next requires a listening connection",
            ));
        }

        let (socket, peer) = self
            .socket
            .accept()
            .map_err(|error| ConnectionError::from_io(error, ConnectionError::Accept))?;
        let socket = SocketHandle::adopt(socket, self.blocking).map_err(ConnectionError::Accept)?;

        let endpoint = peer.as_socket().map(Endpoint::from).unwrap_or_default();
        tracing::debug!(peer = %endpoint, "accepted connection");

        Ok(Self {
            socket,
            endpoint,
            resolved: peer,
            state: TcpState::Connected,
            blocking: self.blocking,
        })
    }

    fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let sent = self
            .socket
            .send(payload)
            .map_err(|error| ConnectionError::from_io(error, ConnectionError::Send))?;
        if sent != payload.len() {
            return Err(ConnectionError::ShortWrite {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, ConnectionError> {
        let mut buffer = vec![0u8; MAX_MESSAGE_LENGTH];
        let received = self
            .socket
            .recv(&mut buffer)
            .map_err(|error| ConnectionError::from_io(error, ConnectionError::Receive))?;
        if received == 0 {
            return Err(ConnectionError::ClosedByPeer);
        }
        buffer.truncate(received);
        Ok(buffer)
    }
}

/// Datagram internals shared by the IPv4 and IPv6 variants.
#[derive(Debug)]
pub struct UdpConnection {
    socket: SocketHandle,
    endpoint: Endpoint,
    resolved: SockAddr,
    bound: bool,
    connected: bool,
    blocking: bool,
}

impl UdpConnection {
    fn open(
        kind: ProtocolKind,
        endpoint: Endpoint,
        resolved: SockAddr,
        blocking: bool,
    ) -> Result<Self, ConnectionError> {
        let socket = SocketHandle::open(kind, blocking).map_err(ConnectionError::SocketCreation)?;
        Ok(Self {
            socket,
            endpoint,
            resolved,
            bound: false,
            connected: false,
            blocking,
        })
    }

    fn bind(&mut self) -> Result<(), ConnectionError> {
        if self.bound {
            return Err(ConnectionError::AlreadyBound);
        }

        self.socket
            .bind(&self.resolved)
            .map_err(ConnectionError::Bind)?;
        self.bound = true;

        cache_assigned_port(&self.socket, &mut self.endpoint).map_err(ConnectionError::Bind)?;
        tracing::debug!(endpoint = %self.endpoint, "bound");
        Ok(())
    }

    /// Fixes the default peer for subsequent sends and receives.
    ///
    /// Valid from either the created or the bound state; a datagram socket may bind a local
    /// address and then connect a peer.
    fn connect_to(&mut self) -> Result<(), ConnectionError> {
        if self.connected {
            return Err(ConnectionError::InvalidState("already connected"));
        }

        self.socket
            .connect(&self.resolved)
            .map_err(ConnectionError::from_connect_io)?;
        self.connected = true;
        tracing::debug!(endpoint = %self.endpoint, "connected");
        Ok(())
    }

    fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let sent = self
            .socket
            .send(payload)
            .map_err(|error| ConnectionError::from_io(error, ConnectionError::Send))?;
        if sent != payload.len() {
            return Err(ConnectionError::ShortWrite {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, ConnectionError> {
        let mut buffer = vec![0u8; MAX_MESSAGE_LENGTH];
        let received = self
            .socket
            .recv(&mut buffer)
            .map_err(|error| ConnectionError::from_io(error, ConnectionError::Receive))?;
        // A zero-length datagram is an ordinary empty message, not a close signal.
        buffer.truncate(received);
        Ok(buffer)
    }
}

/// Reads back the OS-assigned port after an auto-port bind and caches it on the endpoint.
fn cache_assigned_port(socket: &SocketHandle, endpoint: &mut Endpoint) -> std::io::Result<()> {
    if endpoint.port().is_some() {
        return Ok(());
    }
    if let Some(address) = socket.local_addr()? {
        tracing::debug!(port = address.port(), "ephemeral port assigned");
        endpoint.assign_port(address.port());
    }
    Ok(())
}
