//! Error taxonomy for connection construction and I/O.

use std::io;

use crate::address::ResolveError;
use crate::protocol::UnsupportedProtocolError;

/// Errors surfaced by connection construction and operations.
///
/// Every failure surfaces synchronously to the caller; nothing is retried or swallowed inside
/// the crate. [`ConnectionError::WouldBlock`] is not a failure but the distinguishable result of
/// a non-blocking operation that cannot complete immediately.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    /// The endpoint could not be resolved to a socket address.
    ///
    /// Raised before any socket descriptor is created.
    #[error("address resolution failed")]
    AddressResolution(#[from] ResolveError),

    /// The OS refused to create the socket descriptor.
    #[error("socket creation failed")]
    SocketCreation(#[source] io::Error),

    /// The OS bind or listen call failed.
    #[error("bind failed")]
    Bind(#[source] io::Error),

    /// `bind` was called on a connection that is already bound.
    #[error("connection is already bound")]
    AlreadyBound,

    /// The client connect call failed.
    #[error("connect failed")]
    Connect(#[source] io::Error),

    /// Accepting the next peer failed.
    #[error("accept failed")]
    Accept(#[source] io::Error),

    /// The OS send call failed.
    #[error("send failed")]
    Send(#[source] io::Error),

    /// The OS wrote fewer bytes than the payload length.
    ///
    /// Short writes are fatal, not resumed; the stream position is unknown afterwards.
    #[error("short write, sent {sent} of {expected} bytes")]
    ShortWrite {
        /// Bytes the OS actually wrote.
        sent: usize,
        /// Length of the payload.
        expected: usize,
    },

    /// The OS receive call failed.
    #[error("receive failed")]
    Receive(#[source] io::Error),

    /// The peer closed the connection in an orderly fashion (zero-length read, TCP only).
    #[error("connection closed by peer")]
    ClosedByPeer,

    /// The requested protocol is outside the supported set.
    #[error(transparent)]
    UnsupportedProtocol(#[from] UnsupportedProtocolError),

    /// Reserved extension point that has no effect yet.
    #[error("not implemented")]
    NotImplemented,

    /// A non-blocking operation could not complete immediately.
    ///
    /// The caller is responsible for polling or backing off; the crate provides no retry loop.
    #[error("operation would block")]
    WouldBlock,

    /// The operation is not valid for the connection's current role state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl ConnectionError {
    /// Classifies an I/O failure, routing `EAGAIN`/`EWOULDBLOCK` to
    /// [`ConnectionError::WouldBlock`] and everything else through `wrap`.
    pub(crate) fn from_io(error: io::Error, wrap: fn(io::Error) -> Self) -> Self {
        if error.kind() == io::ErrorKind::WouldBlock {
            Self::WouldBlock
        } else {
            wrap(error)
        }
    }

    /// Like [`ConnectionError::from_io`] for connect calls, where a non-blocking socket reports
    /// an in-flight handshake as `EINPROGRESS` (or `EALREADY` on a repeated call).
    pub(crate) fn from_connect_io(error: io::Error) -> Self {
        match error.raw_os_error() {
            Some(libc::EINPROGRESS) | Some(libc::EALREADY) => Self::WouldBlock,
            _ => Self::from_io(error, Self::Connect),
        }
    }
}
