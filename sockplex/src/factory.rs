//! Variant selection and construction.

use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::{Endpoint, ProtocolKind, Transport};

/// Creates the connection variant matching `transport` and the syntactic family of `address`.
///
/// An address containing a colon selects IPv6, anything else IPv4; malformed literals are caught
/// during resolution, not here. `address` may be empty for servers (bind to any local interface)
/// and `port` may be empty (or `"0"`) to have the OS assign an ephemeral port at bind time.
///
/// Resolution happens before the socket descriptor is created, so a failed call opens no
/// descriptor.
pub fn create(
    address: &str,
    port: &str,
    blocking: bool,
    transport: Transport,
) -> Result<Connection, ConnectionError> {
    let kind = ProtocolKind::infer(transport, address);
    let endpoint = Endpoint::parse(address, port)?;
    Connection::open(kind, endpoint, blocking)
}

/// Like [`create`], with the protocol requested as a string.
///
/// Accepts `"tcp"` and `"udp"` (case-insensitive); anything else fails with
/// [`ConnectionError::UnsupportedProtocol`] before any socket work begins.
pub fn create_from_str(
    address: &str,
    port: &str,
    blocking: bool,
    protocol: &str,
) -> Result<Connection, ConnectionError> {
    let transport: Transport = protocol.parse()?;
    create(address, port, blocking, transport)
}
