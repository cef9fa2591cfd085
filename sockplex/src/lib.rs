//! One polymorphic connection interface over BSD-style sockets.
//!
//! TCP and UDP, IPv4 and IPv6, client and server roles, blocking and non-blocking modes behind a
//! single closed set of connection variants. Each [`Connection`] owns exactly one socket
//! descriptor for its whole lifetime; concurrency is the caller's concern (independent
//! connections on independent threads), and non-blocking mode trades suspension for a
//! distinguishable [`ConnectionError::WouldBlock`] result.
//!
//! # Example
//!
//! ```no_run
//! use sockplex::{Transport, create};
//!
//! # fn main() -> Result<(), sockplex::ConnectionError> {
//! // Server: wildcard address, OS-assigned port. Binding also starts listening.
//! let mut server = create("", "", true, Transport::Tcp)?;
//! server.bind()?;
//! let port = server.port().expect("assigned at bind");
//!
//! // Client against the assigned port.
//! let mut client = create("127.0.0.1", &port.to_string(), true, Transport::Tcp)?;
//! client.connect_to()?;
//! client.send(b"hello")?;
//!
//! // Each accepted peer is a new, independently owned connection.
//! let peer = server.accept_next()?;
//! let _message = peer.receive()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod address;
mod connection;
mod error;
mod factory;
mod protocol;
mod socket;

pub use address::{Endpoint, ResolveError};
pub use connection::{Connection, MAX_MESSAGE_LENGTH, TcpConnection, UdpConnection};
pub use error::ConnectionError;
pub use factory::{create, create_from_str};
pub use protocol::{ProtocolKind, Transport, UnsupportedProtocolError};
