//! Protocol selection: the caller-facing transport request and the closed set of concrete
//! connection kinds.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Type};

/// Caller-facing protocol request, before the address family is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Transport {
    /// Connection-oriented byte stream.
    Tcp,

    /// Connectionless datagrams.
    Udp,
}

/// Error for protocol requests outside the supported set.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported protocol {0:?}, expected \"tcp\" or \"udp\"")]
pub struct UnsupportedProtocolError(String);

impl FromStr for Transport {
    type Err = UnsupportedProtocolError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(UnsupportedProtocolError(string.to_owned())),
        }
    }
}

/// The four concrete connection kinds.
///
/// The set is closed; every dispatch over it is an exhaustive match, so a new kind is a
/// compile-time event for all call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ProtocolKind {
    /// TCP over IPv4.
    TcpV4,

    /// TCP over IPv6.
    TcpV6,

    /// UDP over IPv4.
    UdpV4,

    /// UDP over IPv6.
    UdpV6,
}

impl ProtocolKind {
    /// Selects the concrete kind for a transport request and an address literal.
    ///
    /// A colon anywhere in the address means IPv6. This is a syntactic hint, not validation;
    /// malformed literals are rejected later, during resolution.
    pub fn infer(transport: Transport, address: &str) -> Self {
        let v6 = address.contains(':');
        match (transport, v6) {
            (Transport::Tcp, false) => Self::TcpV4,
            (Transport::Tcp, true) => Self::TcpV6,
            (Transport::Udp, false) => Self::UdpV4,
            (Transport::Udp, true) => Self::UdpV6,
        }
    }

    /// Returns whether this kind is connection-oriented.
    pub fn is_tcp(self) -> bool {
        matches!(self, Self::TcpV4 | Self::TcpV6)
    }

    /// Returns whether this kind uses the IPv6 address family.
    pub fn is_ipv6(self) -> bool {
        matches!(self, Self::TcpV6 | Self::UdpV6)
    }

    pub(crate) fn domain(self) -> Domain {
        if self.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        }
    }

    pub(crate) fn socket_type(self) -> Type {
        if self.is_tcp() {
            Type::STREAM
        } else {
            Type::DGRAM
        }
    }

    pub(crate) fn protocol(self) -> Protocol {
        if self.is_tcp() {
            Protocol::TCP
        } else {
            Protocol::UDP
        }
    }

    /// The bind-to-any literal for this kind's family.
    pub(crate) fn wildcard_host(self) -> &'static str {
        if self.is_ipv6() { "::" } else { "0.0.0.0" }
    }
}

impl Display for ProtocolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TcpV4 => "TCP/IPv4",
            Self::TcpV6 => "TCP/IPv6",
            Self::UdpV4 => "UDP/IPv4",
            Self::UdpV6 => "UDP/IPv6",
        };
        f.write_str(name)
    }
}
