//! Endpoint parsing and address resolution.
//!
//! An [`Endpoint`] is a parsed-but-not-resolved (address, port) pair in which either side may be
//! unspecified: an empty address means bind-to-any for servers, an empty (or zero) port means an
//! OS-assigned ephemeral port is read back after bind. Resolution goes through one path for every
//! case, defaulting the missing parts before handing the pair to the OS resolver.

use std::fmt::{self, Display, Formatter};
use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};
use socket2::SockAddr;

use crate::ProtocolKind;

/// One side of a connection: an optional host and an optional port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Endpoint {
    /// Hostname or IP literal; `None` means any local interface.
    host: Option<String>,

    /// Port number; `None` means an ephemeral port assigned at bind time.
    port: Option<u16>,
}

/// Errors that can occur when parsing or resolving an endpoint.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// The port string is not a number in `0..=65535`.
    #[error("invalid port number")]
    InvalidPort(#[source] std::num::ParseIntError),

    /// The OS resolver rejected the host/port pair.
    #[error("address lookup failed")]
    Lookup(#[source] std::io::Error),

    /// The lookup succeeded but yielded no address of the requested family.
    #[error("no {0} address found for endpoint")]
    NoMatchingAddress(ProtocolKind),
}

impl Endpoint {
    /// Parses the two caller-supplied strings.
    ///
    /// An empty `address` stands for any local interface. An empty or `"0"` `port` requests an
    /// OS-assigned ephemeral port at bind time; any other non-numeric port fails here, before any
    /// socket work.
    pub fn parse(address: &str, port: &str) -> Result<Self, ResolveError> {
        let host = (!address.is_empty()).then(|| address.to_owned());
        let port = if port.is_empty() {
            None
        } else {
            match port.parse::<u16>().map_err(ResolveError::InvalidPort)? {
                0 => None,
                port => Some(port),
            }
        };
        Ok(Self { host, port })
    }

    /// The hostname or IP literal, if one was given.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The port, once known.
    ///
    /// `None` until an ephemeral port has been assigned by a successful bind.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Records the OS-assigned port after an auto-port bind. Happens at most once.
    pub(crate) fn assign_port(&mut self, port: u16) {
        debug_assert!(self.port.is_none());
        self.port = Some(port);
    }

    /// Resolves this endpoint to one socket address of `kind`'s family.
    ///
    /// A missing host defaults to the family wildcard and a missing port to 0, then the pair goes
    /// through the OS resolver like any concrete endpoint. Candidates of the wrong family are
    /// skipped, so a hostname with both A and AAAA records resolves consistently with the
    /// requested kind.
    pub(crate) fn resolve(&self, kind: ProtocolKind) -> Result<SockAddr, ResolveError> {
        let host = self.host.as_deref().unwrap_or_else(|| kind.wildcard_host());
        let port = self.port.unwrap_or(0);

        let mut candidates = (host, port)
            .to_socket_addrs()
            .map_err(ResolveError::Lookup)?;

        let address = candidates
            .find(|address| address.is_ipv6() == kind.is_ipv6())
            .ok_or(ResolveError::NoMatchingAddress(kind))?;

        tracing::trace!(%address, %kind, "resolved endpoint");
        Ok(SockAddr::from(address))
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(address: SocketAddr) -> Self {
        Self {
            host: Some(address.ip().to_string()),
            port: Some(address.port()),
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let host = self.host.as_deref().unwrap_or("*");
        if host.contains(':') {
            write!(f, "[{host}]")?;
        } else {
            write!(f, "{host}")?;
        }
        match self.port {
            Some(port) => write!(f, ":{port}"),
            None => write!(f, ":*"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::{Endpoint, ResolveError};
    use crate::ProtocolKind;

    #[test]
    fn empty_fields_parse_as_unspecified() {
        let endpoint = Endpoint::parse("", "").unwrap();
        assert_eq!(endpoint.host(), None);
        assert_eq!(endpoint.port(), None);
    }

    #[test]
    fn port_zero_requests_an_ephemeral_port() {
        let endpoint = Endpoint::parse("127.0.0.1", "0").unwrap();
        assert_eq!(endpoint.port(), None);
    }

    #[test]
    fn concrete_fields_parse_verbatim() {
        let endpoint = Endpoint::parse("::1", "8080").unwrap();
        assert_eq!(endpoint.host(), Some("::1"));
        assert_eq!(endpoint.port(), Some(8080));
    }

    #[test]
    fn malformed_ports_fail_before_resolution() {
        assert!(matches!(
            Endpoint::parse("127.0.0.1", "http"),
            Err(ResolveError::InvalidPort(_))
        ));
        assert!(matches!(
            Endpoint::parse("127.0.0.1", "65536"),
            Err(ResolveError::InvalidPort(_))
        ));
    }

    #[test]
    fn wildcard_endpoints_resolve_through_the_same_path() {
        let endpoint = Endpoint::parse("", "").unwrap();

        let v4 = endpoint.resolve(ProtocolKind::TcpV4).unwrap();
        assert_eq!(v4.as_socket().unwrap().to_string(), "0.0.0.0:0");

        let v6 = endpoint.resolve(ProtocolKind::UdpV6).unwrap();
        assert_eq!(v6.as_socket().unwrap().to_string(), "[::]:0");
    }

    #[test]
    fn resolution_filters_by_family() {
        let endpoint = Endpoint::parse("127.0.0.1", "4444").unwrap();
        assert!(endpoint.resolve(ProtocolKind::TcpV4).is_ok());
        assert!(matches!(
            endpoint.resolve(ProtocolKind::TcpV6),
            Err(ResolveError::NoMatchingAddress(ProtocolKind::TcpV6))
        ));
    }

    #[test]
    fn display_brackets_v6_and_stars_unspecified_parts() {
        assert_eq!(
            Endpoint::parse("::1", "8080").unwrap().to_string(),
            "[::1]:8080"
        );
        assert_eq!(
            Endpoint::parse("127.0.0.1", "").unwrap().to_string(),
            "127.0.0.1:*"
        );
        assert_eq!(Endpoint::parse("", "").unwrap().to_string(), "*:*");
    }
}
