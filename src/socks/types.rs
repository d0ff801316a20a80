//! SOCKS type definitions
//!
//! Defines the core types shared by the SOCKS4 and SOCKS5 handlers.

use super::consts::*;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// SOCKS command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (not supported)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay (not supported)
    UdpAssociate,
    /// Any other command byte
    Unknown(u8),
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SOCKS_CMD_TCP_CONNECT => SocksCommand::Connect,
            SOCKS_CMD_TCP_BIND => SocksCommand::Bind,
            SOCKS5_CMD_UDP_ASSOCIATE => SocksCommand::UdpAssociate,
            other => SocksCommand::Unknown(other),
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
            SocksCommand::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
            SocksCommand::Unknown(byte) => write!(f, "UNKNOWN({:#04x})", byte),
        }
    }
}

/// Target address of a CONNECT request
///
/// Only IPv4 literals and domain names are representable; IPv6 requests are
/// rejected by the codec before a `TargetAddr` is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IPv4 address with port
    Ip(SocketAddrV4),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddrV4::new(ip, port))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Resolve the address to an IPv4 socket address
    ///
    /// Domain names are looked up through the system resolver and the first
    /// IPv4 result is used.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        match self {
            TargetAddr::Ip(addr) => Ok(SocketAddr::V4(*addr)),
            TargetAddr::Domain(domain, port) => {
                tokio::net::lookup_host((domain.as_str(), *port))
                    .await?
                    .find(SocketAddr::is_ipv4)
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("No IPv4 address found for domain: {}", domain),
                        )
                    })
            }
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

/// Outcome of the authentication phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// No credentials configured, or protocol has no auth phase
    NotRequired,
    /// Credentials matched
    Success,
    /// Credentials did not match
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks_command_from_byte() {
        assert_eq!(SocksCommand::from_byte(1), SocksCommand::Connect);
        assert_eq!(SocksCommand::from_byte(2), SocksCommand::Bind);
        assert_eq!(SocksCommand::from_byte(3), SocksCommand::UdpAssociate);
        assert_eq!(SocksCommand::from_byte(9), SocksCommand::Unknown(9));
    }

    #[test]
    fn test_socks_command_to_byte() {
        assert_eq!(SocksCommand::Connect.to_byte(), 1);
        assert_eq!(SocksCommand::Bind.to_byte(), 2);
        assert_eq!(SocksCommand::Unknown(0x7F).to_byte(), 0x7F);
    }

    #[test]
    fn test_socks_command_display() {
        assert_eq!(SocksCommand::Connect.to_string(), "CONNECT");
        assert_eq!(SocksCommand::UdpAssociate.to_string(), "UDP ASSOCIATE");
        assert_eq!(SocksCommand::Unknown(0x10).to_string(), "UNKNOWN(0x10)");
    }

    #[test]
    fn test_target_addr_display() {
        let addr = TargetAddr::ipv4(Ipv4Addr::new(127, 0, 0, 1), 8080);
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
        assert_eq!(addr.port(), 8080);

        let addr = TargetAddr::domain("test.com", 443);
        assert_eq!(addr.to_string(), "test.com:443");
        assert_eq!(addr.port(), 443);
    }

    #[tokio::test]
    async fn test_target_addr_resolve_ip() {
        let addr = TargetAddr::ipv4(Ipv4Addr::new(10, 0, 0, 1), 1234);
        let resolved = addr.resolve().await.unwrap();
        assert_eq!(resolved, "10.0.0.1:1234".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_target_addr_resolve_localhost() {
        let addr = TargetAddr::domain("localhost", 80);
        let resolved = addr.resolve().await.unwrap();
        assert!(resolved.is_ipv4());
        assert_eq!(resolved.port(), 80);
    }

    #[tokio::test]
    async fn test_target_addr_resolve_invalid_domain() {
        let addr = TargetAddr::domain("this-domain-does-not-exist-12345.invalid", 80);
        assert!(addr.resolve().await.is_err());
    }
}
