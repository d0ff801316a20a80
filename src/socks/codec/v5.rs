//! SOCKS5 frames (RFC 1928, RFC 1929)

use super::{decode_domain, ensure_len};
use crate::error::CodecError;
use crate::socks::consts::*;
use crate::socks::types::{SocksCommand, TargetAddr};
use bytes::{BufMut, BytesMut};
use std::net::{Ipv4Addr, SocketAddrV4};

/// Client greeting listing the offered authentication methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Offered method bytes
    pub methods: Vec<u8>,
}

impl Greeting {
    /// Whether the client offered `method`
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

/// Username/password sub-negotiation request
#[derive(Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Raw username bytes
    pub username: Vec<u8>,
    /// Raw password bytes
    pub password: Vec<u8>,
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decoded SOCKS5 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Request {
    /// Requested command
    pub command: SocksCommand,
    /// Destination address
    pub target: TargetAddr,
}

/// Decode the client greeting
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
pub fn decode_greeting(buf: &[u8]) -> Result<Greeting, CodecError> {
    ensure_len(buf, 2)?;

    if buf[0] != SOCKS5_VERSION {
        return Err(CodecError::UnsupportedVersion(buf[0]));
    }

    let nmethods = buf[1] as usize;
    ensure_len(buf, 2 + nmethods)?;

    Ok(Greeting {
        methods: buf[2..2 + nmethods].to_vec(),
    })
}

/// Encode the server's method selection
pub fn encode_method_selection(method: u8) -> [u8; 2] {
    [SOCKS5_VERSION, method]
}

/// Decode the username/password request
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
pub fn decode_auth_request(buf: &[u8]) -> Result<AuthRequest, CodecError> {
    ensure_len(buf, 2)?;

    if buf[0] != SOCKS5_AUTH_VERSION {
        return Err(CodecError::UnsupportedVersion(buf[0]));
    }

    let ulen = buf[1] as usize;
    ensure_len(buf, 2 + ulen + 1)?;
    let username = buf[2..2 + ulen].to_vec();

    let plen = buf[2 + ulen] as usize;
    let pass_start = 3 + ulen;
    ensure_len(buf, pass_start + plen)?;
    let password = buf[pass_start..pass_start + plen].to_vec();

    Ok(AuthRequest { username, password })
}

/// Encode the sub-negotiation status reply
pub fn encode_auth_reply(status: u8) -> [u8; 2] {
    [SOCKS5_AUTH_VERSION, status]
}

/// Decode only the request's version and command
///
/// Lets the caller answer a non-CONNECT command with `07` before the
/// address type is looked at.
pub fn decode_command(buf: &[u8]) -> Result<SocksCommand, CodecError> {
    ensure_len(buf, 2)?;

    if buf[0] != SOCKS5_VERSION {
        return Err(CodecError::UnsupportedVersion(buf[0]));
    }

    Ok(SocksCommand::from_byte(buf[1]))
}

/// Decode a SOCKS5 request
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// IPv6 and unknown address types fail with
/// [`CodecError::UnsupportedAddressType`].
pub fn decode_request(buf: &[u8]) -> Result<Socks5Request, CodecError> {
    let command = decode_command(buf)?;
    ensure_len(buf, 4)?;

    let addr_type = buf[3];

    let target = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            ensure_len(buf, 10)?;
            let ip = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);
            let port = u16::from_be_bytes([buf[8], buf[9]]);
            TargetAddr::ipv4(ip, port)
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            ensure_len(buf, 5)?;
            let domain_len = buf[4] as usize;
            let domain_end = 5 + domain_len;
            ensure_len(buf, domain_end + 2)?;
            let domain = decode_domain(&buf[5..domain_end])?;
            let port = u16::from_be_bytes([buf[domain_end], buf[domain_end + 1]]);
            TargetAddr::Domain(domain, port)
        }
        other => return Err(CodecError::UnsupportedAddressType(other)),
    };

    Ok(Socks5Request { command, target })
}

/// Encode a SOCKS5 reply
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// `bound` defaults to `0.0.0.0:0` for failure replies.
pub fn encode_reply(reply_code: u8, bound: Option<SocketAddrV4>) -> BytesMut {
    let bound = bound.unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

    let mut reply = BytesMut::with_capacity(10);
    reply.put_u8(SOCKS5_VERSION);
    reply.put_u8(reply_code);
    reply.put_u8(SOCKS5_RESERVED);
    reply.put_u8(SOCKS5_ADDR_TYPE_IPV4);
    reply.put_slice(&bound.ip().octets());
    reply.put_u16(bound.port());
    reply
}
