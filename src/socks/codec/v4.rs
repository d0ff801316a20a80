//! SOCKS4 / SOCKS4a frames
//!
//! ```text
//! +----+----+----+----+----+----+----+----+----+....+----+----+....+----+
//! | VN | CD | DSTPORT |      DSTIP        | USERID  |NULL| DOMAIN  |NULL|
//! +----+----+----+----+----+----+----+----+----+....+----+----+....+----+
//!   1    1      2              4           variable   1   (SOCKS4a only)
//! ```
//!
//! A `DSTIP` of `0.0.0.x` with `x != 0` marks a SOCKS4a request whose
//! destination is the domain name following the user id.

use super::{decode_domain, ensure_len};
use crate::error::CodecError;
use crate::socks::consts::*;
use crate::socks::types::{SocksCommand, TargetAddr};
use std::net::Ipv4Addr;

/// Decoded SOCKS4 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    /// Requested command; non-CONNECT commands still decode
    pub command: SocksCommand,
    /// Destination address
    pub target: TargetAddr,
    /// USERID field, unused by the server
    pub user_id: Vec<u8>,
}

/// Whether `ip` is the SOCKS4a sentinel `0.0.0.x` with `x != 0`
pub fn is_socks4a_sentinel(ip: Ipv4Addr) -> bool {
    let [a, b, c, d] = ip.octets();
    a == 0 && b == 0 && c == 0 && d != 0
}

/// Decode only the fixed header's version and command
///
/// Lets the caller reject a non-CONNECT command before the variable-length
/// fields are looked at.
pub fn decode_command(buf: &[u8]) -> Result<SocksCommand, CodecError> {
    ensure_len(buf, SOCKS4_HEADER_LEN)?;

    if buf[0] != SOCKS4_VERSION {
        return Err(CodecError::UnsupportedVersion(buf[0]));
    }

    Ok(SocksCommand::from_byte(buf[1]))
}

/// Decode a SOCKS4 or SOCKS4a request
///
/// For plain SOCKS4 anything after the USERID terminator is ignored. For
/// SOCKS4a the domain terminator must be the final byte of `buf`.
pub fn decode_request(buf: &[u8]) -> Result<Socks4Request, CodecError> {
    let command = decode_command(buf)?;
    let port = u16::from_be_bytes([buf[2], buf[3]]);
    let ip = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);

    let rest = &buf[SOCKS4_HEADER_LEN..];
    let user_end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MissingTerminator)?;
    let user_id = rest[..user_end].to_vec();

    let target = if is_socks4a_sentinel(ip) {
        let tail = &rest[user_end + 1..];
        let domain_end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::MissingTerminator)?;
        let trailing = tail.len() - domain_end - 1;
        if trailing != 0 {
            return Err(CodecError::TrailingBytes(trailing));
        }
        TargetAddr::Domain(decode_domain(&tail[..domain_end])?, port)
    } else {
        TargetAddr::ipv4(ip, port)
    };

    Ok(Socks4Request {
        command,
        target,
        user_id,
    })
}

/// Encode a SOCKS4 reply
///
/// ```text
/// +----+----+----+----+----+----+----+----+
/// | VN | CD | DSTPORT |      DSTIP        |
/// +----+----+----+----+----+----+----+----+
/// ```
///
/// The port and address fields are always zero.
pub fn encode_reply(status: u8) -> [u8; SOCKS4_REPLY_LEN] {
    let mut reply = [0u8; SOCKS4_REPLY_LEN];
    reply[0] = SOCKS4_REPLY_VERSION;
    reply[1] = status;
    reply
}
