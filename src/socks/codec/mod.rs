//! SOCKS wire codec
//!
//! Pure parsing and serialization of SOCKS4/4a and SOCKS5 frames. Nothing in
//! this module performs I/O; every decoder takes a complete byte buffer and
//! returns either a typed frame or a [`CodecError`].

pub mod v4;
pub mod v5;

use crate::error::CodecError;

/// Fail with [`CodecError::Truncated`] unless `buf` holds at least `needed` bytes
fn ensure_len(buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

/// Decode a domain name, rejecting empty and non-UTF-8 names
fn decode_domain(bytes: &[u8]) -> Result<String, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::InvalidDomain);
    }
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidDomain)
}
