//! Helper utilities for Socksrelay
//!
//! Socket setup shared by the server and the liveness probe.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Default listen backlog
pub const DEFAULT_BACKLOG: u32 = 128;

/// Bind a listening socket with address reuse enabled
///
/// The socket is put into non-blocking mode and registered with the current
/// tokio runtime, so this must be called from within one.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

/// Check whether something is already listening on `host:port`
///
/// Tries a transient bind of the address. Any bind failure, including
/// an unresolvable host, is reported as "listening" so callers never start a
/// second server on top of an existing one.
pub fn is_listening(host: &str, port: u16) -> bool {
    match std::net::TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            false
        }
        Err(e) => {
            tracing::debug!("Probe bind to {}:{} failed: {}", host, port, e);
            true
        }
    }
}
