//! SOCKS module for Socksrelay
//!
//! Implements the server side of SOCKS4, SOCKS4a and SOCKS5 for the CONNECT
//! command. The wire codec is pure and lives in [`codec`]; [`handler`] drives
//! a session over any async stream and [`tcp_relay`] moves the payload once
//! the tunnel is established.

pub mod auth;
pub mod codec;
mod consts;
pub mod handler;
pub mod tcp_relay;
mod types;

pub use auth::{negotiate, select_auth_method, verify_credentials, AuthMethod};
pub use consts::*;
pub use handler::{handle_client, handle_connection, SessionContext};
pub use tcp_relay::{connect_target, relay_tcp, RelayEnd, RelayOutcome};
pub use types::{AuthResult, SocksCommand, TargetAddr};
