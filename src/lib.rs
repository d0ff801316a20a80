//! # Socksrelay - SOCKS4/4a and SOCKS5 Proxy Server
//!
//! Socksrelay accepts SOCKS clients on a local address, negotiates the
//! handshake, opens the requested TCP connection and relays bytes between
//! client and target until either side closes.
//!
//! ## Features
//!
//! - **SOCKS4 and SOCKS4a**: IPv4 and domain-name targets
//! - **SOCKS5**: IPv4 and domain-name targets, optional username/password auth
//! - **CONNECT only**: BIND and UDP ASSOCIATE are rejected with the proper reply
//! - **Cooperative shutdown**: `stop()` ends the acceptor and all relays
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksrelay::config::{ServerConfig, SocksVersion};
//! use socksrelay::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 1080, SocksVersion::V5)
//!         .with_credentials("user", "pass");
//!     let server = Server::new(config);
//!
//!     let handle = server.clone();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.stop();
//!     });
//!
//!     server.start().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Client -> Server (accept) -> session task -> codec -> target connect -> relay
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, Config, ServerConfig, SocksVersion};
pub use error::{CodecError, Phase, SessionError};
pub use server::Server;

/// Version of the Socksrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
