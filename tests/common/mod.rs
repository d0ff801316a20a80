//! Test utilities for Socksrelay
//!
//! Real loopback sockets: an echo target, a server bound to port 0 and
//! helpers that build client frames.

#![allow(dead_code)]

use socksrelay::config::{ServerConfig, SocksVersion};
use socksrelay::Server;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Poll interval used by test servers so shutdown is observed quickly
pub const TEST_POLL_MS: u64 = 20;

/// Upper bound for anything a test waits on
pub const TEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// A loopback port with nothing listening on it
pub async fn closed_port() -> u16 {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr.port()
}

/// Spawn a target that echoes every connection back until EOF
pub async fn spawn_echo_target() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// A running server and the task driving its accept loop
pub struct TestServer {
    pub server: Server,
    pub addr: SocketAddr,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Stop the server and wait for the accept loop to return
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.server.stop();
        tokio::time::timeout(TEST_TIMEOUT, self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

/// Test configuration with a fast poll interval on an ephemeral port
pub fn test_config(version: SocksVersion) -> ServerConfig {
    ServerConfig {
        poll_interval_ms: TEST_POLL_MS,
        connect_timeout: 2,
        ..ServerConfig::new("127.0.0.1", 0, version)
    }
}

/// Bind a server and run its accept loop in the background
pub async fn spawn_server(config: ServerConfig) -> TestServer {
    let server = Server::new(config);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };
    TestServer {
        server,
        addr,
        handle,
    }
}

/// Read exactly `N` bytes, failing the test on timeout
pub async fn read_n<const N: usize>(stream: &mut TcpStream) -> [u8; N] {
    let mut buf = [0u8; N];
    tokio::time::timeout(TEST_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    buf
}

/// Assert the peer closes the connection without sending anything else
pub async fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(TEST_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("timed out waiting for close")
        .unwrap_or(0);
    assert_eq!(n, 0, "expected EOF, got {:02x?}", &buf[..n]);
}

/// Send a frame and flush it
pub async fn send(stream: &mut TcpStream, frame: &[u8]) {
    stream.write_all(frame).await.unwrap();
    stream.flush().await.unwrap();
}

/// SOCKS frame builders
pub mod frames {
    use socksrelay::socks::*;

    /// SOCKS5 greeting offering the given methods
    pub fn greeting(methods: &[u8]) -> Vec<u8> {
        let mut frame = vec![SOCKS5_VERSION, methods.len() as u8];
        frame.extend_from_slice(methods);
        frame
    }

    /// RFC 1929 username/password request
    pub fn auth(username: &str, password: &str) -> Vec<u8> {
        let mut frame = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        frame.extend_from_slice(username.as_bytes());
        frame.push(password.len() as u8);
        frame.extend_from_slice(password.as_bytes());
        frame
    }

    /// SOCKS5 CONNECT to an IPv4 address
    pub fn connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut frame = vec![
            SOCKS5_VERSION,
            SOCKS_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        frame.extend_from_slice(&ip);
        frame.extend_from_slice(&port.to_be_bytes());
        frame
    }

    /// SOCKS5 CONNECT to a domain
    pub fn connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut frame = vec![
            SOCKS5_VERSION,
            SOCKS_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        frame.extend_from_slice(domain.as_bytes());
        frame.extend_from_slice(&port.to_be_bytes());
        frame
    }

    /// SOCKS4 request for an IPv4 target
    pub fn socks4(command: u8, ip: [u8; 4], port: u16, user_id: &[u8]) -> Vec<u8> {
        let mut frame = vec![SOCKS4_VERSION, command];
        frame.extend_from_slice(&port.to_be_bytes());
        frame.extend_from_slice(&ip);
        frame.extend_from_slice(user_id);
        frame.push(0);
        frame
    }

    /// SOCKS4a request for a domain target
    pub fn socks4a(port: u16, user_id: &[u8], domain: &str) -> Vec<u8> {
        let mut frame = socks4(SOCKS_CMD_TCP_CONNECT, [0, 0, 0, 1], port, user_id);
        frame.extend_from_slice(domain.as_bytes());
        frame.push(0);
        frame
    }
}
