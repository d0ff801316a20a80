//! Per-connection session handler
//!
//! Drives one client connection through the handshake, request and connect
//! phases, then hands both sockets to the relay. Every early exit either
//! sends the protocol-defined rejection reply or closes silently; the client
//! stream is owned by the session and closed exactly once when it is dropped.

use super::auth;
use super::codec::{v4, v5};
use super::consts::*;
use super::tcp_relay::{connect_target, relay_tcp, RelayOutcome};
use super::types::SocksCommand;
use crate::config::{ServerConfig, SocksVersion};
use crate::error::{CodecError, Phase, SessionError};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Read-only state shared by all sessions of one server
#[derive(Debug, Clone)]
pub struct SessionContext {
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
}

impl SessionContext {
    /// Create a context from the server's configuration and running flag
    pub fn new(config: Arc<ServerConfig>, running: Arc<AtomicBool>) -> Self {
        Self { config, running }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Run a session to completion and log how it ended
///
/// This is the failure boundary of a session: nothing it does can reach the
/// acceptor or other sessions.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, ctx: SessionContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match handle_client(stream, &ctx).await {
        Ok(outcome) => info!(
            "Connection from {} closed ({:?}, {} bytes up, {} bytes down)",
            peer, outcome.end, outcome.client_to_target, outcome.target_to_client
        ),
        Err(e) if e.is_peer_closed() => {
            debug!("Client {} went away during {}: {}", peer, e.phase(), e)
        }
        Err(e) => warn!("Error handling client {} during {}: {}", peer, e.phase(), e),
    }
}

/// Handle the SOCKS protocol on a client stream
///
/// # Protocol Flow
///
/// 1. Greeting (SOCKS5) or combined greeting/request (SOCKS4)
/// 2. Username/password authentication (SOCKS5, if configured)
/// 3. Request parsing
/// 4. Target connect and reply
/// 5. Relay until either side closes or the server stops
pub async fn handle_client<S>(
    mut stream: S,
    ctx: &SessionContext,
) -> Result<RelayOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

    let target = match ctx.config.version {
        SocksVersion::V4 => handshake_socks4(&mut stream, &mut buf, ctx).await?,
        SocksVersion::V5 => handshake_socks5(&mut stream, &mut buf, ctx).await?,
    };

    relay_tcp(stream, target, &ctx.running, ctx.config.poll_interval())
        .await
        .map_err(|e| SessionError::io(Phase::Relaying, e))
}

/// SOCKS4/4a: one frame carries both the version check and the request
async fn handshake_socks4<S>(
    stream: &mut S,
    buf: &mut [u8],
    ctx: &SessionContext,
) -> Result<TcpStream, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let n = read_frame(stream, buf, Phase::Greeting).await?;
    debug!("Received SOCKS4 request: {:02x?}", &buf[..n]);

    // Malformed SOCKS4 frames have no defined reply; close silently
    let malformed = |e: CodecError| match e {
        CodecError::UnsupportedVersion(_) => SessionError::protocol(Phase::Greeting, e),
        e => SessionError::protocol(Phase::RequestParsing, e),
    };

    // The command is judged on the fixed header alone
    let command = v4::decode_command(&buf[..n]).map_err(malformed)?;
    if command != SocksCommand::Connect {
        let reply = v4::encode_reply(SOCKS4_REPLY_REJECTED);
        let err = SessionError::CommandNotSupported(command.to_byte());
        return Err(reject(stream, &reply, err).await);
    }

    let request = v4::decode_request(&buf[..n]).map_err(malformed)?;

    info!("SOCKS4 {} request to {}", request.command, request.target);

    let target = match connect_target(&request.target, ctx.config.connect_timeout()).await {
        Ok(target) => target,
        Err(source) => {
            let reply = v4::encode_reply(SOCKS4_REPLY_REJECTED);
            let err = SessionError::TargetUnreachable {
                target: request.target.to_string(),
                source,
            };
            return Err(reject(stream, &reply, err).await);
        }
    };

    write_frame(stream, &v4::encode_reply(SOCKS4_REPLY_GRANTED), Phase::Connecting).await?;
    info!("SOCKS4 tunnel established to {}", request.target);

    Ok(target)
}

/// SOCKS5: greeting, optional authentication, then the request
async fn handshake_socks5<S>(
    stream: &mut S,
    buf: &mut [u8],
    ctx: &SessionContext,
) -> Result<TcpStream, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let n = read_frame(stream, buf, Phase::Greeting).await?;
    debug!("Received client greeting: {:02x?}", &buf[..n]);

    let greeting =
        v5::decode_greeting(&buf[..n]).map_err(|e| SessionError::protocol(Phase::Greeting, e))?;

    let auth_result = auth::negotiate(stream, buf, &greeting, ctx.config()).await?;
    debug!("Authentication completed: {:?}", auth_result);

    let n = read_frame(stream, buf, Phase::RequestParsing).await?;

    // Command first, so `07` wins over `08` when both are wrong
    let command = v5::decode_command(&buf[..n])
        .map_err(|e| SessionError::protocol(Phase::RequestParsing, e))?;
    if command != SocksCommand::Connect {
        let reply = v5::encode_reply(SOCKS5_REPLY_COMMAND_NOT_SUPPORTED, None);
        let err = SessionError::CommandNotSupported(command.to_byte());
        return Err(reject(stream, &reply, err).await);
    }

    let request = match v5::decode_request(&buf[..n]) {
        Ok(request) => request,
        Err(e @ CodecError::UnsupportedAddressType(_)) => {
            let reply = v5::encode_reply(SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED, None);
            let err = SessionError::protocol(Phase::RequestParsing, e);
            return Err(reject(stream, &reply, err).await);
        }
        Err(e) => return Err(SessionError::protocol(Phase::RequestParsing, e)),
    };

    info!("SOCKS5 {} request to {}", request.command, request.target);

    let target = match connect_target(&request.target, ctx.config.connect_timeout()).await {
        Ok(target) => target,
        Err(source) => {
            let reply = v5::encode_reply(SOCKS5_REPLY_GENERAL_FAILURE, None);
            let err = SessionError::TargetUnreachable {
                target: request.target.to_string(),
                source,
            };
            return Err(reject(stream, &reply, err).await);
        }
    };

    // Echo the outbound socket's local address, not the requested one
    let bound = match target.local_addr() {
        Ok(SocketAddr::V4(addr)) => Some(addr),
        _ => None,
    };

    let reply = v5::encode_reply(SOCKS5_REPLY_SUCCEEDED, bound);
    write_frame(stream, &reply, Phase::Connecting).await?;
    info!("SOCKS5 tunnel established to {}", request.target);

    Ok(target)
}

/// Read one frame with a single read call; EOF is [`SessionError::PeerClosed`]
pub(crate) async fn read_frame<S>(
    stream: &mut S,
    buf: &mut [u8],
    phase: Phase,
) -> Result<usize, SessionError>
where
    S: AsyncRead + Unpin,
{
    let n = stream
        .read(buf)
        .await
        .map_err(|e| SessionError::io(phase, e))?;
    if n == 0 {
        return Err(SessionError::PeerClosed(phase));
    }
    Ok(n)
}

/// Write a complete frame and flush it
pub(crate) async fn write_frame<S>(
    stream: &mut S,
    frame: &[u8],
    phase: Phase,
) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    stream
        .write_all(frame)
        .await
        .map_err(|e| SessionError::io(phase, e))?;
    stream.flush().await.map_err(|e| SessionError::io(phase, e))
}

/// Send a rejection reply and hand back the error that caused it
///
/// A failure to deliver the reply is only logged; the original error is
/// what ends the session.
pub(crate) async fn reject<S>(stream: &mut S, reply: &[u8], err: SessionError) -> SessionError
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = write_frame(stream, reply, err.phase()).await {
        debug!("Failed to send rejection reply: {}", e);
    }
    err
}
