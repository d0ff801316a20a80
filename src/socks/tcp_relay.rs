//! TCP relay for the CONNECT command
//!
//! Opens the outbound connection and then copies bytes bidirectionally
//! between the client and the target until either side closes, an error
//! occurs, or the server is stopped.

use crate::socks::consts::RELAY_BUFFER_SIZE;
use crate::socks::types::TargetAddr;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Client sent EOF
    ClientClosed,
    /// Target sent EOF
    TargetClosed,
    /// Server stop was observed at a poll tick
    Stopped,
}

/// Summary of a finished relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Bytes forwarded from client to target
    pub client_to_target: u64,
    /// Bytes forwarded from target to client
    pub target_to_client: u64,
    /// Termination reason
    pub end: RelayEnd,
}

/// Resolve `target` and open a TCP connection to it, bounded by `timeout`
pub async fn connect_target(target: &TargetAddr, timeout: Duration) -> io::Result<TcpStream> {
    let connect = async {
        let socket_addr = target.resolve().await?;
        debug!("Connecting to target: {}", socket_addr);
        TcpStream::connect(socket_addr).await
    };

    match tokio::time::timeout(timeout, connect).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("Connection timeout to {}", target),
        )),
    }
}

/// Relay data bidirectionally between `client` and `target`
///
/// Each direction has a single in-flight chunk of [`RELAY_BUFFER_SIZE`]
/// bytes; a write that blocks stalls the loop, which is the only form of
/// backpressure. `running` is checked every `poll_interval`. Any read or
/// write error ends the relay and is returned to the caller.
pub async fn relay_tcp<A, B>(
    client: A,
    target: B,
    running: &AtomicBool,
    poll_interval: Duration,
) -> io::Result<RelayOutcome>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let mut client_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut target_buf = vec![0u8; RELAY_BUFFER_SIZE];

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut client_to_target = 0u64;
    let mut target_to_client = 0u64;

    let end = loop {
        tokio::select! {
            result = client_read.read(&mut client_buf) => {
                let n = result?;
                if n == 0 {
                    break RelayEnd::ClientClosed;
                }
                target_write.write_all(&client_buf[..n]).await?;
                client_to_target += n as u64;
            }
            result = target_read.read(&mut target_buf) => {
                let n = result?;
                if n == 0 {
                    break RelayEnd::TargetClosed;
                }
                client_write.write_all(&target_buf[..n]).await?;
                target_to_client += n as u64;
            }
            _ = ticker.tick() => {
                if !running.load(Ordering::Acquire) {
                    break RelayEnd::Stopped;
                }
            }
        }
    };

    debug!(
        "Relay finished ({:?}): client->target {} bytes, target->client {} bytes",
        end, client_to_target, target_to_client
    );

    Ok(RelayOutcome {
        client_to_target,
        target_to_client,
        end,
    })
}
