//! Error types for Socksrelay
//!
//! Two layers of errors exist: [`CodecError`] is produced by the pure wire
//! codec, while [`SessionError`] describes why a single client session ended
//! early. Neither ever crosses into the acceptor; they are logged at the
//! session boundary.

use std::fmt;
use std::io;
use thiserror::Error;

/// Wire-format decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Version byte does not match the expected protocol
    #[error("Unsupported version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Frame ended before a fixed-size field was complete
    #[error("Truncated frame: need {needed} bytes, got {got}")]
    Truncated {
        /// Bytes required to continue decoding
        needed: usize,
        /// Bytes actually available
        got: usize,
    },

    /// A null-terminated field has no terminator
    #[error("Missing null terminator")]
    MissingTerminator,

    /// Unexpected bytes after the final field of a frame
    #[error("Trailing bytes after frame: {0}")]
    TrailingBytes(usize),

    /// Address type byte is not IPv4 or domain
    #[error("Address type not supported: {0:#04x}")]
    UnsupportedAddressType(u8),

    /// Domain name is empty or not valid UTF-8
    #[error("Invalid domain name")]
    InvalidDomain,
}

/// Phase of a client session, used to give errors context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Version/method negotiation
    Greeting,
    /// SOCKS5 username/password sub-negotiation
    Authenticating,
    /// Decoding the CONNECT request
    RequestParsing,
    /// Opening the outbound connection
    Connecting,
    /// Forwarding payload bytes
    Relaying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Greeting => write!(f, "greeting"),
            Phase::Authenticating => write!(f, "authentication"),
            Phase::RequestParsing => write!(f, "request parsing"),
            Phase::Connecting => write!(f, "connecting"),
            Phase::Relaying => write!(f, "relaying"),
        }
    }
}

/// Reasons a client session terminated before or during the relay
#[derive(Error, Debug)]
pub enum SessionError {
    /// Malformed frame, wrong version or unsupported address type
    #[error("Protocol violation during {phase}: {source}")]
    Protocol {
        /// Phase in which the frame was rejected
        phase: Phase,
        /// Underlying decode failure
        #[source]
        source: CodecError,
    },

    /// Request command other than CONNECT
    #[error("Command not supported: {0:#04x}")]
    CommandNotSupported(u8),

    /// Client offered no method the server accepts
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Supplied credentials did not match
    #[error("Authentication failed")]
    AuthFailed,

    /// Outbound connection could not be opened
    #[error("Target {target} unreachable: {source}")]
    TargetUnreachable {
        /// Requested destination
        target: String,
        /// Connect, resolve or timeout failure
        #[source]
        source: io::Error,
    },

    /// Client closed its side before the phase completed
    #[error("Peer closed during {0}")]
    PeerClosed(Phase),

    /// Socket error on the client or target stream
    #[error("IO error during {phase}: {source}")]
    Io {
        /// Phase in which the error happened
        phase: Phase,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    /// Wrap a codec error with the phase it happened in
    pub fn protocol(phase: Phase, source: CodecError) -> Self {
        SessionError::Protocol { phase, source }
    }

    /// Wrap an IO error with the phase it happened in
    pub fn io(phase: Phase, source: io::Error) -> Self {
        SessionError::Io { phase, source }
    }

    /// The session phase this error belongs to
    pub fn phase(&self) -> Phase {
        match self {
            SessionError::Protocol { phase, .. } | SessionError::Io { phase, .. } => *phase,
            SessionError::CommandNotSupported(_) => Phase::RequestParsing,
            SessionError::NoAcceptableMethod | SessionError::AuthFailed => Phase::Authenticating,
            SessionError::TargetUnreachable { .. } => Phase::Connecting,
            SessionError::PeerClosed(phase) => *phase,
        }
    }

    /// Whether the session ended because the peer simply went away
    pub fn is_peer_closed(&self) -> bool {
        match self {
            SessionError::PeerClosed(_) => true,
            SessionError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
