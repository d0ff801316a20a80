//! SOCKS5 authentication module
//!
//! Handles method selection and the username/password sub-negotiation.

mod password;

pub use password::verify_credentials;

use super::codec::v5::{self, Greeting};
use super::consts::*;
use super::handler::{read_frame, reject, write_frame};
use super::types::AuthResult;
use crate::config::ServerConfig;
use crate::error::{Phase, SessionError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// Username/password authentication
    Password,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::None => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Password => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }
}

/// Select the authentication method for a greeting
///
/// With credentials configured only username/password is acceptable.
/// Without credentials the server accepts "no authentication".
pub fn select_auth_method(greeting: &Greeting, config: &ServerConfig) -> Option<AuthMethod> {
    if config.has_credentials() {
        greeting
            .offers(SOCKS5_AUTH_METHOD_PASSWORD)
            .then_some(AuthMethod::Password)
    } else {
        greeting
            .offers(SOCKS5_AUTH_METHOD_NONE)
            .then_some(AuthMethod::None)
    }
}

/// Answer the greeting and run the sub-negotiation if one is required
///
/// On rejection the protocol-defined reply has already been sent when this
/// returns an error.
pub async fn negotiate<S>(
    stream: &mut S,
    buf: &mut [u8],
    greeting: &Greeting,
    config: &ServerConfig,
) -> Result<AuthResult, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let method = match select_auth_method(greeting, config) {
        Some(method) => method,
        None => {
            let reply = v5::encode_method_selection(SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE);
            return Err(reject(stream, &reply, SessionError::NoAcceptableMethod).await);
        }
    };

    write_frame(stream, &v5::encode_method_selection(method.to_byte()), Phase::Greeting).await?;
    debug!("Sent auth method choice: {:?}", method);

    if method == AuthMethod::None {
        return Ok(AuthResult::NotRequired);
    }

    let n = read_frame(stream, buf, Phase::Authenticating).await?;
    let request = match v5::decode_auth_request(&buf[..n]) {
        Ok(request) => request,
        Err(e) => {
            let reply = v5::encode_auth_reply(SOCKS5_AUTH_FAILURE);
            let err = SessionError::protocol(Phase::Authenticating, e);
            return Err(reject(stream, &reply, err).await);
        }
    };

    match verify_credentials(&request, config) {
        AuthResult::Success => {
            let reply = v5::encode_auth_reply(SOCKS5_AUTH_SUCCESS);
            write_frame(stream, &reply, Phase::Authenticating).await?;
            info!("Authentication successful");
            Ok(AuthResult::Success)
        }
        _ => {
            let reply = v5::encode_auth_reply(SOCKS5_AUTH_FAILURE);
            Err(reject(stream, &reply, SessionError::AuthFailed).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn greeting(methods: &[u8]) -> Greeting {
        Greeting {
            methods: methods.to_vec(),
        }
    }

    fn with_credentials() -> ServerConfig {
        ServerConfig::default().with_credentials("user", "pass")
    }

    #[test]
    fn test_auth_method_to_byte() {
        assert_eq!(AuthMethod::None.to_byte(), SOCKS5_AUTH_METHOD_NONE);
        assert_eq!(AuthMethod::Password.to_byte(), SOCKS5_AUTH_METHOD_PASSWORD);
    }

    #[test]
    fn test_select_auth_method_with_credentials() {
        let config = with_credentials();
        assert_eq!(
            select_auth_method(&greeting(&[0x00, 0x02]), &config),
            Some(AuthMethod::Password)
        );
        assert_eq!(select_auth_method(&greeting(&[0x00]), &config), None);
        assert_eq!(select_auth_method(&greeting(&[]), &config), None);
    }

    #[test]
    fn test_select_auth_method_without_credentials() {
        let config = ServerConfig::default();
        assert_eq!(
            select_auth_method(&greeting(&[0x02, 0x00]), &config),
            Some(AuthMethod::None)
        );
        assert_eq!(select_auth_method(&greeting(&[0x02]), &config), None);
    }

    #[tokio::test]
    async fn test_negotiate_password_success() {
        let mut stream = Builder::new()
            .write(&[0x05, 0x02])
            .read(&[0x01, 0x04, b'u', b's', b'e', b'r', 0x04, b'p', b'a', b's', b's'])
            .write(&[0x01, 0x00])
            .build();
        let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

        let result =
            negotiate(&mut stream, &mut buf, &greeting(&[0x02]), &with_credentials()).await;
        assert_eq!(result.unwrap(), AuthResult::Success);
    }

    #[tokio::test]
    async fn test_negotiate_password_failure() {
        let mut stream = Builder::new()
            .write(&[0x05, 0x02])
            .read(&[0x01, 0x04, b'u', b's', b'e', b'r', 0x04, b'n', b'o', b'p', b'e'])
            .write(&[0x01, 0x01])
            .build();
        let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

        let result =
            negotiate(&mut stream, &mut buf, &greeting(&[0x02]), &with_credentials()).await;
        assert!(matches!(result, Err(SessionError::AuthFailed)));
    }

    #[tokio::test]
    async fn test_negotiate_no_acceptable_method() {
        let mut stream = Builder::new().write(&[0x05, 0xFF]).build();
        let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

        let result =
            negotiate(&mut stream, &mut buf, &greeting(&[0x00]), &with_credentials()).await;
        assert!(matches!(result, Err(SessionError::NoAcceptableMethod)));
    }

    #[tokio::test]
    async fn test_negotiate_no_auth_configured() {
        let mut stream = Builder::new().write(&[0x05, 0x00]).build();
        let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

        let result =
            negotiate(&mut stream, &mut buf, &greeting(&[0x00]), &ServerConfig::default()).await;
        assert_eq!(result.unwrap(), AuthResult::NotRequired);
    }

    #[tokio::test]
    async fn test_negotiate_malformed_auth_frame() {
        let mut stream = Builder::new()
            .write(&[0x05, 0x02])
            .read(&[0x05, 0x04, b'u'])
            .write(&[0x01, 0x01])
            .build();
        let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

        let result =
            negotiate(&mut stream, &mut buf, &greeting(&[0x02]), &with_credentials()).await;
        assert!(matches!(
            result,
            Err(SessionError::Protocol {
                phase: Phase::Authenticating,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_negotiate_peer_closed_before_auth() {
        let mut stream = Builder::new().write(&[0x05, 0x02]).build();
        let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];

        let result =
            negotiate(&mut stream, &mut buf, &greeting(&[0x02]), &with_credentials()).await;
        assert!(matches!(
            result,
            Err(SessionError::PeerClosed(Phase::Authenticating))
        ));
    }
}
