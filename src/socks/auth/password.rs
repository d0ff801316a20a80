//! Username/password verification
//!
//! Implements the credential check of RFC 1929. The comparison runs in
//! constant time over both fields so that neither the username nor the
//! password leaks through timing.

use crate::config::ServerConfig;
use crate::socks::codec::v5::AuthRequest;
use crate::socks::types::AuthResult;
use constant_time_eq::constant_time_eq;

/// Check the supplied credentials against the configured ones
///
/// Matching is exact and case-sensitive. Returns [`AuthResult::NotRequired`]
/// if the server has no credentials configured.
pub fn verify_credentials(request: &AuthRequest, config: &ServerConfig) -> AuthResult {
    let (Some(username), Some(password)) = (&config.username, &config.password) else {
        return AuthResult::NotRequired;
    };

    let username_ok = constant_time_eq(&request.username, username.as_bytes());
    let password_ok = constant_time_eq(&request.password, password.as_bytes());

    if username_ok & password_ok {
        AuthResult::Success
    } else {
        AuthResult::Failure
    }
}
