//! Server configuration types
//!
//! Defines the immutable settings a [`Server`](crate::server::Server) is
//! constructed from.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum length of a username or password on the wire (RFC 1929)
const MAX_CREDENTIAL_LEN: usize = 255;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1080
}

/// Default outbound connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

/// Default relay poll interval in milliseconds
fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_backlog() -> u32 {
    crate::helper::DEFAULT_BACKLOG
}

/// SOCKS protocol variant served by a listener
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum SocksVersion {
    /// SOCKS4 and SOCKS4a
    V4,
    /// SOCKS5
    #[default]
    V5,
}

impl TryFrom<u8> for SocksVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(SocksVersion::V4),
            5 => Ok(SocksVersion::V5),
            v => Err(format!("Unsupported SOCKS version: {} (expected 4 or 5)", v)),
        }
    }
}

impl From<SocksVersion> for u8 {
    fn from(version: SocksVersion) -> Self {
        match version {
            SocksVersion::V4 => 4,
            SocksVersion::V5 => 5,
        }
    }
}

impl fmt::Display for SocksVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SOCKS{}", u8::from(*self))
    }
}

/// SOCKS server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Protocol version served on this listener
    #[serde(default)]
    pub version: SocksVersion,

    /// Username for SOCKS5 auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for SOCKS5 auth
    #[serde(default)]
    pub password: Option<String>,

    /// Outbound connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Relay poll interval in milliseconds; bounds shutdown latency
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            version: SocksVersion::default(),
            username: None,
            password: None,
            connect_timeout: default_connect_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            backlog: default_backlog(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the given listener identity and defaults
    /// for everything else
    pub fn new(host: impl Into<String>, port: u16, version: SocksVersion) -> Self {
        Self {
            host: host.into(),
            port,
            version,
            ..Default::default()
        }
    }

    /// Set SOCKS5 credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Check if authentication credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Bind address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Outbound connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Relay poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Apply `SOCKS_HOST`, `SOCKS_PORT`, `SOCKS_USER` and `SOCKS_PASSWORD`
    /// from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SOCKS_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("SOCKS_PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid SOCKS_PORT: {:?}", port))?;
        }
        if let Some(username) = lookup("SOCKS_USER") {
            self.username = Some(username);
        }
        if let Some(password) = lookup("SOCKS_PASSWORD") {
            self.password = Some(password);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match (&self.username, &self.password) {
            (Some(_), None) => bail!("Username configured without a password"),
            (None, Some(_)) => bail!("Password configured without a username"),
            (Some(username), Some(password)) => {
                check_credential_len("Username", username)?;
                check_credential_len("Password", password)?;
            }
            (None, None) => {}
        }

        if self.connect_timeout == 0 {
            bail!("connect_timeout must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }

        Ok(())
    }
}

fn check_credential_len(name: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > MAX_CREDENTIAL_LEN {
        bail!(
            "{} must be between 1 and {} bytes, got {}",
            name,
            MAX_CREDENTIAL_LEN,
            value.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 1080);
        assert_eq!(config.version, SocksVersion::V5);
        assert!(!config.has_credentials());
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_socks_version_conversions() {
        assert_eq!(SocksVersion::try_from(4).unwrap(), SocksVersion::V4);
        assert_eq!(SocksVersion::try_from(5).unwrap(), SocksVersion::V5);
        assert!(SocksVersion::try_from(6).is_err());
        assert_eq!(u8::from(SocksVersion::V4), 4);
        assert_eq!(SocksVersion::V5.to_string(), "SOCKS5");
    }

    #[test]
    fn test_with_credentials() {
        let config = ServerConfig::new("0.0.0.0", 1081, SocksVersion::V5)
            .with_credentials("user", "password");
        assert!(config.has_credentials());
        assert_eq!(config.bind_addr(), "0.0.0.0:1081");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_partial_credentials() {
        let config = ServerConfig {
            username: Some("user".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            password: Some("pass".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_credential_length() {
        let config = ServerConfig::default().with_credentials("", "pass");
        assert!(config.validate().is_err());

        let config = ServerConfig::default().with_credentials("user", "p".repeat(256));
        assert!(config.validate().is_err());

        let config = ServerConfig::default().with_credentials("u".repeat(255), "p");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_intervals() {
        let config = ServerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            connect_timeout: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env_from() {
        let env: HashMap<&str, &str> = [
            ("SOCKS_HOST", "0.0.0.0"),
            ("SOCKS_PORT", "1090"),
            ("SOCKS_USER", "alice"),
            ("SOCKS_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 1090);
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_apply_env_from_invalid_port() {
        let mut config = ServerConfig::default();
        let result = config.apply_env_from(|key| {
            (key == "SOCKS_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
        assert_eq!(config.port, 1080);
    }

    #[test]
    fn test_apply_env_from_empty() {
        let mut config = ServerConfig::default();
        config.apply_env_from(|_| None).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.username.is_none());
    }
}
