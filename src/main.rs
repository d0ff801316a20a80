//! Socksrelay - SOCKS4/4a and SOCKS5 proxy server
//!
//! This is the main entry point for the Socksrelay application.

use anyhow::{Context, Result};
use clap::Parser;
use socksrelay::config::{load_config, Config, SocksVersion};
use socksrelay::Server;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Socksrelay - SOCKS4/4a and SOCKS5 CONNECT proxy server
#[derive(Parser, Debug)]
#[command(name = "socksrelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SOCKS version to serve (4 or 5)
    #[arg(short = 's', long, value_parser = parse_socks_version)]
    socks_version: Option<SocksVersion>,

    /// Bind host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Username for SOCKS5 authentication
    #[arg(long)]
    username: Option<String>,

    /// Password for SOCKS5 authentication
    #[arg(long)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

fn parse_socks_version(s: &str) -> Result<SocksVersion, String> {
    let version: u8 = s
        .parse()
        .map_err(|_| format!("invalid SOCKS version: {}", s))?;
    SocksVersion::try_from(version)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    let config = build_config(&args)?;
    let server_config = &config.server;

    info!("Socksrelay v{}", socksrelay::VERSION);
    if let Some(path) = &args.config {
        info!("Configuration loaded from: {:?}", path);
    }
    info!("Serving {} on {}", server_config.version, server_config.bind_addr());
    if server_config.version == SocksVersion::V4 && server_config.has_credentials() {
        warn!("Credentials are ignored by SOCKS4");
    }
    if server_config.version == SocksVersion::V5 && !server_config.has_credentials() {
        warn!("No credentials configured, SOCKS5 clients are not authenticated");
    }

    let server = Server::new(config.server);

    // Handle Ctrl+C and termination signals (cross-platform)
    let signal_server = server.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_server.stop();
    });

    server.start().await
}

/// Layer the configuration: defaults, then file, then environment, then flags
fn build_config(args: &Args) -> Result<Config> {
    build_config_with(args, |key| std::env::var(key).ok())
}

/// [`build_config`] with the environment supplied by `lookup`
fn build_config_with<F>(args: &Args, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let server = &mut config.server;
    server
        .apply_env_from(lookup)
        .context("Invalid environment override")?;

    if let Some(version) = args.socks_version {
        server.version = version;
    }
    if let Some(host) = &args.host {
        server.host = host.clone();
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(username) = &args.username {
        server.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        server.password = Some(password.clone());
    }

    server.validate()?;
    Ok(config)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                }
            }
            Err(e) => {
                warn!("Failed to setup SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    Ok(())
}
