//! Startup configuration.
//!
//! Values come from CLI flags, then environment variables (both resolved by
//! clap), then an optional `.env` file, then built-in defaults. The result is
//! one immutable [`ServerConfig`].

pub mod env_file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

pub use env_file::EnvFile;

use crate::joplin::client::{DEFAULT_HOST, DEFAULT_PORT};
use crate::joplin::connection::{DEFAULT_DISCOVERY_ATTEMPTS, DEFAULT_DISCOVERY_TIMEOUT};
use crate::joplin::DiscoverySettings;

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_HTTP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV_FILE: &str = ".env";

/// joplin-mcp command-line arguments
#[derive(Debug, Parser)]
#[command(name = "joplin-mcp")]
#[command(about = "MCP server exposing Joplin notebooks and notes as tools")]
#[command(version)]
pub struct Cli {
    /// Joplin Web Clipper host
    #[arg(long, env = "JOPLIN_HOST")]
    pub host: Option<String>,

    /// Joplin Web Clipper port (auto-discovered when unreachable)
    #[arg(long, env = "JOPLIN_PORT")]
    pub port: Option<u16>,

    /// Web Clipper API token (Joplin: Tools > Options > Web Clipper)
    #[arg(long, env = "JOPLIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Transport to serve MCP over
    #[arg(long, value_enum, env = "TRANSPORT_TYPE")]
    pub transport: Option<TransportKind>,

    /// Port for the HTTP transport
    #[arg(long, env = "HTTP_PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub http_port: Option<u16>,

    /// Path of the JSON-RPC endpoint for the HTTP transport
    #[arg(long, env = "HTTP_ENDPOINT")]
    pub http_endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling logs and session transcripts
    #[arg(long, env = "JOPLIN_MCP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Env file with KEY=VALUE settings (defaults to ./.env when present)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// First port scanned during discovery
    #[arg(long)]
    pub discovery_start_port: Option<u16>,

    /// Number of consecutive ports scanned during discovery
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub discovery_attempts: Option<u16>,

    /// Per-port probe timeout during discovery, in milliseconds
    #[arg(long)]
    pub discovery_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s.trim(), true)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub transport: TransportKind,
    pub http_port: u16,
    pub http_endpoint: String,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub discovery: DiscoverySettings,
    /// Non-fatal remarks gathered before logging is up.
    pub notices: Vec<String>,
}

impl ServerConfig {
    /// Parse the process arguments and environment.
    pub fn load() -> Result<Self, String> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self, String> {
        let mut notices = Vec::new();

        let env_file = match cli.env_file.as_deref() {
            Some(path) => match EnvFile::load(path) {
                Ok(file) => file,
                Err(e) => {
                    notices.push(format!("Env file {} not loaded: {}", path.display(), e));
                    EnvFile::default()
                }
            },
            None => {
                let path = Path::new(DEFAULT_ENV_FILE);
                if path.is_file() {
                    EnvFile::load(path).unwrap_or_else(|e| {
                        notices.push(format!("Env file {} not loaded: {}", path.display(), e));
                        EnvFile::default()
                    })
                } else {
                    EnvFile::default()
                }
            }
        };

        for line in env_file.rejected() {
            notices.push(format!("Env file line skipped: {}", line));
        }

        let mut config = Self::resolve(cli, &env_file)?;
        config.notices.extend(notices);
        Ok(config)
    }

    /// Merge already-parsed flags/env with the env file and defaults.
    pub fn resolve(cli: Cli, env_file: &EnvFile) -> Result<Self, String> {
        let token = pick(cli.token, env_file, "JOPLIN_TOKEN")?
            .map(|t: String| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                "JOPLIN_TOKEN is required. Find your token in Joplin under \
                 Tools > Options > Web Clipper, then pass --token or set JOPLIN_TOKEN."
                    .to_string()
            })?;

        let host = pick(cli.host, env_file, "JOPLIN_HOST")?
            .map(|h: String| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = pick(cli.port, env_file, "JOPLIN_PORT")?.unwrap_or(DEFAULT_PORT);

        let transport = pick(cli.transport, env_file, "TRANSPORT_TYPE")?.unwrap_or_default();

        let http_port = pick(cli.http_port, env_file, "HTTP_PORT")?.unwrap_or(DEFAULT_HTTP_PORT);
        if http_port == 0 {
            return Err("HTTP_PORT must be between 1 and 65535".to_string());
        }

        let http_endpoint = pick(cli.http_endpoint, env_file, "HTTP_ENDPOINT")?
            .map(|e: String| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .map(|e| if e.starts_with('/') { e } else { format!("/{}", e) })
            .unwrap_or_else(|| DEFAULT_HTTP_ENDPOINT.to_string());

        let log_level = pick(cli.log_level, env_file, "LOG_LEVEL")?
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let log_dir = pick(cli.log_dir, env_file, "JOPLIN_MCP_LOG_DIR")?.unwrap_or_else(default_log_dir);

        let discovery = DiscoverySettings {
            start_port: cli.discovery_start_port.unwrap_or(DEFAULT_PORT),
            max_attempts: cli.discovery_attempts.unwrap_or(DEFAULT_DISCOVERY_ATTEMPTS).max(1),
            timeout: cli
                .discovery_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT),
        };

        Ok(Self {
            host,
            port,
            token,
            transport,
            http_port,
            http_endpoint,
            log_level,
            log_dir,
            discovery,
            notices: Vec::new(),
        })
    }
}

/// CLI/env value if present, otherwise the env-file entry parsed as `T`.
fn pick<T: FromStr>(value: Option<T>, env_file: &EnvFile, key: &str) -> Result<Option<T>, String> {
    if value.is_some() {
        return Ok(value);
    }
    match env_file.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid value for {} in env file: '{}'", key, raw)),
        None => Ok(None),
    }
}

/// Default log directory (platform local data dir).
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("joplin-mcp")
        .join("logs")
}
