//! Lazy connection management with automatic port rediscovery.
//!
//! Joplin picks the first free port from 41184 upwards, so a restart can move
//! the Web Clipper service. Every tool call goes through
//! [`ConnectionManager::ensure_connected`], which re-probes the current
//! address and falls back to a discovery scan before giving up.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::client::{JoplinClient, DEFAULT_PORT};
use super::error::ConnectionError;
use crate::config::ServerConfig;

pub const DEFAULT_DISCOVERY_ATTEMPTS: u16 = 10;
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(300);

/// Port window scanned when the configured address stops answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub start_port: u16,
    pub max_attempts: u16,
    pub timeout: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            start_port: DEFAULT_PORT,
            max_attempts: DEFAULT_DISCOVERY_ATTEMPTS,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

struct ConnectionState {
    client: JoplinClient,
    connected: bool,
}

/// Snapshot of the current target, for status reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub connected: bool,
}

pub struct ConnectionManager {
    token: String,
    discovery: DiscoverySettings,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_address(&config.host, config.port, &config.token, config.discovery)
    }

    pub fn with_address(host: &str, port: u16, token: &str, discovery: DiscoverySettings) -> Self {
        Self {
            token: token.to_string(),
            discovery,
            state: Mutex::new(ConnectionState {
                client: JoplinClient::new(host, port, token),
                connected: false,
            }),
        }
    }

    pub fn discovery(&self) -> DiscoverySettings {
        self.discovery
    }

    /// Return a client that answered the signature probe just now.
    ///
    /// The state lock is held for the whole probe/discovery sequence, so
    /// concurrent callers never scan twice.
    pub async fn ensure_connected(&self) -> Result<JoplinClient, ConnectionError> {
        let mut state = self.state.lock().await;

        if state.connected {
            if state.client.service_available().await {
                return Ok(state.client.clone());
            }
            warn!(
                host = state.client.host(),
                port = state.client.port(),
                "Lost connection to Joplin, rediscovering"
            );
            state.connected = false;
        } else if state.client.service_available().await {
            info!(
                host = state.client.host(),
                port = state.client.port(),
                "Connected to Joplin"
            );
            state.connected = true;
            return Ok(state.client.clone());
        }

        let host = state.client.host().to_string();
        let found = JoplinClient::discover_port(
            &host,
            self.discovery.start_port,
            self.discovery.max_attempts,
            self.discovery.timeout,
        )
        .await;

        if let Some(port) = found {
            let client = JoplinClient::new(&host, port, &self.token);
            if client.service_available().await {
                info!(host = %host, port, "Connected to Joplin on discovered port");
                state.client = client;
                state.connected = true;
                return Ok(state.client.clone());
            }
            warn!(host = %host, port, "Discovered port stopped answering");
        }

        Err(ConnectionError::Unavailable {
            host,
            port: state.client.port(),
        })
    }

    /// Point at a new address without probing it.
    pub async fn reconnect(&self, host: &str, port: u16) {
        let mut state = self.state.lock().await;
        state.client = JoplinClient::new(host, port, &self.token);
        state.connected = false;
        info!(host, port, "Joplin address changed");
    }

    /// Probe the current address once and record the outcome.
    pub async fn check(&self) -> bool {
        let mut state = self.state.lock().await;
        state.connected = state.client.service_available().await;
        state.connected
    }

    pub async fn connection_info(&self) -> ConnectionInfo {
        let state = self.state.lock().await;
        ConnectionInfo {
            host: state.client.host().to_string(),
            port: state.client.port(),
            connected: state.connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dead_port, MockJoplin};

    fn quick_discovery(start_port: u16, max_attempts: u16) -> DiscoverySettings {
        DiscoverySettings {
            start_port,
            max_attempts,
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_default_discovery_window() {
        let settings = DiscoverySettings::default();
        assert_eq!(settings.start_port, 41184);
        assert_eq!(settings.max_attempts, 10);
        assert_eq!(settings.timeout, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_connects_on_configured_port() {
        let mock = MockJoplin::start().await;
        let manager = ConnectionManager::with_address(
            "127.0.0.1",
            mock.port,
            MockJoplin::TOKEN,
            quick_discovery(dead_port(), 1),
        );

        let client = manager.ensure_connected().await.unwrap();
        assert_eq!(client.port(), mock.port);
        assert!(manager.connection_info().await.connected);
    }

    #[tokio::test]
    async fn test_rediscovers_moved_service() {
        let mock = MockJoplin::start().await;
        let manager = ConnectionManager::with_address(
            "127.0.0.1",
            dead_port(),
            MockJoplin::TOKEN,
            quick_discovery(mock.port, 1),
        );

        let client = manager.ensure_connected().await.unwrap();
        assert_eq!(client.port(), mock.port);

        let info = manager.connection_info().await;
        assert_eq!(info.port, mock.port);
        assert!(info.connected);
    }

    #[tokio::test]
    async fn test_unavailable_names_address() {
        let port = dead_port();
        let manager = ConnectionManager::with_address(
            "127.0.0.1",
            port,
            "t",
            quick_discovery(dead_port(), 1),
        );

        let err = manager.ensure_connected().await.unwrap_err();
        assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));
        assert!(!manager.connection_info().await.connected);
    }

    #[tokio::test]
    async fn test_connected_state_is_reprobed() {
        let mock = MockJoplin::start().await;
        let manager = ConnectionManager::with_address(
            "127.0.0.1",
            mock.port,
            MockJoplin::TOKEN,
            quick_discovery(dead_port(), 1),
        );
        manager.ensure_connected().await.unwrap();

        mock.set_ping_body("not joplin");
        assert!(manager.ensure_connected().await.is_err());
        assert!(!manager.connection_info().await.connected);
    }

    #[tokio::test]
    async fn test_reconnect_resets_state_without_probe() {
        let mock = MockJoplin::start().await;
        let manager = ConnectionManager::with_address(
            "127.0.0.1",
            mock.port,
            MockJoplin::TOKEN,
            DiscoverySettings::default(),
        );
        manager.ensure_connected().await.unwrap();
        let before = mock.requests().len();

        manager.reconnect("localhost", 5555).await;
        let info = manager.connection_info().await;
        assert_eq!(info.host, "localhost");
        assert_eq!(info.port, 5555);
        assert!(!info.connected);
        assert_eq!(mock.requests().len(), before);
    }
}
