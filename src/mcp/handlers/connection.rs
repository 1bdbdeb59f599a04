//! The `connect` tool: report status, scan for Joplin, or switch address.
//!
//! Unlike every other tool this one runs without `ensure_connected`, so it
//! works precisely when the automatic path has failed.

use tracing::info;

use super::McpToolResult;
use crate::joplin::{ConnectionManager, JoplinClient};
use crate::mcp::tools::ConnectArgs;

fn connected(host: &str, port: u16) -> McpToolResult {
    McpToolResult::text(format!(
        "✅ Connected to Joplin\n\nHost: {}\nPort: {}\nStatus: Connected",
        host, port
    ))
}

pub async fn handle_connect(manager: &ConnectionManager, args: &ConnectArgs) -> McpToolResult {
    let current = manager.connection_info().await;
    let requested_host = args.host.as_deref().map(str::trim).filter(|h| !h.is_empty());

    if args.discover.unwrap_or(false) {
        let defaults = manager.discovery();
        let host = requested_host.unwrap_or(&current.host).to_string();
        let start_port = args.start_port.unwrap_or(defaults.start_port);
        let max_attempts = args.max_attempts.unwrap_or(defaults.max_attempts).max(1);

        info!(host = %host, start_port, max_attempts, "Discovery requested");
        let found = JoplinClient::discover_port(&host, start_port, max_attempts, defaults.timeout).await;

        return match found {
            Some(port) => {
                manager.reconnect(&host, port).await;
                if manager.check().await {
                    connected(&host, port)
                } else {
                    McpToolResult::error(format!(
                        "⚠️ Found Joplin on port {} but connection failed.\n\nPlease verify your API token is correct.",
                        port
                    ))
                }
            }
            None => {
                let last_port = start_port.saturating_add(max_attempts - 1);
                McpToolResult::error(format!(
                    "❌ Could not find Joplin\n\nScanned ports {}-{} on {}.\n\nPlease ensure:\n1. Joplin is running\n2. Web Clipper is enabled (Tools > Options > Web Clipper)\n3. The host is correct (WSL users may need the Windows IP)",
                    start_port, last_port, host
                ))
            }
        };
    }

    if requested_host.is_some() || args.port.is_some() {
        let host = requested_host.unwrap_or(&current.host).to_string();
        let port = args.port.unwrap_or(current.port);
        manager.reconnect(&host, port).await;
        if manager.check().await {
            return connected(&host, port);
        }
        return McpToolResult::error(format!(
            "❌ Connection failed\n\nCould not connect to Joplin at {}:{}.\n\nPlease ensure:\n1. Joplin is running\n2. Web Clipper is enabled\n3. The host and port are correct\n4. The API token is valid",
            host, port
        ));
    }

    if manager.check().await {
        return connected(&current.host, current.port);
    }
    McpToolResult::text(format!(
        "❌ Not connected\n\nCurrent settings:\nHost: {}\nPort: {}\nStatus: Disconnected\n\nTry:\n- connect with discover=true to scan for Joplin\n- connect with host/port to specify connection settings",
        current.host, current.port
    ))
}
