//! Joplin MCP server binary.
//!
//! Serves the Joplin tools to MCP clients over one of two transports:
//! - **stdio** (default): line-delimited JSON-RPC 2.0, with a JSONL session
//!   transcript written next to the rolling logs
//! - **http**: `POST /mcp` plus `GET /health`
//!
//! Run `joplin-mcp --help` for the flags and their environment variables.

use std::sync::Arc;

use tracing::{error, info, warn};

use joplin_mcp_lib::config::{ServerConfig, TransportKind};
use joplin_mcp_lib::joplin::ConnectionManager;
use joplin_mcp_lib::mcp::http;
use joplin_mcp_lib::mcp::server::McpServer;
use joplin_mcp_lib::mcp::transport::{LoggingTransport, MessageLog, StdioTransport};
use joplin_mcp_lib::services::logger;

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[MCP] {}", e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr and the log dir; stdout is reserved for JSON-RPC.
    if let Err(e) = logger::init(&config.log_dir, &config.log_level) {
        eprintln!("[MCP] {}", e);
    }
    for notice in &config.notices {
        warn!("{}", notice);
    }

    info!(
        host = %config.host,
        port = config.port,
        transport = %config.transport,
        "Starting Joplin MCP server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let manager = Arc::new(ConnectionManager::new(&config));
    let server = Arc::new(McpServer::new(manager.clone()));

    let result = match config.transport {
        TransportKind::Stdio => {
            let stdio = StdioTransport::stdio();
            match MessageLog::create(&config.log_dir) {
                Ok(log) => {
                    info!("Session transcript: {}", log.path().display());
                    let mut transport = LoggingTransport::new(stdio, Arc::new(log));
                    server.run(&mut transport).await
                }
                Err(e) => {
                    warn!("Session transcript disabled: {}", e);
                    let mut transport = stdio;
                    server.run(&mut transport).await
                }
            }
        }
        TransportKind::Http => {
            if !manager.check().await {
                let joplin = manager.connection_info().await;
                warn!(
                    "Joplin is not reachable at {}:{}. Tools will retry on first use. Please ensure:\n\
                     1. Joplin is running\n\
                     2. Web Clipper is enabled (Tools > Options > Web Clipper)\n\
                     3. The host, port and token are correct",
                    joplin.host,
                    joplin.port
                );
            }
            http::serve(server, config.http_port, &config.http_endpoint).await
        }
    };

    if let Err(e) = result {
        error!("[MCP] Server error: {}", e);
        std::process::exit(1);
    }
}
