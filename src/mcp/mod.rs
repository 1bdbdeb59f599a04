//! MCP (Model Context Protocol) server for Joplin.
//!
//! Exposes Joplin notebooks and notes as MCP tools over either line-delimited
//! stdio or HTTP.
//!
//! Architecture:
//! - `server.rs`    -- JSON-RPC protocol handler and tool routing
//! - `tools.rs`     -- Tool definitions, argument validation and decoding
//! - `handlers/`    -- Tool handler implementations (notebooks, notes, connection)
//! - `transport.rs` -- Stdio framing and the JSONL session log
//! - `http.rs`      -- axum router for the HTTP transport

pub mod handlers;
pub mod http;
pub mod server;
pub mod tools;
pub mod transport;
