//! Joplin MCP server library.
//!
//! - `config`   -- CLI / env / env-file settings
//! - `joplin`   -- Web Clipper REST client and connection management
//! - `mcp`      -- JSON-RPC server, tools, transports
//! - `services` -- logging

pub mod config;
pub mod joplin;
pub mod mcp;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
