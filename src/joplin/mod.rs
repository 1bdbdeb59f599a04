//! Joplin Web Clipper API access.
//!
//! - `client.rs`     -- authenticated REST calls, pagination, port discovery
//! - `connection.rs` -- lazy connect / rediscovery shared by all tool calls
//! - `types.rs`      -- typed folder and note payloads
//! - `error.rs`      -- API and connectivity errors

pub mod client;
pub mod connection;
pub mod error;
pub mod types;

pub use client::JoplinClient;
pub use connection::{ConnectionInfo, ConnectionManager, DiscoverySettings};
pub use error::{ApiError, ConnectionError};
pub use types::{Folder, FolderUpdate, NewNote, Note, NoteUpdate, Paginated};
