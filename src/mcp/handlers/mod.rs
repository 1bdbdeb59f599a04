//! MCP tool handler implementations.
//!
//! Each module implements a group of related tools:
//! - `notebooks`  -- list_notebooks, read_notebook, create_folder, edit_folder, delete_folder
//! - `notes`      -- search_notes, read_note, read_multinote, create_note, edit_note, delete_note
//! - `connection` -- connect (status, discovery, explicit host/port)
//!
//! Handlers take an already-connected `JoplinClient` and typed arguments and
//! return a formatted text report. They never return `Err`; every failure is
//! rendered into the result text.

pub mod connection;
pub mod notebooks;
pub mod notes;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::joplin::{ApiError, JoplinClient};

/// Result type returned by all MCP tool handlers.
///
/// Matches the MCP protocol's tool result format:
/// ```json
/// {
///   "content": [{ "type": "text", "text": "..." }],
///   "isError": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    pub content: Vec<McpContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// A single content item in an MCP tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum McpContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl McpToolResult {
    /// Create a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create an error text result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// All text items joined together.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                McpContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================
// Shared formatting helpers
// ============================================

/// What kind of ID a caller supplied, for validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Note,
    Notebook,
    /// A notebook addressed through the folder tools (`folder_id`).
    Folder,
    /// A notebook given as the new parent of something.
    Parent,
}

impl IdKind {
    fn label(self) -> &'static str {
        match self {
            IdKind::Note => "note",
            IdKind::Notebook => "notebook",
            IdKind::Folder => "folder",
            IdKind::Parent => "parent notebook",
        }
    }
}

/// Joplin IDs are 32 hex chars; anything shorter than 10 or without a hex
/// digit is certainly wrong. Returns the message to show when it is.
pub fn validate_id(id: &str, kind: IdKind) -> Option<String> {
    let plausible = id.chars().count() >= 10 && id.chars().any(|c| c.is_ascii_hexdigit());
    if plausible {
        return None;
    }

    let (example, hint) = match kind {
        IdKind::Note => (
            "Note IDs",
            "Use search_notes to find notes and their IDs.",
        ),
        _ => (
            "Notebook IDs",
            "Use list_notebooks to see all available notebooks and their IDs.",
        ),
    };
    Some(format!(
        "Error: \"{}\" does not appear to be a valid {} ID. \n\n{} are long alphanumeric strings like \"58a0a29f68bc4141b49c99f5d367638a\".\n\n{}",
        id,
        kind.label(),
        example,
        hint
    ))
}

/// Local time, `YYYY-MM-DD HH:MM:SS`.
pub fn format_date(epoch_ms: i64) -> String {
    match Local.timestamp_millis_opt(epoch_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "Unknown date".to_string(),
    }
}

/// First 100 characters of a body on one line, with `...` if cut.
pub fn snippet(body: &str) -> String {
    let mut preview: String = body.chars().take(100).collect::<String>().replace('\n', " ");
    if body.chars().count() > 100 {
        preview.push_str("...");
    }
    preview
}

/// Generic fallback: `Error {context}: {message}`.
pub fn format_error(err: &ApiError, context: &str) -> McpToolResult {
    McpToolResult::error(format!("Error {}: {}", context, err))
}

#[derive(Deserialize)]
struct Titled {
    #[serde(default)]
    title: String,
}

/// Best-effort notebook title lookup for report enrichment.
pub async fn notebook_title(client: &JoplinClient, id: &str) -> Option<String> {
    let path = format!("/folders/{}", id);
    match client.get::<Titled>(&path, &[("fields", "title")]).await {
        Ok(folder) if !folder.title.is_empty() => Some(folder.title),
        Ok(_) => None,
        Err(e) => {
            warn!(folder_id = id, error = %e, "Notebook title lookup failed");
            None
        }
    }
}
