//! Note tools: search, read, create, edit, delete.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use super::{format_date, format_error, notebook_title, snippet, validate_id, IdKind, McpToolResult};
use crate::joplin::{Folder, JoplinClient, NewNote, Note, NoteUpdate, Paginated};
use crate::mcp::tools::{
    CreateNoteArgs, DeleteNoteArgs, EditNoteArgs, ReadMultiNoteArgs, ReadNoteArgs, SearchNotesArgs,
};

const NOTE_FIELDS: &str =
    "id,title,body,parent_id,created_time,updated_time,is_todo,todo_completed,todo_due";
const EDIT_NOTE_USAGE: &str =
    "Please provide note edit options. Example: edit_note {\"note_id\": \"abc123\", \"title\": \"Updated Title\"}";
const DELETE_NOTE_USAGE: &str =
    "Please provide note deletion options. Example: delete_note {\"note_id\": \"abc123\", \"confirm\": true}";

fn note_not_found(id: &str) -> McpToolResult {
    McpToolResult::error(format!(
        "Note with ID \"{}\" not found.\n\nUse search_notes to find notes and their IDs.",
        id
    ))
}

fn display_title(note: &Note) -> &str {
    if note.title.is_empty() {
        "Untitled"
    } else {
        note.title.as_str()
    }
}

fn todo_status(note: &Note) -> &'static str {
    if note.todo_completed {
        "Completed"
    } else {
        "Not completed"
    }
}

fn multinote_command(ids: &[&str]) -> String {
    format!("read_multinote note_ids={}", serde_json::to_string(ids).unwrap_or_default())
}

/// `"Title" (notebook_id: "…")`, or the bare ID when the lookup fails.
async fn notebook_label(client: &JoplinClient, parent_id: &str) -> String {
    match notebook_title(client, parent_id).await {
        Some(title) => format!("\"{}\" (notebook_id: \"{}\")", title, parent_id),
        None => format!("Notebook ID: {}", parent_id),
    }
}

// ============================================
// search_notes
// ============================================

pub async fn handle_search_notes(client: &JoplinClient, args: &SearchNotesArgs) -> McpToolResult {
    let query = args.query.trim();
    if query.is_empty() {
        return McpToolResult::error(
            "Please provide a search query. Example: search_notes query=\"your search term\"",
        );
    }

    let results: Paginated<Note> = match client
        .get(
            "/search",
            &[("query", query), ("fields", "id,title,body,parent_id,updated_time")],
        )
        .await
    {
        Ok(page) => page,
        Err(e) => return format_error(&e, "searching notes"),
    };

    if results.items.is_empty() {
        return McpToolResult::text(format!("No notes found matching query: \"{}\"", query));
    }

    let notebooks: HashMap<String, String> = match client
        .get_all_items::<Folder>("/folders", &[("fields", "id,title")])
        .await
    {
        Ok(folders) => folders.into_iter().map(|f| (f.id, f.title)).collect(),
        Err(e) => {
            warn!(error = %e, "Could not resolve notebook titles for search results");
            HashMap::new()
        }
    };

    let mut lines = vec![
        format!("Found {} notes matching query: \"{}\"", results.items.len(), query),
        "NOTE: To read a notebook, use the notebook_id with the read_notebook command".to_string(),
        "NOTE: To read a note, use the note_id with the read_note command".to_string(),
        String::new(),
    ];

    for note in &results.items {
        lines.push(format!("- Note: \"{}\" (note_id: \"{}\")", display_title(note), note.id));
        if let Some(pid) = &note.parent_id {
            let title = notebooks.get(pid).map(String::as_str).unwrap_or("Unknown notebook");
            lines.push(format!("  Notebook: \"{}\" (notebook_id: \"{}\")", title, pid));
        }
        if note.updated_time != 0 {
            lines.push(format!("  Updated: {}", format_date(note.updated_time)));
        }
        if let Some(body) = note.body.as_deref().filter(|b| !b.is_empty()) {
            lines.push(format!("  Snippet: {}", snippet(body)));
        }
        lines.push(String::new());
    }

    if results.items.len() > 1 {
        let ids: Vec<&str> = results.items.iter().map(|n| n.id.as_str()).collect();
        lines.push("TIP: To read all the notes above at once, use:".to_string());
        lines.push(multinote_command(&ids));
    }
    if results.has_more {
        lines.push(String::new());
        lines.push("NOTE: More results are available. Refine the query to narrow them down.".to_string());
    }

    McpToolResult::text(lines.join("\n"))
}

// ============================================
// read_note / read_multinote
// ============================================

fn push_note_details(lines: &mut Vec<String>, note: &Note, notebook: Option<&str>) {
    lines.push(format!("Note ID: {}", note.id));
    if let Some(label) = notebook {
        lines.push(format!("Notebook: {}", label));
    }
    if note.is_todo {
        lines.push(format!("Status: {}", todo_status(note)));
        if let Some(due) = note.todo_due {
            lines.push(format!("Due: {}", format_date(due)));
        }
    }
    lines.push(format!("Created: {}", format_date(note.created_time)));
    lines.push(format!("Updated: {}", format_date(note.updated_time)));
}

fn body_text(note: &Note) -> &str {
    match note.body.as_deref() {
        Some(body) if !body.is_empty() => body,
        _ => "(This note has no content)",
    }
}

pub async fn handle_read_note(client: &JoplinClient, args: &ReadNoteArgs) -> McpToolResult {
    let id = args.note_id.trim();
    if id.is_empty() {
        return McpToolResult::error("Please provide a note ID. Example: read_note note_id=\"your-note-id\"");
    }
    if let Some(msg) = validate_id(id, IdKind::Note) {
        return McpToolResult::error(msg);
    }

    let note: Note = match client.get(&format!("/notes/{}", id), &[("fields", NOTE_FIELDS)]).await {
        Ok(note) => note,
        Err(e) if e.is_not_found() => return note_not_found(id),
        Err(e) => return format_error(&e, "reading note"),
    };

    let notebook = match &note.parent_id {
        Some(pid) => Some(notebook_label(client, pid).await),
        None => None,
    };

    let mut lines = vec![format!("# Note: \"{}\"", display_title(&note))];
    push_note_details(&mut lines, &note, notebook.as_deref());
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(body_text(&note).to_string());
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push("Related commands:".to_string());
    if let Some(pid) = &note.parent_id {
        lines.push(format!("- View notebook: read_notebook notebook_id=\"{}\"", pid));
    }
    lines.push(format!("- Search for related notes: search_notes query=\"{}\"", note.title));
    lines.push(format!("- Edit this note: edit_note note_id=\"{}\"", note.id));

    McpToolResult::text(lines.join("\n"))
}

pub async fn handle_read_multinote(client: &JoplinClient, args: &ReadMultiNoteArgs) -> McpToolResult {
    if args.note_ids.is_empty() {
        return McpToolResult::error(
            "Please provide a list of note IDs. Example: read_multinote note_ids=[\"id1\", \"id2\"]",
        );
    }
    let invalid: Vec<&str> = args
        .note_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| validate_id(id, IdKind::Note).is_some())
        .collect();
    if !invalid.is_empty() {
        return McpToolResult::error(format!(
            "Error: Some IDs do not appear to be valid note IDs: {}\n\nNote IDs are long alphanumeric strings like \"58a0a29f68bc4141b49c99f5d367638a\".\n\nUse search_notes to find notes and their IDs.",
            invalid.join(", ")
        ));
    }

    let total = args.note_ids.len();
    let mut found = 0usize;
    let mut not_found: Vec<&str> = Vec::new();
    let mut failed: Vec<&str> = Vec::new();
    let mut lines = vec![format!("# Reading {} notes", total), String::new()];

    for (i, raw_id) in args.note_ids.iter().enumerate() {
        let id = raw_id.trim();
        let position = format!("{} of {}", i + 1, total);

        match client.get::<Note>(&format!("/notes/{}", id), &[("fields", NOTE_FIELDS)]).await {
            Ok(note) => {
                found += 1;
                let notebook = match &note.parent_id {
                    Some(pid) => Some(notebook_label(client, pid).await),
                    None => None,
                };
                lines.push(format!("### Note {}: \"{}\"", position, display_title(&note)));
                push_note_details(&mut lines, &note, notebook.as_deref());
                lines.push(String::new());
                lines.push("Content:".to_string());
                lines.push(body_text(&note).to_string());
            }
            Err(e) if e.is_not_found() => {
                not_found.push(id);
                lines.push(format!("Note {} (ID: {}): Not found", position, id));
            }
            Err(e) => {
                failed.push(id);
                lines.push(format!("Note {} (ID: {}): Error - {}", position, id, e));
            }
        }
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.push("# Summary".to_string());
    lines.push(format!("Total notes requested: {}", total));
    lines.push(format!("Successfully retrieved: {}", found));
    if !not_found.is_empty() {
        lines.push(format!("Notes not found: {}", not_found.len()));
        lines.push(format!("IDs not found: {}", not_found.join(", ")));
    }
    if !failed.is_empty() {
        lines.push(format!("Errors encountered: {}", failed.len()));
        lines.push(format!("IDs with errors: {}", failed.join(", ")));
    }

    McpToolResult::text(lines.join("\n"))
}

// ============================================
// create_note
// ============================================

pub async fn handle_create_note(client: &JoplinClient, args: &CreateNoteArgs) -> McpToolResult {
    let has_content = [&args.title, &args.body, &args.body_html]
        .iter()
        .any(|field| field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false));
    if !has_content {
        return McpToolResult::error(
            "Please provide at least a title, body, or body_html for the note. Example: create_note title=\"My Note\" body=\"Note content\"",
        );
    }

    let parent_id = args.parent_id.as_deref().filter(|p| !p.is_empty());
    if let Some(pid) = parent_id {
        if let Some(msg) = validate_id(pid, IdKind::Notebook) {
            return McpToolResult::error(msg);
        }
    }

    let request = NewNote {
        title: args.title.clone(),
        body: args.body.clone(),
        body_html: args.body_html.clone(),
        parent_id: parent_id.map(String::from),
        is_todo: args.is_todo,
        image_data_url: args.image_data_url.clone(),
    };

    let created: Note = match client.post("/notes", &request, &[]).await {
        Ok(note) => note,
        Err(e) => {
            return match e.status() {
                Some(400) => McpToolResult::error(format!(
                    "Error creating note: Invalid request data.\n\nPlease check your input parameters. {}",
                    e.server_message()
                )),
                Some(404) if parent_id.is_some() => McpToolResult::error(format!(
                    "Error: Notebook with ID \"{}\" not found.\n\nUse list_notebooks to see available notebooks and their IDs.",
                    parent_id.unwrap_or_default()
                )),
                _ => format_error(&e, "creating note"),
            };
        }
    };

    let location = match created.parent_id.as_deref().or(parent_id) {
        Some(pid) => notebook_label(client, pid).await,
        None => "Default notebook".to_string(),
    };
    let is_todo = created.is_todo || args.is_todo.unwrap_or(false);

    let mut lines = vec![
        "✅ Successfully created note!".to_string(),
        String::new(),
        "📝 Note Details:".to_string(),
        format!("   Title: \"{}\"", display_title(&created)),
        format!("   Note ID: {}", created.id),
        format!("   Location: {}", location),
        format!("   Type: {}", if is_todo { "Todo" } else { "Regular note" }),
    ];
    if created.created_time != 0 {
        lines.push(format!("   Created: {}", format_date(created.created_time)));
    }
    lines.push(String::new());
    lines.push("🔗 Next steps:".to_string());
    lines.push(format!("   - Read the note: read_note note_id=\"{}\"", created.id));
    lines.push(format!("   - Edit the note: edit_note note_id=\"{}\"", created.id));
    if let Some(pid) = created.parent_id.as_deref().or(parent_id) {
        lines.push(format!("   - View notebook: read_notebook notebook_id=\"{}\"", pid));
    }

    McpToolResult::text(lines.join("\n"))
}

// ============================================
// edit_note
// ============================================

pub async fn handle_edit_note(client: &JoplinClient, args: &EditNoteArgs) -> McpToolResult {
    let id = args.note_id.trim();
    if id.is_empty() {
        return McpToolResult::error(EDIT_NOTE_USAGE);
    }
    if let Some(msg) = validate_id(id, IdKind::Note) {
        return McpToolResult::error(msg);
    }

    let update = NoteUpdate {
        title: args.title.clone(),
        body: args.body.clone(),
        body_html: args.body_html.clone(),
        parent_id: args.parent_id.clone(),
        is_todo: args.is_todo,
        todo_completed: args.todo_completed,
        todo_due: args.todo_due.map(|due| due as i64),
    };
    if update.is_empty() {
        return McpToolResult::error(
            "Please provide at least one field to update. Available fields: title, body, body_html, parent_id, is_todo, todo_completed, todo_due",
        );
    }
    if let Some(pid) = update.parent_id.as_deref().filter(|p| !p.is_empty()) {
        if let Some(msg) = validate_id(pid, IdKind::Notebook) {
            return McpToolResult::error(msg);
        }
    }

    let path = format!("/notes/{}", id);
    let current: Note = match client.get(&path, &[("fields", NOTE_FIELDS)]).await {
        Ok(note) => note,
        Err(e) if e.is_not_found() => return note_not_found(id),
        Err(e) => return format_error(&e, "updating note"),
    };

    let response: Value = match client.put(&path, &update, &[]).await {
        Ok(value) => value,
        Err(e) => {
            return match e.status() {
                Some(404) => match update.parent_id.as_deref().filter(|p| !p.is_empty()) {
                    Some(pid) => McpToolResult::error(format!(
                        "Error: Notebook with ID \"{}\" not found.\n\nUse list_notebooks to see available notebooks and their IDs.",
                        pid
                    )),
                    None => note_not_found(id),
                },
                Some(400) => McpToolResult::error(format!(
                    "Error updating note: Invalid request data.\n\nPlease check your input parameters. {}",
                    e.server_message()
                )),
                _ => format_error(&e, "updating note"),
            };
        }
    };

    let mut updated = current.clone();
    update.apply_to(&mut updated);
    if let Some(t) = response.get("updated_time").and_then(Value::as_i64).filter(|t| *t != 0) {
        updated.updated_time = t;
    }

    let old_location = match &current.parent_id {
        Some(pid) => match notebook_title(client, pid).await {
            Some(title) => format!("\"{}\"", title),
            None => format!("Notebook ID: {}", pid),
        },
        None => "Root level".to_string(),
    };
    let new_location = match &updated.parent_id {
        Some(pid) if updated.parent_id != current.parent_id => match notebook_title(client, pid).await {
            Some(title) => format!("\"{}\"", title),
            None => format!("Notebook ID: {}", pid),
        },
        Some(_) => old_location.clone(),
        None => "Root level".to_string(),
    };

    let mut lines = vec![
        "✅ Successfully updated note!".to_string(),
        String::new(),
        format!("📝 Note: \"{}\"", display_title(&updated)),
        format!("   Note ID: {}", updated.id),
        String::new(),
        "🔄 Changes made:".to_string(),
    ];

    if args.title.is_some() && current.title != updated.title {
        lines.push(format!("   Title: \"{}\" → \"{}\"", current.title, updated.title));
    }
    if args.parent_id.is_some() && current.parent_id != updated.parent_id {
        lines.push(format!("   Location: {} → {}", old_location, new_location));
    }
    if args.is_todo.is_some() && current.is_todo != updated.is_todo {
        let kind = |todo: bool| if todo { "Todo" } else { "Regular note" };
        lines.push(format!("   Type: {} → {}", kind(current.is_todo), kind(updated.is_todo)));
    }
    if args.todo_completed.is_some() && current.todo_completed != updated.todo_completed {
        lines.push(format!("   Todo Status: {} → {}", todo_status(&current), todo_status(&updated)));
    }
    if args.todo_due.is_some() {
        let due = |d: Option<i64>| d.map(format_date).unwrap_or_else(|| "No due date".to_string());
        let (old_due, new_due) = (due(current.todo_due), due(updated.todo_due));
        if old_due != new_due {
            lines.push(format!("   Due Date: {} → {}", old_due, new_due));
        }
    }
    if args.body.is_some() {
        lines.push("   Content: Updated".to_string());
    }
    if args.body_html.is_some() {
        lines.push("   HTML Content: Updated".to_string());
    }
    lines.push(format!("   Last Updated: {}", format_date(updated.updated_time)));

    lines.push(String::new());
    lines.push("🔗 Next steps:".to_string());
    lines.push(format!("   - Read the note: read_note note_id=\"{}\"", updated.id));
    if let Some(pid) = &updated.parent_id {
        lines.push(format!("   - View notebook: read_notebook notebook_id=\"{}\"", pid));
    }

    McpToolResult::text(lines.join("\n"))
}

// ============================================
// delete_note
// ============================================

pub async fn handle_delete_note(client: &JoplinClient, args: &DeleteNoteArgs) -> McpToolResult {
    let id = args.note_id.trim();
    if id.is_empty() {
        return McpToolResult::error(DELETE_NOTE_USAGE);
    }
    if let Some(msg) = validate_id(id, IdKind::Note) {
        return McpToolResult::error(msg);
    }
    if !args.confirm.unwrap_or(false) {
        return McpToolResult::text(format!(
            "⚠️  This will permanently delete the note!\n\nTo confirm deletion, use:\ndelete_note {{\"note_id\": \"{}\", \"confirm\": true}}\n\n⚠️  This action cannot be undone!",
            id
        ));
    }

    let path = format!("/notes/{}", id);
    let note: Note = match client.get(&path, &[("fields", NOTE_FIELDS)]).await {
        Ok(note) => note,
        Err(e) if e.is_not_found() => return note_not_found(id),
        Err(e) => return format_error(&e, "deleting note"),
    };

    let location = match &note.parent_id {
        Some(pid) => notebook_label(client, pid).await,
        None => "Root level".to_string(),
    };

    if let Err(e) = client.delete::<Value>(&path, &[]).await {
        return match e.status() {
            Some(404) => note_not_found(id),
            Some(403) => McpToolResult::error(format!(
                "Permission denied: Cannot delete note with ID \"{}\".\n\nThis might be a protected system note.",
                id
            )),
            _ => format_error(&e, "deleting note"),
        };
    }

    let mut lines = vec![
        "🗑️  Successfully deleted note!".to_string(),
        String::new(),
        "📝 Deleted Note Details:".to_string(),
        format!("   Title: \"{}\"", display_title(&note)),
        format!("   Note ID: {}", note.id),
        format!("   Location: {}", location),
    ];
    if note.is_todo {
        lines.push(format!("   Type: Todo ({})", todo_status(&note)));
    } else {
        lines.push("   Type: Regular note".to_string());
    }
    lines.push(format!("   Created: {}", format_date(note.created_time)));
    lines.push(format!("   Last Updated: {}", format_date(note.updated_time)));
    if let Some(body) = note.body.as_deref().filter(|b| !b.is_empty()) {
        lines.push(format!("   Content Preview: {}", snippet(body)));
    }
    lines.push(String::new());
    lines.push("⚠️  This note has been permanently deleted and cannot be recovered.".to_string());
    if let Some(pid) = &note.parent_id {
        lines.push(String::new());
        lines.push("🔗 Related actions:".to_string());
        lines.push(format!("   - View containing notebook: read_notebook notebook_id=\"{}\"", pid));
        lines.push(format!("   - Search for similar notes: search_notes query=\"{}\"", note.title));
    }

    McpToolResult::text(lines.join("\n"))
}
