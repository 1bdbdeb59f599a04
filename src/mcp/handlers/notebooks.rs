//! Notebook (folder) tools.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use super::{format_date, format_error, notebook_title, validate_id, IdKind, McpToolResult};
use crate::joplin::{Folder, FolderUpdate, JoplinClient, Note};
use crate::mcp::tools::{CreateFolderArgs, DeleteFolderArgs, EditFolderArgs, ReadNotebookArgs};

const EDIT_FOLDER_USAGE: &str =
    "Please provide folder edit options. Example: edit_folder {\"folder_id\": \"abc123\", \"title\": \"New Name\"}";
const DELETE_FOLDER_USAGE: &str =
    "Please provide folder deletion options. Example: delete_folder {\"folder_id\": \"abc123\", \"confirm\": true}";

fn folder_not_found(id: &str) -> McpToolResult {
    McpToolResult::error(format!(
        "Folder with ID \"{}\" not found.\n\nUse list_notebooks to see available folders and their IDs.",
        id
    ))
}

fn parent_not_found(id: &str) -> McpToolResult {
    McpToolResult::error(format!(
        "Error: Parent folder with ID \"{}\" not found.\n\nUse list_notebooks to see available folders and their IDs.",
        id
    ))
}

/// Human description of where a notebook lives.
async fn parent_location(client: &JoplinClient, parent_id: Option<&str>, with_id: bool) -> String {
    let parent_id = match parent_id {
        Some(id) => id,
        None => return "Top level".to_string(),
    };
    match notebook_title(client, parent_id).await {
        Some(title) if with_id => format!("Inside \"{}\" (notebook_id: \"{}\")", title, parent_id),
        Some(title) => format!("Inside \"{}\"", title),
        None => format!("Parent ID: {}", parent_id),
    }
}

// ============================================
// list_notebooks
// ============================================

/// Sibling order: case-insensitive, with a leading `[` sorting just before `a`.
fn compare_titles(a: &str, b: &str) -> Ordering {
    fn key(title: &str) -> String {
        let lower = title.to_lowercase();
        match lower.strip_prefix('[') {
            Some(rest) => format!("`{}", rest),
            None => lower,
        }
    }
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

fn render_tree(
    parent_id: &str,
    indent: usize,
    children: &HashMap<&str, Vec<&Folder>>,
    out: &mut String,
) {
    let Some(siblings) = children.get(parent_id) else {
        return;
    };
    let mut siblings = siblings.clone();
    siblings.sort_by(|a, b| compare_titles(&a.title, &b.title));

    for folder in siblings {
        out.push_str(&format!(
            "{}Notebook: \"{}\" (notebook_id: \"{}\")\n",
            " ".repeat(indent),
            folder.title,
            folder.id
        ));
        render_tree(&folder.id, indent + 2, children, out);
    }
}

pub async fn handle_list_notebooks(client: &JoplinClient) -> McpToolResult {
    let folders: Vec<Folder> = match client
        .get_all_items("/folders", &[("fields", "id,title,parent_id")])
        .await
    {
        Ok(folders) => folders,
        Err(e) => return format_error(&e, "listing notebooks"),
    };

    let mut children: HashMap<&str, Vec<&Folder>> = HashMap::new();
    for folder in &folders {
        children
            .entry(folder.parent_id.as_deref().unwrap_or(""))
            .or_default()
            .push(folder);
    }

    let mut out = String::from(
        "Joplin Notebooks:\n\
         NOTE: To read a notebook, use the notebook_id with the read_notebook command\n\
         Example: read_notebook notebook_id=\"your-notebook-id\"\n\n",
    );
    render_tree("", 0, &children, &mut out);
    McpToolResult::text(out)
}

// ============================================
// read_notebook
// ============================================

pub async fn handle_read_notebook(client: &JoplinClient, args: &ReadNotebookArgs) -> McpToolResult {
    let id = args.notebook_id.trim();
    if id.is_empty() {
        return McpToolResult::error(
            "Please provide a notebook ID. Example: read_notebook notebook_id=\"your-notebook-id\"",
        );
    }
    if let Some(msg) = validate_id(id, IdKind::Notebook) {
        return McpToolResult::error(msg);
    }

    let folder: Folder = match client
        .get(&format!("/folders/{}", id), &[("fields", "id,title,parent_id")])
        .await
    {
        Ok(folder) => folder,
        Err(e) if e.is_not_found() => {
            return McpToolResult::error(format!(
                "Notebook with ID \"{}\" not found.\n\nUse list_notebooks to see all available notebooks and their IDs.",
                id
            ))
        }
        Err(e) => return format_error(&e, "reading notebook"),
    };

    let mut notes: Vec<Note> = match client
        .get_all_items(
            &format!("/folders/{}/notes", id),
            &[("fields", "id,title,updated_time,is_todo,todo_completed")],
        )
        .await
    {
        Ok(notes) => notes,
        Err(e) => return format_error(&e, "reading notebook"),
    };

    let mut lines = vec![format!("# Notebook: \"{}\" (notebook_id: \"{}\")", folder.title, folder.id)];

    if notes.is_empty() {
        lines.push(String::new());
        lines.push("This notebook is empty.".to_string());
        lines.push(String::new());
        lines.push(format!(
            "Add a note with: create_note parent_id=\"{}\" title=\"...\" body=\"...\"",
            folder.id
        ));
        return McpToolResult::text(lines.join("\n"));
    }

    notes.sort_by(|a, b| b.updated_time.cmp(&a.updated_time));
    lines.push(format!("Contains {} notes:", notes.len()));
    lines.push(String::new());

    if notes.len() > 1 {
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        lines.push(format!(
            "NOTE: This notebook contains {} notes. You can read all of them at once with:",
            notes.len()
        ));
        lines.push(format!(
            "read_multinote note_ids={}",
            serde_json::to_string(&ids).unwrap_or_default()
        ));
        lines.push(String::new());
    }

    for note in &notes {
        let title = if note.title.is_empty() { "Untitled" } else { note.title.as_str() };
        if note.is_todo {
            let checkbox = if note.todo_completed { "[x]" } else { "[ ]" };
            lines.push(format!("- {} Todo: \"{}\" (note_id: \"{}\")", checkbox, title, note.id));
        } else {
            lines.push(format!("- Note: \"{}\" (note_id: \"{}\")", title, note.id));
        }
        lines.push(format!("  Updated: {}", format_date(note.updated_time)));
    }

    lines.push(String::new());
    lines.push("To read a note, use: read_note note_id=\"note-id\"".to_string());
    McpToolResult::text(lines.join("\n"))
}

// ============================================
// create_folder
// ============================================

pub async fn handle_create_folder(client: &JoplinClient, args: &CreateFolderArgs) -> McpToolResult {
    let title = args.title.trim();
    if title.is_empty() {
        return McpToolResult::error(
            "Please provide a title for the notebook. Example: create_folder title=\"My Notebook\"",
        );
    }

    let parent_id = args.parent_id.as_deref().filter(|p| !p.is_empty());
    if let Some(pid) = parent_id {
        if let Some(msg) = validate_id(pid, IdKind::Parent) {
            return McpToolResult::error(msg);
        }
    }

    let request = FolderUpdate {
        title: Some(title.to_string()),
        parent_id: parent_id.map(String::from),
    };
    let created: Folder = match client.post("/folders", &request, &[]).await {
        Ok(folder) => folder,
        Err(e) => {
            return match e.status() {
                Some(400) => McpToolResult::error(format!(
                    "Error creating notebook: Invalid request data.\n\nPlease check your input parameters. {}",
                    e.server_message()
                )),
                Some(404) if parent_id.is_some() => McpToolResult::error(format!(
                    "Error: Parent notebook with ID \"{}\" not found.\n\nUse list_notebooks to see available notebooks and their IDs.",
                    parent_id.unwrap_or_default()
                )),
                Some(409) => McpToolResult::error(format!(
                    "Error: A notebook with the title \"{}\" might already exist in this location.\n\nTry a different title or check existing notebooks with list_notebooks.",
                    title
                )),
                _ => format_error(&e, "creating notebook"),
            };
        }
    };

    let location = parent_location(client, created.parent_id.as_deref().or(parent_id), true).await;

    let mut lines = vec![
        "✅ Successfully created notebook!".to_string(),
        String::new(),
        "📁 Notebook Details:".to_string(),
        format!("   Title: \"{}\"", if created.title.is_empty() { title } else { created.title.as_str() }),
        format!("   Notebook ID: {}", created.id),
        format!("   Location: {}", location),
    ];
    if let Some(created_time) = created.created_time {
        lines.push(format!("   Created: {}", format_date(created_time)));
    }
    lines.push(String::new());
    lines.push("🔗 Next steps:".to_string());
    lines.push(format!(
        "   - Add a note: create_note parent_id=\"{}\" title=\"Note title\"",
        created.id
    ));
    lines.push(format!("   - View notebook: read_notebook notebook_id=\"{}\"", created.id));
    lines.push("   - View all notebooks: list_notebooks".to_string());

    McpToolResult::text(lines.join("\n"))
}

// ============================================
// edit_folder
// ============================================

pub async fn handle_edit_folder(client: &JoplinClient, args: &EditFolderArgs) -> McpToolResult {
    let id = args.folder_id.trim();
    if id.is_empty() {
        return McpToolResult::error(EDIT_FOLDER_USAGE);
    }
    if let Some(msg) = validate_id(id, IdKind::Folder) {
        return McpToolResult::error(msg);
    }
    if args.title.is_none() && args.parent_id.is_none() {
        return McpToolResult::error(
            "Please provide at least one field to update. Available fields: title, parent_id",
        );
    }
    if matches!(&args.title, Some(t) if t.trim().is_empty()) {
        return McpToolResult::error("Title must be a non-empty string.");
    }
    if let Some(pid) = args.parent_id.as_deref().filter(|p| !p.is_empty()) {
        if let Some(msg) = validate_id(pid, IdKind::Parent) {
            return McpToolResult::error(msg);
        }
        if pid == id {
            return McpToolResult::error("Error: A folder cannot be its own parent.");
        }
    }

    let path = format!("/folders/{}", id);
    let current: Folder = match client.get(&path, &[("fields", "id,title,parent_id")]).await {
        Ok(folder) => folder,
        Err(e) if e.is_not_found() => return folder_not_found(id),
        Err(e) => return format_error(&e, "updating folder"),
    };

    let update = FolderUpdate {
        title: args.title.as_deref().map(|t| t.trim().to_string()),
        parent_id: args.parent_id.clone(),
    };
    let response: Value = match client.put(&path, &update, &[]).await {
        Ok(value) => value,
        Err(e) => {
            return match e.status() {
                Some(404) => match args.parent_id.as_deref().filter(|p| !p.is_empty()) {
                    Some(pid) => parent_not_found(pid),
                    None => folder_not_found(id),
                },
                Some(400) => McpToolResult::error(format!(
                    "Error updating folder: Invalid request data.\n\nPlease check your input parameters. {}",
                    e.server_message()
                )),
                Some(409) => McpToolResult::error(format!(
                    "Error: A folder with the title \"{}\" might already exist in this location.\n\nTry a different title or check existing folders with list_notebooks.",
                    args.title.as_deref().unwrap_or(&current.title)
                )),
                _ => format_error(&e, "updating folder"),
            };
        }
    };

    let mut updated = current.clone();
    if let Some(title) = &update.title {
        updated.title = title.clone();
    }
    if let Some(pid) = &update.parent_id {
        updated.parent_id = Some(pid.clone()).filter(|p| !p.is_empty());
    }
    let updated_time = response
        .get("updated_time")
        .and_then(Value::as_i64)
        .filter(|t| *t != 0);

    let old_location = parent_location(client, current.parent_id.as_deref(), false).await;
    let new_location = if updated.parent_id == current.parent_id {
        old_location.clone()
    } else {
        parent_location(client, updated.parent_id.as_deref(), false).await
    };

    let mut lines = vec![
        "✅ Successfully updated notebook!".to_string(),
        String::new(),
        format!("📁 Notebook: \"{}\"", updated.title),
        format!("   Folder ID: {}", updated.id),
        String::new(),
        "🔄 Changes made:".to_string(),
    ];
    if args.title.is_some() && current.title != updated.title {
        lines.push(format!("   Title: \"{}\" → \"{}\"", current.title, updated.title));
    }
    if args.parent_id.is_some() && current.parent_id != updated.parent_id {
        lines.push(format!("   Location: {} → {}", old_location, new_location));
    }
    if let Some(t) = updated_time {
        lines.push(format!("   Last Updated: {}", format_date(t)));
    }

    lines.push(String::new());
    lines.push("🔗 Next steps:".to_string());
    lines.push(format!("   - View notebook: read_notebook notebook_id=\"{}\"", updated.id));
    lines.push("   - View all notebooks: list_notebooks".to_string());
    if let Some(pid) = &updated.parent_id {
        lines.push(format!("   - View parent notebook: read_notebook notebook_id=\"{}\"", pid));
    }

    McpToolResult::text(lines.join("\n"))
}

// ============================================
// delete_folder
// ============================================

pub async fn handle_delete_folder(client: &JoplinClient, args: &DeleteFolderArgs) -> McpToolResult {
    let id = args.folder_id.trim();
    if id.is_empty() {
        return McpToolResult::error(DELETE_FOLDER_USAGE);
    }
    if let Some(msg) = validate_id(id, IdKind::Folder) {
        return McpToolResult::error(msg);
    }
    if !args.confirm.unwrap_or(false) {
        return McpToolResult::text(format!(
            "⚠️  This will permanently delete the notebook/folder!\n\nTo confirm deletion, use:\ndelete_folder {{\"folder_id\": \"{}\", \"confirm\": true}}\n\n⚠️  This action cannot be undone!",
            id
        ));
    }

    let path = format!("/folders/{}", id);
    let folder: Folder = match client.get(&path, &[("fields", "id,title,parent_id")]).await {
        Ok(folder) => folder,
        Err(e) if e.is_not_found() => return folder_not_found(id),
        Err(e) => return format_error(&e, "deleting folder"),
    };

    let notes_path = format!("/folders/{}/notes", id);
    let (notes, all_folders) = tokio::join!(
        client.get_all_items::<Note>(&notes_path, &[("fields", "id,title")]),
        client.get_all_items::<Folder>("/folders", &[("fields", "id,title,parent_id")]),
    );
    let force = args.force.unwrap_or(false);
    let (notes, all_folders) = match (notes, all_folders) {
        (Ok(notes), Ok(folders)) => (notes, folders),
        (notes, folders) if force => {
            if let Err(e) = &notes {
                warn!(folder_id = id, error = %e, "Could not list notes of folder");
            }
            if let Err(e) = &folders {
                warn!(folder_id = id, error = %e, "Could not list subfolders");
            }
            (notes.unwrap_or_default(), folders.unwrap_or_default())
        }
        (Err(e), _) | (_, Err(e)) => {
            return McpToolResult::error(format!(
                "Error deleting folder: Could not verify that notebook \"{}\" is empty ({}).\n\nNothing was deleted. Retry, or use force to delete it together with its contents:\ndelete_folder {{\"folder_id\": \"{}\", \"confirm\": true, \"force\": true}}",
                folder.title, e, id
            ));
        }
    };
    let subfolders: Vec<Folder> = all_folders
        .into_iter()
        .filter(|f| f.parent_id.as_deref() == Some(id))
        .collect();

    let note_count = notes.len();
    let subfolder_count = subfolders.len();
    let total = note_count + subfolder_count;

    if total > 0 && !force {
        let mut lines = vec![
            "⚠️  Cannot delete non-empty notebook!".to_string(),
            String::new(),
            format!("📁 Notebook: \"{}\"", folder.title),
            format!("   Contains: {} notes and {} subfolders", note_count, subfolder_count),
        ];
        if note_count > 0 {
            lines.push(String::new());
            lines.push(format!("📝 Contains {} notes:", note_count));
            for note in notes.iter().take(5) {
                let title = if note.title.is_empty() { "Untitled" } else { note.title.as_str() };
                lines.push(format!("   - {}", title));
            }
            if note_count > 5 {
                lines.push(format!("   ... and {} more notes", note_count - 5));
            }
        }
        if subfolder_count > 0 {
            lines.push(String::new());
            lines.push(format!("📁 Contains {} subfolders:", subfolder_count));
            for sub in subfolders.iter().take(5) {
                lines.push(format!("   - {}", sub.title));
            }
            if subfolder_count > 5 {
                lines.push(format!("   ... and {} more folders", subfolder_count - 5));
            }
        }
        lines.push(String::new());
        lines.push("💡 Options:".to_string());
        lines.push("   1. Move or delete the contents first, then delete the folder".to_string());
        lines.push("   2. Force delete (⚠️  DESTROYS ALL CONTENT):".to_string());
        lines.push(format!(
            "      delete_folder {{\"folder_id\": \"{}\", \"confirm\": true, \"force\": true}}",
            id
        ));
        lines.push(String::new());
        lines.push(format!("⚠️  Force delete will permanently delete ALL {} items inside!", total));
        return McpToolResult::text(lines.join("\n"));
    }

    let location = parent_location(client, folder.parent_id.as_deref(), true).await;

    if let Err(e) = client.delete::<Value>(&path, &[]).await {
        return match e.status() {
            Some(404) => folder_not_found(id),
            Some(403) => McpToolResult::error(format!(
                "Permission denied: Cannot delete folder with ID \"{}\".\n\nThis might be a protected system folder.",
                id
            )),
            Some(409) => McpToolResult::error(
                "Cannot delete folder: It may contain items that prevent deletion.\n\nTry moving or deleting the contents first, or use force option.",
            ),
            _ => format_error(&e, "deleting folder"),
        };
    }

    let mut lines = vec![
        "🗑️  Successfully deleted notebook!".to_string(),
        String::new(),
        "📁 Deleted Notebook Details:".to_string(),
        format!("   Title: \"{}\"", folder.title),
        format!("   Folder ID: {}", folder.id),
        format!("   Location: {}", location),
    ];
    if total > 0 {
        lines.push(format!(
            "   Deleted Content: {} notes and {} subfolders",
            note_count, subfolder_count
        ));
        lines.push(String::new());
        lines.push(format!("⚠️  All {} items inside have been permanently deleted!", total));
    }
    lines.push(String::new());
    lines.push("⚠️  This notebook has been permanently deleted and cannot be recovered.".to_string());
    if let Some(pid) = &folder.parent_id {
        lines.push(String::new());
        lines.push("🔗 Related actions:".to_string());
        lines.push(format!("   - View parent notebook: read_notebook notebook_id=\"{}\"", pid));
        lines.push("   - View all notebooks: list_notebooks".to_string());
    }

    McpToolResult::text(lines.join("\n"))
}
