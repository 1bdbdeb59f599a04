//! Tool registry: names, descriptions, input schemas, and argument decoding.
//!
//! `tools/call` arguments are checked against the tool's JSON Schema before
//! they are decoded into a typed [`ToolCall`], so handlers never see
//! malformed input.

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

// ============================================
// Typed arguments
// ============================================
//
// Input schemas are derived from these structs. Non-`Option` fields are
// required; doc comments become the property descriptions.

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListNotebooksArgs {}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchNotesArgs {
    /// Search query for notes
    pub query: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ReadNotebookArgs {
    /// ID of the notebook to read
    pub notebook_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ReadNoteArgs {
    /// ID of the note to read
    pub note_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ReadMultiNoteArgs {
    /// Array of note IDs to read
    pub note_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CreateNoteArgs {
    /// Note title
    pub title: Option<String>,
    /// Note content in Markdown
    pub body: Option<String>,
    /// Note content in HTML
    pub body_html: Option<String>,
    /// ID of parent notebook
    pub parent_id: Option<String>,
    /// Whether this is a todo note
    pub is_todo: Option<bool>,
    /// Base64 encoded image data URL
    pub image_data_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CreateFolderArgs {
    /// Notebook title
    pub title: String,
    /// ID of parent notebook
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EditNoteArgs {
    /// ID of the note to edit
    pub note_id: String,
    /// New note title
    pub title: Option<String>,
    /// New note content in Markdown
    pub body: Option<String>,
    /// New note content in HTML
    pub body_html: Option<String>,
    /// New parent notebook ID
    pub parent_id: Option<String>,
    /// Whether this is a todo note
    pub is_todo: Option<bool>,
    /// Whether todo is completed
    pub todo_completed: Option<bool>,
    /// Todo due date (Unix timestamp in milliseconds, 0 clears it)
    pub todo_due: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EditFolderArgs {
    /// ID of the folder to edit
    pub folder_id: String,
    /// New folder title
    pub title: Option<String>,
    /// New parent folder ID
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DeleteNoteArgs {
    /// ID of the note to delete
    pub note_id: String,
    /// Confirmation flag
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DeleteFolderArgs {
    /// ID of the folder to delete
    pub folder_id: String,
    /// Confirmation flag
    pub confirm: Option<bool>,
    /// Force delete even if folder has contents
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ConnectArgs {
    /// Joplin host (defaults to the current host)
    pub host: Option<String>,
    /// Joplin Web Clipper port
    pub port: Option<u16>,
    /// Scan a port range for Joplin
    pub discover: Option<bool>,
    /// First port to scan (default 41184)
    pub start_port: Option<u16>,
    /// Number of ports to scan (default 10)
    pub max_attempts: Option<u16>,
}

/// A decoded `tools/call` request.
#[derive(Debug, Clone)]
pub enum ToolCall {
    ListNotebooks,
    SearchNotes(SearchNotesArgs),
    ReadNotebook(ReadNotebookArgs),
    ReadNote(ReadNoteArgs),
    ReadMultiNote(ReadMultiNoteArgs),
    CreateNote(CreateNoteArgs),
    CreateFolder(CreateFolderArgs),
    EditNote(EditNoteArgs),
    EditFolder(EditFolderArgs),
    DeleteNote(DeleteNoteArgs),
    DeleteFolder(DeleteFolderArgs),
    Connect(ConnectArgs),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListNotebooks => "list_notebooks",
            ToolCall::SearchNotes(_) => "search_notes",
            ToolCall::ReadNotebook(_) => "read_notebook",
            ToolCall::ReadNote(_) => "read_note",
            ToolCall::ReadMultiNote(_) => "read_multinote",
            ToolCall::CreateNote(_) => "create_note",
            ToolCall::CreateFolder(_) => "create_folder",
            ToolCall::EditNote(_) => "edit_note",
            ToolCall::EditFolder(_) => "edit_folder",
            ToolCall::DeleteNote(_) => "delete_note",
            ToolCall::DeleteFolder(_) => "delete_folder",
            ToolCall::Connect(_) => "connect",
        }
    }
}

// ============================================
// Registry
// ============================================

pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: tool_definitions(),
        }
    }

    pub fn list_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Check `args` against the tool's schema and decode them.
    pub fn parse_call(&self, name: &str, args: &Value) -> Result<ToolCall, DispatchError> {
        let tool = self
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let invalid = |message: String| DispatchError::InvalidArguments {
            tool: name.to_string(),
            message,
        };

        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        validate_arguments(&tool.input_schema, &args).map_err(invalid)?;
        let args = strip_nulls(args);

        let call = match name {
            "list_notebooks" => ToolCall::ListNotebooks,
            "search_notes" => ToolCall::SearchNotes(decode(args).map_err(invalid)?),
            "read_notebook" => ToolCall::ReadNotebook(decode(args).map_err(invalid)?),
            "read_note" => ToolCall::ReadNote(decode(args).map_err(invalid)?),
            "read_multinote" => ToolCall::ReadMultiNote(decode(args).map_err(invalid)?),
            "create_note" => ToolCall::CreateNote(decode(args).map_err(invalid)?),
            "create_folder" => ToolCall::CreateFolder(decode(args).map_err(invalid)?),
            "edit_note" => ToolCall::EditNote(decode(args).map_err(invalid)?),
            "edit_folder" => ToolCall::EditFolder(decode(args).map_err(invalid)?),
            "delete_note" => ToolCall::DeleteNote(decode(args).map_err(invalid)?),
            "delete_folder" => ToolCall::DeleteFolder(decode(args).map_err(invalid)?),
            "connect" => ToolCall::Connect(decode(args).map_err(invalid)?),
            _ => return Err(DispatchError::UnknownTool(name.to_string())),
        };
        Ok(call)
    }
}

fn decode<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| e.to_string())
}

fn strip_nulls(args: Value) -> Value {
    match args {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}

/// Minimal JSON Schema check: object shape, required keys, primitive types.
/// A `null` value counts as absent.
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let args = args
        .as_object()
        .ok_or_else(|| "arguments must be an object".to_string())?;

    let present = |key: &str| args.get(key).map(|v| !v.is_null()).unwrap_or(false);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !present(key) {
                return Err(format!("missing required argument '{}'", key));
            }
        }
    }

    let properties = match schema.get("properties").and_then(Value::as_object) {
        Some(p) => p,
        None => return Ok(()),
    };

    for (key, spec) in properties {
        let value = match args.get(key) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        if !matches_schema(value, spec) {
            return Err(format!("argument '{}' must be of type {}", key, describe_type(spec)));
        }
    }
    Ok(())
}

/// Declared types of a property, ignoring `null` (absent is always allowed).
fn declared_types(spec: &Value) -> Vec<&str> {
    match spec.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .filter(|t| *t != "null")
            .collect(),
        _ => Vec::new(),
    }
}

fn matches_schema(value: &Value, spec: &Value) -> bool {
    let types = declared_types(spec);
    types.is_empty() || types.iter().any(|t| matches_type(value, t, spec))
}

fn matches_type(value: &Value, expected: &str, spec: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "array" => match (value.as_array(), spec.get("items")) {
            (Some(items), Some(item_spec)) => items.iter().all(|item| matches_schema(item, item_spec)),
            (Some(_), None) => true,
            (None, _) => false,
        },
        "object" => value.is_object(),
        _ => true,
    }
}

fn describe_type(spec: &Value) -> String {
    let types = declared_types(spec).join(" or ");
    match spec.get("items") {
        Some(items) if types == "array" => format!("array of {}", declared_types(items).join(" or ")),
        _ => types,
    }
}

/// JSON Schema for a tool's argument struct, trimmed to what `tools/list` needs.
fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({}));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("description");
        obj.insert("type".into(), json!("object"));
        obj.entry("properties").or_insert_with(|| json!({}));
        obj.entry("required").or_insert_with(|| json!([]));
    }
    schema
}

/// Every tool this server exposes.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_notebooks",
            description: "Retrieve the complete notebook hierarchy from Joplin",
            input_schema: input_schema::<ListNotebooksArgs>(),
        },
        ToolDefinition {
            name: "search_notes",
            description: "Search for notes in Joplin and return matching notebooks",
            input_schema: input_schema::<SearchNotesArgs>(),
        },
        ToolDefinition {
            name: "read_notebook",
            description: "Read the contents of a specific notebook",
            input_schema: input_schema::<ReadNotebookArgs>(),
        },
        ToolDefinition {
            name: "read_note",
            description: "Read the full content of a specific note",
            input_schema: input_schema::<ReadNoteArgs>(),
        },
        ToolDefinition {
            name: "read_multinote",
            description: "Read the full content of multiple notes at once",
            input_schema: input_schema::<ReadMultiNoteArgs>(),
        },
        ToolDefinition {
            name: "create_note",
            description: "Create a new note in Joplin",
            input_schema: input_schema::<CreateNoteArgs>(),
        },
        ToolDefinition {
            name: "create_folder",
            description: "Create a new folder/notebook in Joplin",
            input_schema: input_schema::<CreateFolderArgs>(),
        },
        ToolDefinition {
            name: "edit_note",
            description: "Edit/update an existing note in Joplin",
            input_schema: input_schema::<EditNoteArgs>(),
        },
        ToolDefinition {
            name: "edit_folder",
            description: "Edit/update an existing folder/notebook in Joplin",
            input_schema: input_schema::<EditFolderArgs>(),
        },
        ToolDefinition {
            name: "delete_note",
            description: "Delete a note from Joplin (requires confirmation)",
            input_schema: input_schema::<DeleteNoteArgs>(),
        },
        ToolDefinition {
            name: "delete_folder",
            description: "Delete a folder/notebook from Joplin (requires confirmation)",
            input_schema: input_schema::<DeleteFolderArgs>(),
        },
        ToolDefinition {
            name: "connect",
            description: "Check the Joplin connection, scan for a running Joplin instance, or connect to a specific host/port",
            input_schema: input_schema::<ConnectArgs>(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_all_tools() {
        let registry = ToolRegistry::new();
        let names: Vec<&str> = registry.list_tools().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 12);
        for expected in [
            "list_notebooks",
            "search_notes",
            "read_notebook",
            "read_note",
            "read_multinote",
            "create_note",
            "create_folder",
            "edit_note",
            "edit_folder",
            "delete_note",
            "delete_folder",
            "connect",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in tool_definitions() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.input_schema["properties"].is_object());
        }
    }

    #[test]
    fn test_schemas_follow_argument_structs() {
        let registry = ToolRegistry::new();

        let edit = &registry.get("edit_note").unwrap().input_schema;
        assert_eq!(edit["required"], json!(["note_id"]));
        assert_eq!(edit["properties"]["note_id"]["type"], "string");
        assert_eq!(edit["properties"]["note_id"]["description"], "ID of the note to edit");
        let props = edit["properties"].as_object().unwrap();
        assert_eq!(props.len(), 8);
        assert!(edit.get("$schema").is_none());

        let create = &registry.get("create_note").unwrap().input_schema;
        assert_eq!(create["required"], json!([]));

        let multi = &registry.get("read_multinote").unwrap().input_schema;
        assert_eq!(multi["properties"]["note_ids"]["items"]["type"], "string");

        let list = &registry.get("list_notebooks").unwrap().input_schema;
        assert!(list["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_nullable_types_accept_value_or_null() {
        let spec = json!({ "type": ["boolean", "null"] });
        assert!(matches_schema(&json!(true), &spec));
        assert!(!matches_schema(&json!("yes"), &spec));
        assert_eq!(describe_type(&spec), "boolean");
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolRegistry::new().parse_call("nope", &json!({})).unwrap_err();
        assert_eq!(err, DispatchError::UnknownTool("nope".into()));
        assert_eq!(err.to_string(), "Unknown tool: nope");
    }

    #[test]
    fn test_missing_required_argument() {
        let err = ToolRegistry::new()
            .parse_call("read_note", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("missing required argument 'note_id'"));

        let err = ToolRegistry::new()
            .parse_call("read_note", &json!({ "note_id": null }))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments { .. }));
    }

    #[test]
    fn test_wrong_primitive_type() {
        let registry = ToolRegistry::new();
        let err = registry
            .parse_call("delete_note", &json!({ "note_id": "58a0a29f68bc4141", "confirm": "yes" }))
            .unwrap_err();
        assert!(err.to_string().contains("'confirm' must be of type boolean"));

        let err = registry
            .parse_call("read_multinote", &json!({ "note_ids": ["a", 3] }))
            .unwrap_err();
        assert!(err.to_string().contains("array of string"));

        let err = registry
            .parse_call("edit_note", &json!({ "note_id": "x", "todo_due": "tomorrow" }))
            .unwrap_err();
        assert!(err.to_string().contains("'todo_due' must be of type number"));
    }

    #[test]
    fn test_decodes_typed_arguments() {
        let registry = ToolRegistry::new();

        match registry.parse_call("list_notebooks", &Value::Null).unwrap() {
            ToolCall::ListNotebooks => {}
            other => panic!("unexpected {:?}", other),
        }

        match registry
            .parse_call(
                "edit_note",
                &json!({ "note_id": "abc", "title": "T", "todo_due": 1700000000000.0, "body": null }),
            )
            .unwrap()
        {
            ToolCall::EditNote(args) => {
                assert_eq!(args.note_id, "abc");
                assert_eq!(args.title.as_deref(), Some("T"));
                assert_eq!(args.body, None);
                assert_eq!(args.todo_due, Some(1_700_000_000_000.0));
            }
            other => panic!("unexpected {:?}", other),
        }

        let call = registry
            .parse_call("read_multinote", &json!({ "note_ids": ["a", "b"] }))
            .unwrap();
        assert_eq!(call.name(), "read_multinote");
    }

    #[test]
    fn test_connect_port_out_of_range() {
        let err = ToolRegistry::new()
            .parse_call("connect", &json!({ "port": 70000 }))
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments { .. }));
    }
}
