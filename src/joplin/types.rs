//! Typed request and response bodies for the Joplin Web Clipper API.
//!
//! Joplin encodes booleans as `0`/`1` integers and uses `""` for "no parent",
//! and completed todos carry a completion timestamp instead of a flag. The
//! deserializers below normalise those quirks so handlers work with plain
//! Rust types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A notebook. Joplin calls these folders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub updated_time: i64,
    #[serde(default, deserialize_with = "flag")]
    pub is_todo: bool,
    #[serde(default, deserialize_with = "flag")]
    pub todo_completed: bool,
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub todo_due: Option<i64>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Body for `POST /notes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewNote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_todo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
}

/// Body for `PUT /notes/:id`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_todo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_due: Option<i64>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this update to a local copy of a note, mirroring what the
    /// server does with a partial `PUT`.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(body) = &self.body {
            note.body = Some(body.clone());
        }
        if let Some(body_html) = &self.body_html {
            note.body_html = Some(body_html.clone());
        }
        if let Some(parent_id) = &self.parent_id {
            note.parent_id = Some(parent_id.clone()).filter(|p| !p.is_empty());
        }
        if let Some(is_todo) = self.is_todo {
            note.is_todo = is_todo;
        }
        if let Some(completed) = self.todo_completed {
            note.todo_completed = completed;
        }
        if let Some(due) = self.todo_due {
            note.todo_due = Some(due).filter(|d| *d != 0);
        }
    }
}

/// Body for `POST /folders` and `PUT /folders/:id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FolderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .filter(|n| *n != 0))
}

/// Accepts `true`/`false`, `0`/`1`, or a non-zero timestamp (completed todos).
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_note_decodes_joplin_integers() {
        let note: Note = serde_json::from_value(json!({
            "id": "58a0a29f68bc4141b49c99f5d367638a",
            "title": "Groceries",
            "parent_id": "",
            "is_todo": 1,
            "todo_completed": 1700000000000i64,
            "todo_due": 0,
        }))
        .unwrap();
        assert!(note.is_todo);
        assert!(note.todo_completed);
        assert_eq!(note.todo_due, None);
        assert_eq!(note.parent_id, None);
    }

    #[test]
    fn test_note_without_id_is_rejected() {
        let result = serde_json::from_value::<Note>(json!({ "title": "no id" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_note_update_skips_unset_fields() {
        let update = NoteUpdate {
            title: Some("X".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "title": "X" }));
        assert!(!update.is_empty());
        assert!(NoteUpdate::default().is_empty());
    }

    #[test]
    fn test_apply_to_only_touches_given_fields() {
        let mut note = Note {
            id: "n1".into(),
            title: "Old".into(),
            body: Some("body".into()),
            parent_id: Some("f1".into()),
            ..Default::default()
        };
        NoteUpdate {
            title: Some("New".into()),
            ..Default::default()
        }
        .apply_to(&mut note);
        assert_eq!(note.title, "New");
        assert_eq!(note.body.as_deref(), Some("body"));
        assert_eq!(note.parent_id.as_deref(), Some("f1"));
    }

    #[test]
    fn test_paginated_defaults_has_more() {
        let page: Paginated<Folder> =
            serde_json::from_value(json!({ "items": [{ "id": "a", "title": "A" }] })).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more);
    }
}
