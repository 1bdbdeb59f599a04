//! In-process stand-in for the Joplin Web Clipper service.
//!
//! Serves folders and notes from memory, paginates list endpoints, enforces
//! the token on everything except `/ping`, and records every request so tests
//! can assert on the exact calls a handler made.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use crate::joplin::{ConnectionManager, DiscoverySettings, JoplinClient};

type Params = Query<HashMap<String, String>>;
type Shared = State<Arc<Mutex<Store>>>;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
}

struct Store {
    folders: Vec<Value>,
    notes: Vec<Value>,
    requests: Vec<RecordedRequest>,
    bodies: Vec<(String, String, Value)>,
    failures: HashMap<(String, String), (u16, String)>,
    page_size: usize,
    ping_body: String,
    clock: i64,
    next_id: u64,
}

impl Store {
    fn tick(&mut self) -> i64 {
        self.clock += 1000;
        self.clock
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:032x}", 0xabc0_0000_u64 + self.next_id)
    }

    fn folder_exists(&self, id: &str) -> bool {
        self.folders.iter().any(|f| f["id"] == id)
    }
}

pub struct MockJoplin {
    pub port: u16,
    store: Arc<Mutex<Store>>,
}

impl MockJoplin {
    pub const TOKEN: &'static str = "test-token";

    pub async fn start() -> Self {
        let store = Arc::new(Mutex::new(Store {
            folders: Vec::new(),
            notes: Vec::new(),
            requests: Vec::new(),
            bodies: Vec::new(),
            failures: HashMap::new(),
            page_size: 100,
            ping_body: "JoplinClipperServer".into(),
            clock: 1_700_000_000_000,
            next_id: 0,
        }));

        let app = Router::new()
            .route("/ping", get(ping))
            .route("/folders", get(list_folders).post(create_folder))
            .route(
                "/folders/:id",
                get(get_folder).put(update_folder).delete(delete_folder),
            )
            .route("/folders/:id/notes", get(folder_notes))
            .route("/notes", get(list_notes).post(create_note))
            .route("/notes/:id", get(get_note).put(update_note).delete(delete_note))
            .route("/search", get(search))
            .layer(middleware::from_fn_with_state(store.clone(), record_and_guard))
            .with_state(store.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { port, store }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    pub fn client(&self) -> JoplinClient {
        JoplinClient::new("127.0.0.1", self.port, Self::TOKEN)
    }

    /// Manager pointed at this mock; discovery looks only at this port.
    pub fn manager(&self) -> ConnectionManager {
        ConnectionManager::with_address(
            "127.0.0.1",
            self.port,
            Self::TOKEN,
            DiscoverySettings {
                start_port: self.port,
                max_attempts: 1,
                timeout: Duration::from_millis(200),
            },
        )
    }

    pub fn add_folder(&self, id: &str, title: &str, parent_id: Option<&str>) {
        let mut store = self.lock();
        let now = store.tick();
        store.folders.push(json!({
            "id": id,
            "title": title,
            "parent_id": parent_id.unwrap_or(""),
            "created_time": now,
            "updated_time": now,
        }));
    }

    pub fn add_note(&self, id: &str, title: &str, body: &str, parent_id: &str) {
        self.insert_note(json!({ "id": id, "title": title, "body": body, "parent_id": parent_id }));
    }

    /// Insert a note with arbitrary fields. Missing timestamps and flags are filled in.
    pub fn insert_note(&self, mut note: Value) {
        let mut store = self.lock();
        let now = store.tick();
        if let Some(obj) = note.as_object_mut() {
            for (key, default) in [
                ("created_time", json!(now)),
                ("updated_time", json!(now)),
                ("is_todo", json!(0)),
                ("todo_completed", json!(0)),
                ("todo_due", json!(0)),
                ("parent_id", json!("")),
                ("body", json!("")),
            ] {
                obj.entry(key).or_insert(default);
            }
        }
        store.notes.push(note);
    }

    pub fn note(&self, id: &str) -> Option<Value> {
        self.lock().notes.iter().find(|n| n["id"] == id).cloned()
    }

    pub fn folder(&self, id: &str) -> Option<Value> {
        self.lock().folders.iter().find(|f| f["id"] == id).cloned()
    }

    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = size;
    }

    pub fn set_ping_body(&self, body: &str) {
        self.lock().ping_body = body.to_string();
    }

    /// Answer `method path` with `status` and `{"error": message}` from now on.
    pub fn fail(&self, method: &str, path: &str, status: u16, message: &str) {
        self.lock()
            .failures
            .insert((method.to_string(), path.to_string()), (status, message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of recorded requests with this method and exact path.
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// JSON bodies received by POST and PUT, as `(method, path, body)`.
    pub fn bodies(&self) -> Vec<(String, String, Value)> {
        self.lock().bodies.clone()
    }
}

/// A port with nothing listening on it.
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A port that accepts connections into the backlog but never answers.
pub fn silent_port() -> (std::net::TcpListener, u16) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    (listener, addr.port())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn record_and_guard(State(store): Shared, Query(query): Params, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let failure = {
        let mut store = store.lock().unwrap();
        store.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            query: query.clone(),
        });
        store.failures.get(&(method, path.clone())).cloned()
    };

    if path != "/ping" && query.get("token").map(String::as_str) != Some(MockJoplin::TOKEN) {
        return error(403, "Invalid token");
    }
    if let Some((status, message)) = failure {
        return error(status, &message);
    }
    next.run(req).await
}

fn error(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": message }))).into_response()
}

fn page(items: Vec<Value>, query: &HashMap<String, String>, page_size: usize) -> Response {
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    let slice = if start < items.len() { items[start..end].to_vec() } else { Vec::new() };
    Json(json!({ "items": slice, "has_more": end < items.len() })).into_response()
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn text_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

async fn ping(State(store): Shared) -> String {
    store.lock().unwrap().ping_body.clone()
}

async fn list_folders(State(store): Shared, Query(query): Params) -> Response {
    let store = store.lock().unwrap();
    page(store.folders.clone(), &query, store.page_size)
}

async fn create_folder(State(store): Shared, Json(body): Json<Value>) -> Response {
    let mut store = store.lock().unwrap();
    store.bodies.push(("POST".into(), "/folders".into(), body.clone()));

    let title = text_field(&body, "title").unwrap_or("");
    if title.is_empty() {
        return error(400, "Title is required");
    }
    if store.folders.iter().any(|f| f["title"] == title) {
        return error(409, "A notebook with this title already exists");
    }
    let parent_id = text_field(&body, "parent_id").unwrap_or("").to_string();
    if !parent_id.is_empty() && !store.folder_exists(&parent_id) {
        return error(404, "Parent folder not found");
    }

    let id = store.new_id();
    let now = store.tick();
    let folder = json!({
        "id": id,
        "title": title,
        "parent_id": parent_id,
        "created_time": now,
        "updated_time": now,
    });
    store.folders.push(folder.clone());
    Json(folder).into_response()
}

async fn get_folder(State(store): Shared, Path(id): Path<String>) -> Response {
    let store = store.lock().unwrap();
    match store.folders.iter().find(|f| f["id"] == id.as_str()) {
        Some(folder) => Json(folder.clone()).into_response(),
        None => error(404, "Not Found"),
    }
}

async fn update_folder(State(store): Shared, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    let mut store = store.lock().unwrap();
    store.bodies.push(("PUT".into(), format!("/folders/{}", id), body.clone()));

    if let Some(parent_id) = text_field(&body, "parent_id") {
        if !parent_id.is_empty() && !store.folder_exists(parent_id) {
            return error(404, "Parent folder not found");
        }
    }
    let now = store.tick();
    match store.folders.iter_mut().find(|f| f["id"] == id.as_str()) {
        Some(folder) => {
            merge(folder, &body);
            folder["updated_time"] = json!(now);
            Json(folder.clone()).into_response()
        }
        None => error(404, "Not Found"),
    }
}

async fn delete_folder(State(store): Shared, Path(id): Path<String>) -> Response {
    let mut store = store.lock().unwrap();
    let before = store.folders.len();
    store.folders.retain(|f| f["id"] != id.as_str());
    if store.folders.len() == before {
        return error(404, "Not Found");
    }
    StatusCode::OK.into_response()
}

async fn folder_notes(State(store): Shared, Path(id): Path<String>, Query(query): Params) -> Response {
    let store = store.lock().unwrap();
    if !store.folder_exists(&id) {
        return error(404, "Not Found");
    }
    let notes: Vec<Value> = store
        .notes
        .iter()
        .filter(|n| n["parent_id"] == id.as_str())
        .cloned()
        .collect();
    page(notes, &query, store.page_size)
}

async fn list_notes(State(store): Shared, Query(query): Params) -> Response {
    let store = store.lock().unwrap();
    page(store.notes.clone(), &query, store.page_size)
}

async fn create_note(State(store): Shared, Json(body): Json<Value>) -> Response {
    let mut store = store.lock().unwrap();
    store.bodies.push(("POST".into(), "/notes".into(), body.clone()));

    let parent_id = text_field(&body, "parent_id").unwrap_or("").to_string();
    if !parent_id.is_empty() && !store.folder_exists(&parent_id) {
        return error(404, "Parent folder not found");
    }

    let id = store.new_id();
    let now = store.tick();
    let mut note = Value::Object(Map::new());
    merge(&mut note, &body);
    merge(
        &mut note,
        &json!({ "id": id, "parent_id": parent_id, "created_time": now, "updated_time": now }),
    );
    if let Some(obj) = note.as_object_mut() {
        obj.entry("title").or_insert(json!(""));
        obj.entry("body").or_insert(json!(""));
        obj.entry("is_todo").or_insert(json!(0));
    }
    store.notes.push(note.clone());
    Json(note).into_response()
}

async fn get_note(State(store): Shared, Path(id): Path<String>) -> Response {
    let store = store.lock().unwrap();
    match store.notes.iter().find(|n| n["id"] == id.as_str()) {
        Some(note) => Json(note.clone()).into_response(),
        None => error(404, "Not Found"),
    }
}

async fn update_note(State(store): Shared, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    let mut store = store.lock().unwrap();
    store.bodies.push(("PUT".into(), format!("/notes/{}", id), body.clone()));

    if let Some(parent_id) = text_field(&body, "parent_id") {
        if !parent_id.is_empty() && !store.folder_exists(parent_id) {
            return error(404, "Parent folder not found");
        }
    }
    let now = store.tick();
    match store.notes.iter_mut().find(|n| n["id"] == id.as_str()) {
        Some(note) => {
            merge(note, &body);
            note["updated_time"] = json!(now);
            Json(note.clone()).into_response()
        }
        None => error(404, "Not Found"),
    }
}

async fn delete_note(State(store): Shared, Path(id): Path<String>) -> Response {
    let mut store = store.lock().unwrap();
    let before = store.notes.len();
    store.notes.retain(|n| n["id"] != id.as_str());
    if store.notes.len() == before {
        return error(404, "Not Found");
    }
    StatusCode::OK.into_response()
}

async fn search(State(store): Shared, Query(query): Params) -> Response {
    let store = store.lock().unwrap();
    let needle = query.get("query").cloned().unwrap_or_default().to_lowercase();
    let hits: Vec<Value> = store
        .notes
        .iter()
        .filter(|n| {
            let title = n["title"].as_str().unwrap_or("").to_lowercase();
            let body = n["body"].as_str().unwrap_or("").to_lowercase();
            !needle.is_empty() && (title.contains(&needle) || body.contains(&needle))
        })
        .cloned()
        .collect();
    page(hits, &query, store.page_size)
}
