//! HTTP transport: JSON-RPC over POST plus a health endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::server::{McpServer, SERVER_NAME};

pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Clone)]
struct HttpState {
    server: Arc<McpServer>,
    session_id: Arc<str>,
}

/// Build the router. `endpoint` must start with `/`.
pub fn router(server: Arc<McpServer>, endpoint: &str, session_id: &str) -> Router {
    let state = HttpState {
        server,
        session_id: Arc::from(session_id),
    };

    Router::new()
        .route(endpoint, post(mcp_handler))
        .route("/health", get(health_endpoint))
        .with_state(state)
}

/// Bind `0.0.0.0:{port}` and serve until the process exits.
pub async fn serve(server: Arc<McpServer>, port: u16, endpoint: &str) -> std::io::Result<()> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let app = router(server, endpoint, &session_id);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Joplin MCP server listening on http://{}{}", addr, endpoint);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app).await
}

async fn health_endpoint(State(state): State<HttpState>) -> Json<Value> {
    let joplin = state.server.manager().connection_info().await;
    Json(json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "joplinHost": joplin.host,
        "joplinPort": joplin.port,
    }))
}

async fn mcp_handler(State(state): State<HttpState>, body: String) -> Response {
    debug!(bytes = body.len(), "[MCP] HTTP request");

    let mut response = match state.server.handle_message(&body).await {
        Some(reply) => (StatusCode::OK, Json(reply)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&state.session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockJoplin;

    async fn spawn_http(mock: &MockJoplin) -> String {
        let server = Arc::new(McpServer::new(Arc::new(mock.manager())));
        let app = router(server, "/mcp", "session-1");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health_reports_joplin_address() {
        let mock = MockJoplin::start().await;
        let base = spawn_http(&mock).await;

        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "joplin-mcp");
        assert_eq!(body["joplinHost"], "127.0.0.1");
        assert_eq!(body["joplinPort"], mock.port);
    }

    #[tokio::test]
    async fn test_request_gets_json_reply_with_session() {
        let mock = MockJoplin::start().await;
        let base = spawn_http(&mock).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/mcp", base))
            .header("content-type", "application/json")
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()[SESSION_HEADER], "session-1");

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_notification_is_accepted_without_body() {
        let mock = MockJoplin::start().await;
        let base = spawn_http(&mock).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/mcp", base))
            .body(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        assert!(resp.text().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mock = MockJoplin::start().await;
        let base = spawn_http(&mock).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{}/mcp", base))
            .body("{")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["error"]["code"], -32700);
        assert!(body["id"].is_null());
    }
}
