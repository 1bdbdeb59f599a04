//! HTTP client for the Joplin Web Clipper REST API.
//!
//! Every request carries the API token as a `token` query parameter. List
//! endpoints are paginated (`{ items, has_more }` with a `page` parameter);
//! [`JoplinClient::get_all_items`] walks them to the end.

use std::future::Future;
use std::time::Duration;

use futures_util::future::select_ok;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::ApiError;

/// Body returned by `GET /ping` on a running Web Clipper service.
pub const PING_SIGNATURE: &str = "JoplinClipperServer";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 41184;

/// Upper bound on pages fetched by `get_all_items`.
pub const MAX_PAGES: u32 = 1000;

/// Query parameters as `(key, value)` pairs.
pub type Query<'a> = &'a [(&'a str, &'a str)];

/// Authenticated handle on one Joplin instance. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JoplinClient {
    http: reqwest::Client,
    host: String,
    port: u16,
    token: String,
    page_limit: u32,
}

impl JoplinClient {
    pub fn new(host: &str, port: u16, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.to_string(),
            port,
            token: token.to_string(),
            page_limit: MAX_PAGES,
        }
    }

    /// Cap on pages walked by [`JoplinClient::get_all_items`].
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Liveness probe. True only if `/ping` answers 200 with the Joplin signature.
    pub async fn service_available(&self) -> bool {
        match ping(&self.http, &self.host, self.port, None).await {
            Ok(()) => true,
            Err(reason) => {
                debug!(host = %self.host, port = self.port, %reason, "Joplin ping failed");
                false
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<T, ApiError> {
        let request = self.http.get(self.url(path)).query(&self.query(query));
        self.execute("GET", path, request).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B, query: Query<'_>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .http
            .post(self.url(path))
            .query(&self.query(query))
            .json(body);
        self.execute("POST", path, request).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B, query: Query<'_>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .http
            .put(self.url(path))
            .query(&self.query(query))
            .json(body);
        self.execute("PUT", path, request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<T, ApiError> {
        let request = self.http.delete(self.url(path)).query(&self.query(query));
        self.execute("DELETE", path, request).await
    }

    /// Fetch every page of a list endpoint and concatenate the `items`.
    pub async fn get_all_items<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query<'_>,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();

        for page in 1..=self.page_limit {
            let page_str = page.to_string();
            let mut page_query: Vec<(&str, &str)> = query.to_vec();
            page_query.retain(|(key, _)| *key != "page");
            page_query.push(("page", page_str.as_str()));

            let response: Value = self.get(path, &page_query).await?;
            let page_items = match response.get("items").and_then(Value::as_array) {
                Some(page_items) => page_items,
                None => {
                    warn!(path, page, "List response has no items array");
                    return Err(ApiError::UnexpectedFormat {
                        path: path.to_string(),
                        detail: "missing items array".into(),
                    });
                }
            };

            for item in page_items {
                let decoded = serde_json::from_value(item.clone()).map_err(|e| ApiError::UnexpectedFormat {
                    path: path.to_string(),
                    detail: e.to_string(),
                })?;
                items.push(decoded);
            }

            let has_more = response
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_more {
                return Ok(items);
            }
        }

        warn!(path, limit = self.page_limit, "Giving up on runaway pagination");
        Err(ApiError::PageLimitExceeded {
            path: path.to_string(),
            limit: self.page_limit,
        })
    }

    /// Scan `max_attempts` consecutive ports from `start_port` concurrently and
    /// return whichever port answers the signature probe first.
    ///
    /// The winner is decided by response timing, not port order.
    pub async fn discover_port(
        host: &str,
        start_port: u16,
        max_attempts: u16,
        timeout: Duration,
    ) -> Option<u16> {
        let ports: Vec<u16> = (start_port..=u16::MAX).take(max_attempts as usize).collect();
        let (first, last) = (ports.first().copied()?, ports.last().copied()?);
        info!(host, "Scanning for Joplin on ports {}-{}", first, last);

        let http = reqwest::Client::new();
        let found = first_responding_port(ports, |port| {
            let http = http.clone();
            let host = host.to_string();
            async move { ping(&http, &host, port, Some(timeout)).await.is_ok() }
        })
        .await;

        match found {
            Some(port) => info!(host, port, "Found Joplin"),
            None => info!(host, "No Joplin instance answered on ports {}-{}", first, last),
        }
        found
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Token first, then caller parameters; a caller key replaces an earlier one.
    fn query<'a>(&'a self, extra: Query<'a>) -> Vec<(&'a str, &'a str)> {
        let mut merged: Vec<(&str, &str)> = vec![("token", self.token.as_str())];
        for &(key, value) in extra {
            match merged.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => merged.push((key, value)),
            }
        }
        merged
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &'static str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|source| {
            warn!(method, path, error = %source, "Joplin request failed");
            ApiError::Request {
                method,
                path: path.to_string(),
                source,
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ApiError::Request {
            method,
            path: path.to_string(),
            source,
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            warn!(method, path, status = status.as_u16(), %message, "Joplin returned an error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                message,
            });
        }

        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::UnexpectedFormat {
                path: path.to_string(),
                detail: e.to_string(),
            })?
        };

        serde_json::from_value(value).map_err(|e| ApiError::UnexpectedFormat {
            path: path.to_string(),
            detail: e.to_string(),
        })
    }
}

/// `GET /ping` and check the signature.
async fn ping(
    http: &reqwest::Client,
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let mut request = http.get(format!("http://{}:{}/ping", host, port));
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|e| e.to_string())?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(format!("status {}", response.status().as_u16()));
    }
    let body = response.text().await.map_err(|e| e.to_string())?;
    if body == PING_SIGNATURE {
        Ok(())
    } else {
        Err("signature mismatch".into())
    }
}

/// Run `probe` for every port at once and resolve with the first port whose
/// probe returns true. All probes are started before any of them can finish.
pub(crate) async fn first_responding_port<F, Fut>(ports: Vec<u16>, probe: F) -> Option<u16>
where
    F: Fn(u16) -> Fut,
    Fut: Future<Output = bool>,
{
    let checks: Vec<_> = ports
        .into_iter()
        .map(|port| {
            let check = probe(port);
            Box::pin(async move {
                if check.await {
                    Ok(port)
                } else {
                    Err(port)
                }
            })
        })
        .collect();

    if checks.is_empty() {
        return None;
    }

    select_ok(checks).await.ok().map(|(port, _)| port)
}
