use thiserror::Error;

/// Failure of a single REST call against the Joplin API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("{method} {path} failed: {source}")]
    Request {
        method: &'static str,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("Request failed with status code {status}{}", detail_suffix(.message))]
    Status {
        status: u16,
        path: String,
        message: String,
    },

    #[error("Unexpected response format from Joplin API for path: {path}")]
    UnexpectedFormat { path: String, detail: String },

    #[error("Pagination for {path} did not finish after {limit} pages")]
    PageLimitExceeded { path: String, limit: u32 },
}

impl ApiError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The server-supplied error message, if any.
    pub fn server_message(&self) -> &str {
        match self {
            ApiError::Status { message, .. } => message,
            _ => "",
        }
    }
}

fn detail_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

/// Joplin could not be reached even after port discovery.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(
        "Joplin is not available. Please ensure Joplin is running with Web Clipper enabled \
         (Tools > Options > Web Clipper) and that the API token is correct, \
         or use the 'connect' tool to specify host/port. Current settings: {host}:{port}"
    )]
    Unavailable { host: String, port: u16 },
}
