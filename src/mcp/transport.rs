//! Line-delimited message transports for the stdio server.
//!
//! `StreamTransport` frames one JSON-RPC message per line over any async
//! reader/writer pair. `LoggingTransport` wraps another transport and appends
//! every message to a JSONL session log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::warn;

#[allow(async_fn_in_trait)]
pub trait Transport: Send {
    /// Next non-empty message, or `None` at end of input.
    async fn read_message(&mut self) -> io::Result<Option<String>>;

    async fn write_message(&mut self, message: &str) -> io::Result<()>;
}

// ============================================================================
// Stream transport
// ============================================================================

pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

pub type StdioTransport = StreamTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_message(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    async fn write_message(&mut self, message: &str) -> io::Result<()> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

// ============================================================================
// Session log
// ============================================================================

/// Append-only JSONL record of one MCP session.
pub struct MessageLog {
    path: PathBuf,
    file: Mutex<File>,
    commands: AtomicU64,
}

impl MessageLog {
    pub fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S%.3f");
        let path = dir.join(format!("mcp-session-{}.jsonl", stamp));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            commands: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_command(&self, message: &str) {
        let number = self.commands.fetch_add(1, Ordering::SeqCst) + 1;
        self.append("COMMAND", number, message);
    }

    /// Responses carry the number of the latest command.
    pub fn record_response(&self, message: &str) {
        let number = self.commands.load(Ordering::SeqCst);
        self.append("RESPONSE", number, message);
    }

    fn append(&self, direction: &str, number: u64, message: &str) {
        let message = serde_json::from_str::<Value>(message)
            .unwrap_or_else(|_| Value::String(message.to_string()));
        let entry = json!({
            "direction": direction,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "commandNumber": number,
            "message": message,
        });

        let Ok(mut file) = self.file.lock() else {
            warn!("Session log lock poisoned, dropping {} entry", direction);
            return;
        };
        if let Err(e) = writeln!(file, "{}", entry).and_then(|_| file.flush()) {
            warn!("Failed to write session log {}: {}", self.path.display(), e);
        }
    }
}

// ============================================================================
// Logging transport
// ============================================================================

pub struct LoggingTransport<T> {
    inner: T,
    log: Arc<MessageLog>,
}

impl<T: Transport> LoggingTransport<T> {
    pub fn new(inner: T, log: Arc<MessageLog>) -> Self {
        Self { inner, log }
    }
}

impl<T: Transport> Transport for LoggingTransport<T> {
    async fn read_message(&mut self) -> io::Result<Option<String>> {
        let message = self.inner.read_message().await?;
        if let Some(ref m) = message {
            self.log.record_command(m);
        }
        Ok(message)
    }

    async fn write_message(&mut self, message: &str) -> io::Result<()> {
        self.log.record_response(message);
        self.inner.write_message(message).await
    }
}
