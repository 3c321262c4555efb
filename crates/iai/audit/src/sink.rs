//! Append-only stores for audit lines

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::error::AuditResult;

/// Durable, append-only storage for serialized audit entries.
///
/// A line is either appended whole or not at all.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one serialized entry
    async fn append_line(&self, line: &str) -> AuditResult<()>;

    /// Read every stored line in append order, blank lines excluded
    async fn read_lines(&self) -> AuditResult<Vec<String>>;
}

#[async_trait]
impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    async fn append_line(&self, line: &str) -> AuditResult<()> {
        (**self).append_line(line).await
    }

    async fn read_lines(&self) -> AuditResult<Vec<String>> {
        (**self).read_lines().await
    }
}

/// In-memory audit sink
#[derive(Default)]
pub struct MemoryAuditSink {
    lines: RwLock<Vec<String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a sink with previously persisted lines
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines: RwLock::new(lines),
        }
    }

    /// Snapshot of all lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append_line(&self, line: &str) -> AuditResult<()> {
        self.lines.write().push(line.to_string());
        Ok(())
    }

    async fn read_lines(&self) -> AuditResult<Vec<String>> {
        Ok(self
            .lines
            .read()
            .iter()
            .filter(|l| !l.trim().is_empty())
            .cloned()
            .collect())
    }
}

/// JSONL file sink with append-only writes
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    /// Create a sink at `path`, creating parent directories if needed
    pub async fn new(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append_line(&self, line: &str) -> AuditResult<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let start = file.metadata().await?.len();

        append_whole(&mut file, start, buf.as_bytes()).await
    }

    async fn read_lines(&self) -> AuditResult<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_jsonl(&self.path).await
    }
}

/// A writer that can be cut back to an earlier length.
#[async_trait]
trait Truncate {
    async fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
}

#[async_trait]
impl Truncate for File {
    async fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len).await
    }
}

/// Write `bytes` at the end of a file that was `start` bytes long. A failed
/// write is cut back to `start` so no partial line survives.
async fn append_whole<W>(writer: &mut W, start: u64, bytes: &[u8]) -> AuditResult<()>
where
    W: AsyncWrite + Truncate + Unpin + Send,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        if let Err(rollback) = writer.truncate_to(start).await {
            warn!(error = %rollback, len = start, "Could not remove partial audit line");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Read the non-blank lines of a JSONL file
pub(crate) async fn read_jsonl(path: &Path) -> AuditResult<Vec<String>> {
    let file = File::open(path).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut out = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        out.push(line);
    }

    Ok(out)
}
