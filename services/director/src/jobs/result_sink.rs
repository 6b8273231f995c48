//! Sinks receiving one serialized document per instance.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write result to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("result sink unavailable: {0}")]
    Unavailable(String),
}

/// Accepts documents one at a time and writes each immediately.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write(&self, document: &str) -> Result<(), SinkError>;
}

/// Appends documents to a file as JSON lines.
pub struct FileResultSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileResultSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn write(&self, document: &str) -> Result<(), SinkError> {
        let mut line = String::with_capacity(document.len() + 1);
        line.push_str(document);
        line.push('\n');

        let mut file = self.file.lock().await;
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }
}

/// Keeps documents in memory.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    documents: std::sync::Mutex<Vec<String>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents written so far, in write order.
    pub fn documents(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Documents parsed as JSON; unparseable ones are skipped.
    pub fn values(&self) -> Vec<serde_json::Value> {
        self.documents()
            .iter()
            .filter_map(|doc| serde_json::from_str(doc).ok())
            .collect()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn write(&self, document: &str) -> Result<(), SinkError> {
        let mut docs = self
            .documents
            .lock()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        docs.push(document.to_string());
        Ok(())
    }
}
