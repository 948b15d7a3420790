//! types.rs
//!
//! Request/response models (subset of the Azure OpenAI files, vector store
//! and responses APIs). Unknown fields are ignored; fields the service may
//! omit are defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A data file stored on the service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl FileObject {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FileCounts {
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cancelled: u64,
    #[serde(default)]
    pub total: u64,
}

impl Display for FileCounts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "completed={} failed={} cancelled={} in_progress={} total={}",
            self.completed, self.failed, self.cancelled, self.in_progress, self.total
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_counts: FileCounts,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl VectorStore {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Failed => "failed",
        }
    }

    /// A batch stops changing once it leaves `in_progress`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchStatus::InProgress)
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FileBatch {
    pub id: String,
    #[serde(default)]
    pub vector_store_id: Option<String>,
    pub status: BatchStatus,
    #[serde(default)]
    pub file_counts: FileCounts,
}

/// Cursor-paginated list envelope shared by the list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

/// Entry of `/vector_stores/{id}/files`; only the ID is needed.
#[derive(Debug, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletionStatus {
    #[serde(default)]
    pub deleted: bool,
}

/// In-memory file contents handed to the uploader.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The three follow-up queries proposed after each chat turn.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Suggestions {
    pub suggestion1: String,
    pub suggestion2: String,
    pub suggestion3: String,
}

impl Suggestions {
    pub fn into_array(self) -> [String; 3] {
        [self.suggestion1, self.suggestion2, self.suggestion3]
    }
}

/// Outcome of a completed streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub response_id: String,
    pub text: String,
}
