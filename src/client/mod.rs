//! Provider-facing side of the toolkit.
//!
//! The workflows only see the [`FileStore`] and [`Assistant`] traits; the
//! Azure OpenAI HTTP client implements both.

pub mod azure_client;
#[cfg(test)]
pub mod fake;
pub mod llm_client;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use types::{FileBatch, FileObject, Reply, Suggestions, UploadFile, VectorStore};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("service did not delete file {0}")]
    NotDeleted(String),

    #[error("file batch {batch_id} still in progress after {waited:?}")]
    PollTimeout { batch_id: String, waited: Duration },

    #[error("response stream failed: {0}")]
    Stream(String),

    #[error("response contained no {0}")]
    MissingOutput(&'static str),
}

/// Files and vector stores on the provider.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Every data file on the service, all pages.
    async fn list_files(&self) -> Result<Vec<FileObject>, ApiError>;

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ApiError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError>;

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore, ApiError>;

    async fn retrieve_vector_store(&self, store_id: &str) -> Result<VectorStore, ApiError>;

    /// IDs of every file attached to a vector store, all pages.
    async fn list_vector_store_file_ids(&self, store_id: &str) -> Result<Vec<String>, ApiError>;

    /// Upload `files`, attach them to the store as one batch and wait until
    /// the batch leaves `in_progress`.
    async fn upload_and_poll(
        &self,
        store_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<FileBatch, ApiError>;
}

/// Chat over a vector store.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Stream a reply to `query`, forwarding each text delta to `on_delta`.
    /// `previous_response_id` chains the turn onto an earlier one.
    async fn stream_reply(
        &self,
        query: &str,
        previous_response_id: Option<&str>,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<Reply, ApiError>;

    /// Three probable follow-up queries for `query`.
    async fn suggestions(&self, query: &str) -> Result<Suggestions, ApiError>;
}
