//! In-memory stand-ins for the provider, shared by the workflow tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::{
    BatchStatus, FileBatch, FileCounts, FileObject, Reply, Suggestions, UploadFile, VectorStore,
};
use super::{ApiError, Assistant, FileStore};

pub fn status_error(code: u16) -> ApiError {
    ApiError::Status {
        status: StatusCode::from_u16(code).unwrap(),
        body: "fake".into(),
    }
}

pub fn file(id: &str, filename: &str) -> FileObject {
    FileObject {
        id: id.into(),
        filename: filename.into(),
        bytes: None,
        purpose: Some("assistants".into()),
        created_at: None,
        status: None,
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub files: Mutex<Vec<FileObject>>,
    pub stores: Mutex<HashMap<String, Vec<String>>>,
    /// Batches handed to `upload_and_poll`, by file name.
    pub uploaded_batches: Mutex<Vec<Vec<String>>>,
    pub fail_delete: HashSet<String>,
    pub fail_retrieve: HashSet<String>,
    /// 1-based `upload_and_poll` calls that return an error.
    pub fail_batch_calls: HashSet<usize>,
    /// 1-based `upload_and_poll` calls that finish with status `failed`.
    pub failed_status_calls: HashSet<usize>,
    pub fail_list: bool,
    pub fail_create_store: bool,
}

impl FakeStore {
    pub fn with_files(files: Vec<FileObject>) -> Self {
        Self {
            files: Mutex::new(files),
            ..Self::default()
        }
    }

    pub fn with_store(self, store_id: &str, file_ids: &[&str]) -> Self {
        self.stores.lock().unwrap().insert(
            store_id.to_string(),
            file_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl FileStore for FakeStore {
    async fn list_files(&self) -> Result<Vec<FileObject>, ApiError> {
        if self.fail_list {
            return Err(status_error(500));
        }
        Ok(self.files.lock().unwrap().clone())
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ApiError> {
        if self.fail_retrieve.contains(file_id) {
            return Err(status_error(500));
        }
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        if self.fail_delete.contains(file_id) {
            return Err(status_error(500));
        }
        self.files.lock().unwrap().retain(|f| f.id != file_id);
        Ok(())
    }

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore, ApiError> {
        if self.fail_create_store {
            return Err(status_error(400));
        }
        let id = format!("vs_{name}");
        self.stores.lock().unwrap().insert(id.clone(), Vec::new());
        Ok(VectorStore {
            id,
            name: Some(name.into()),
            status: Some("completed".into()),
            file_counts: FileCounts::default(),
            created_at: None,
        })
    }

    async fn retrieve_vector_store(&self, store_id: &str) -> Result<VectorStore, ApiError> {
        if !self.stores.lock().unwrap().contains_key(store_id) {
            return Err(status_error(404));
        }
        Ok(VectorStore {
            id: store_id.into(),
            name: Some("existing".into()),
            status: Some("completed".into()),
            file_counts: FileCounts::default(),
            created_at: None,
        })
    }

    async fn list_vector_store_file_ids(&self, store_id: &str) -> Result<Vec<String>, ApiError> {
        if self.fail_list {
            return Err(status_error(500));
        }
        self.stores
            .lock()
            .unwrap()
            .get(store_id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn upload_and_poll(
        &self,
        store_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<FileBatch, ApiError> {
        let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
        let call = {
            let mut batches = self.uploaded_batches.lock().unwrap();
            batches.push(names.clone());
            batches.len()
        };
        if self.fail_batch_calls.contains(&call) {
            return Err(status_error(503));
        }

        let n = names.len() as u64;
        let status = if self.failed_status_calls.contains(&call) {
            BatchStatus::Failed
        } else {
            let mut files_on_service = self.files.lock().unwrap();
            let mut stores = self.stores.lock().unwrap();
            let attached = stores.entry(store_id.to_string()).or_default();
            for name in names {
                let id = format!("file-{}", files_on_service.len() + 1);
                files_on_service.push(file(&id, &name));
                attached.push(id);
            }
            BatchStatus::Completed
        };
        Ok(FileBatch {
            id: format!("vsfb_{call}"),
            vector_store_id: Some(store_id.into()),
            status,
            file_counts: FileCounts {
                completed: if status == BatchStatus::Completed { n } else { 0 },
                failed: if status == BatchStatus::Failed { n } else { 0 },
                total: n,
                ..FileCounts::default()
            },
        })
    }
}

/// Scripted assistant: replies echo the query, suggestions are derived from it.
#[derive(Default)]
pub struct FakeAssistant {
    pub calls: Mutex<Vec<(String, Option<String>)>>,
    pub fail_reply: bool,
    pub fail_suggestions: bool,
}

#[async_trait]
impl Assistant for FakeAssistant {
    async fn stream_reply(
        &self,
        query: &str,
        previous_response_id: Option<&str>,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<Reply, ApiError> {
        let turn = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((query.to_string(), previous_response_id.map(str::to_string)));
            calls.len()
        };
        if self.fail_reply {
            return Err(ApiError::Stream("scripted failure".into()));
        }
        let parts = ["You asked: ", query];
        for p in parts {
            on_delta(p);
        }
        Ok(Reply {
            response_id: format!("resp_{turn}"),
            text: parts.concat(),
        })
    }

    async fn suggestions(&self, query: &str) -> Result<Suggestions, ApiError> {
        if self.fail_suggestions {
            return Err(ApiError::MissingOutput("suggestion text"));
        }
        Ok(Suggestions {
            suggestion1: format!("{query} 1"),
            suggestion2: format!("{query} 2"),
            suggestion3: format!("{query} 3"),
        })
    }
}
