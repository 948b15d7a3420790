//! azure_client.rs
//!
//! Minimal client for the Azure OpenAI data-plane REST API: files, vector
//! stores and vector store file batches.
//!
//! Assumptions:
//! - Key authentication (`api-key` header), `api-version` on every request.
//! - Sequential calls only; batching is left to the caller.
//! - List endpoints are cursor-paginated (`has_more` + `after`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use super::types::{
    DeletionStatus, FileBatch, FileObject, ListPage, UploadFile, VectorStore, VectorStoreFile,
};
use super::{ApiError, FileStore};
use crate::config::Credentials;

const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Per-request timeout for plain JSON calls.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// File uploads may carry large bodies.
const UPLOAD_TIMEOUT_SECS: u64 = 300;
const LIST_PAGE_LIMIT: u32 = 100;
const FILE_PURPOSE: &str = "assistants";

/// How long to wait between file batch status checks, and for how long overall.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Clone)]
pub struct AzureClient {
    http: reqwest::Client,
    /// Resource endpoint, e.g. https://my-resource.openai.azure.com
    base_url: String,
    api_key: String,
    api_version: String,
    poll: PollSettings,
}

impl AzureClient {
    pub fn new(credentials: &Credentials) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: credentials.endpoint.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            api_version: credentials.api_version.clone(),
            poll: PollSettings::default(),
        })
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/openai{}", self.base_url, path)
    }

    /// Authenticated, versioned request builder for `path` (relative to `/openai`).
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("api-key", &self.api_key)
            .query(&[("api-version", self.api_version.as_str())])
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, ApiError> {
        let resp = req.send().await?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Follow `has_more`/`after` until the last page.
    async fn list_all<T, F>(&self, path: &str, id_of: F) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> &str,
    {
        let mut out = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut req = self
                .request(Method::GET, path)
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .query(&[("limit", LIST_PAGE_LIMIT)]);
            if let Some(cursor) = &after {
                req = req.query(&[("after", cursor.as_str())]);
            }

            let page: ListPage<T> = self.send_json(req).await?;
            let next = next_cursor(&page, &id_of);
            debug!(path, items = page.data.len(), has_more = page.has_more, "list page");
            out.extend(page.data);

            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        Ok(out)
    }

    pub async fn upload_file(&self, file: UploadFile) -> Result<FileObject, ApiError> {
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        let form = Form::new().text("purpose", FILE_PURPOSE).part("file", part);
        let req = self
            .request(Method::POST, "/files")
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .multipart(form);
        self.send_json(req).await
    }

    pub async fn create_file_batch(
        &self,
        store_id: &str,
        file_ids: &[String],
    ) -> Result<FileBatch, ApiError> {
        let req = self
            .request(Method::POST, &format!("/vector_stores/{store_id}/file_batches"))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .json(&json!({ "file_ids": file_ids }));
        self.send_json(req).await
    }

    pub async fn retrieve_file_batch(
        &self,
        store_id: &str,
        batch_id: &str,
    ) -> Result<FileBatch, ApiError> {
        let req = self
            .request(
                Method::GET,
                &format!("/vector_stores/{store_id}/file_batches/{batch_id}"),
            )
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        self.send_json(req).await
    }

    async fn poll_file_batch(
        &self,
        store_id: &str,
        mut batch: FileBatch,
    ) -> Result<FileBatch, ApiError> {
        let started = Instant::now();
        while !batch.status.is_terminal() {
            if started.elapsed() >= self.poll.timeout {
                return Err(ApiError::PollTimeout {
                    batch_id: batch.id,
                    waited: started.elapsed(),
                });
            }
            sleep(self.poll.interval).await;
            batch = self.retrieve_file_batch(store_id, &batch.id).await?;
            debug!(batch = %batch.id, status = %batch.status, counts = %batch.file_counts, "polled file batch");
        }
        Ok(batch)
    }
}

/// Cursor for the page after `page`: `last_id`, else the ID of the last item.
/// `None` once `has_more` is false.
fn next_cursor<T>(page: &ListPage<T>, id_of: impl Fn(&T) -> &str) -> Option<String> {
    if !page.has_more {
        return None;
    }
    page.last_id
        .clone()
        .or_else(|| page.data.last().map(|item| id_of(item).to_string()))
}

/// Turn non-2xx replies into [`ApiError::Status`] carrying the body text.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

#[async_trait]
impl FileStore for AzureClient {
    async fn list_files(&self) -> Result<Vec<FileObject>, ApiError> {
        self.list_all("/files", |f: &FileObject| f.id.as_str()).await
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ApiError> {
        let req = self
            .request(Method::GET, &format!("/files/{file_id}"))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        self.send_json(req).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let req = self
            .request(Method::DELETE, &format!("/files/{file_id}"))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let status: DeletionStatus = self.send_json(req).await?;
        if !status.deleted {
            return Err(ApiError::NotDeleted(file_id.to_string()));
        }
        Ok(())
    }

    async fn create_vector_store(&self, name: &str) -> Result<VectorStore, ApiError> {
        let req = self
            .request(Method::POST, "/vector_stores")
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .json(&json!({ "name": name }));
        let store: VectorStore = self.send_json(req).await?;
        info!(store = %store.id, name, "created vector store");
        Ok(store)
    }

    async fn retrieve_vector_store(&self, store_id: &str) -> Result<VectorStore, ApiError> {
        let req = self
            .request(Method::GET, &format!("/vector_stores/{store_id}"))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        self.send_json(req).await
    }

    async fn list_vector_store_file_ids(&self, store_id: &str) -> Result<Vec<String>, ApiError> {
        let files = self
            .list_all(&format!("/vector_stores/{store_id}/files"), |f: &VectorStoreFile| {
                f.id.as_str()
            })
            .await?;
        Ok(files.into_iter().map(|f| f.id).collect())
    }

    async fn upload_and_poll(
        &self,
        store_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<FileBatch, ApiError> {
        let mut file_ids = Vec::with_capacity(files.len());
        for file in files {
            let name = file.file_name.clone();
            let uploaded = self.upload_file(file).await?;
            debug!(file = %name, id = %uploaded.id, "uploaded file");
            file_ids.push(uploaded.id);
        }

        let batch = self.create_file_batch(store_id, &file_ids).await?;
        debug!(batch = %batch.id, files = file_ids.len(), "created file batch");
        self.poll_file_batch(store_id, batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> AzureClient {
        AzureClient::new(&Credentials {
            api_key: "secret-key".into(),
            endpoint: endpoint.into(),
            api_version: "2025-03-01-preview".into(),
        })
        .unwrap()
    }

    #[test]
    fn url_strips_trailing_slash() {
        let c = client("https://res.openai.azure.com/");
        assert_eq!(c.url("/files"), "https://res.openai.azure.com/openai/files");
    }

    #[test]
    fn request_carries_key_and_version() {
        let c = client("https://res.openai.azure.com");
        let req = c
            .request(Method::GET, "/vector_stores/vs_1/files")
            .build()
            .unwrap();
        assert_eq!(req.headers()["api-key"], "secret-key");
        assert_eq!(
            req.url().as_str(),
            "https://res.openai.azure.com/openai/vector_stores/vs_1/files?api-version=2025-03-01-preview"
        );
    }

    #[test]
    fn default_poll_settings() {
        let poll = PollSettings::default();
        assert_eq!(poll.interval, Duration::from_secs(1));
        assert_eq!(poll.timeout, Duration::from_secs(1800));
    }

    mod served {
        use super::*;
        use crate::client::types::BatchStatus;
        use axum::extract::{Path, Query, State};
        use axum::routing::get;
        use axum::{Json, Router};
        use rstest::rstest;
        use serde_json::Value;
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::{Arc, Mutex};

        type SeenQueries = Arc<Mutex<Vec<HashMap<String, String>>>>;

        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}")
        }

        fn store_file(id: &str) -> VectorStoreFile {
            VectorStoreFile { id: id.into() }
        }

        #[rstest]
        #[case(false, Some("file-9"), &["file-1"], None)]
        #[case(true, Some("file-9"), &["file-1"], Some("file-9"))]
        #[case(true, None, &["file-1", "file-2"], Some("file-2"))]
        #[case(true, None, &[], None)]
        fn next_cursor_follows_has_more(
            #[case] has_more: bool,
            #[case] last_id: Option<&str>,
            #[case] ids: &[&str],
            #[case] expected: Option<&str>,
        ) {
            let page = ListPage {
                data: ids.iter().map(|id| store_file(id)).collect(),
                has_more,
                last_id: last_id.map(str::to_string),
            };
            assert_eq!(
                next_cursor(&page, |f: &VectorStoreFile| f.id.as_str()).as_deref(),
                expected
            );
        }

        async fn files_page(
            State(seen): State<SeenQueries>,
            Query(query): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            let after = query.get("after").cloned();
            seen.lock().unwrap().push(query);
            Json(match after.as_deref() {
                None => json!({
                    "data": [
                        {"id": "file-1", "filename": "a.html"},
                        {"id": "file-2", "filename": "b.html"}
                    ],
                    "has_more": true,
                    "last_id": "file-2"
                }),
                Some("file-2") => json!({
                    "data": [{"id": "file-3", "filename": "c.html"}],
                    "has_more": false
                }),
                Some(_) => json!({"data": [], "has_more": false}),
            })
        }

        #[tokio::test]
        async fn list_files_follows_cursor_across_pages() {
            let seen = SeenQueries::default();
            let app = Router::new()
                .route("/openai/files", get(files_page))
                .with_state(seen.clone());
            let c = client(&serve(app).await);

            let files = c.list_files().await.unwrap();

            let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
            assert_eq!(ids, vec!["file-1", "file-2", "file-3"]);
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0].get("limit").map(String::as_str), Some("100"));
            assert_eq!(seen[0].get("after"), None);
            assert_eq!(seen[1].get("after").map(String::as_str), Some("file-2"));
            assert_eq!(
                seen[1].get("api-version").map(String::as_str),
                Some("2025-03-01-preview")
            );
        }

        async fn store_files_page(
            Path(store_id): Path<String>,
            Query(query): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            assert_eq!(store_id, "vs_1");
            // no last_id: the cursor comes from the last item
            Json(match query.get("after").map(String::as_str) {
                None => json!({"data": [{"id": "file-1"}, {"id": "file-2"}], "has_more": true}),
                Some("file-2") => json!({"data": [{"id": "file-3"}], "has_more": false}),
                Some(_) => json!({"data": [], "has_more": false}),
            })
        }

        #[tokio::test]
        async fn store_file_listing_falls_back_to_last_item_cursor() {
            let app = Router::new().route("/openai/vector_stores/{id}/files", get(store_files_page));
            let c = client(&serve(app).await);

            let ids = c.list_vector_store_file_ids("vs_1").await.unwrap();
            assert_eq!(ids, vec!["file-1", "file-2", "file-3"]);
        }

        #[tokio::test]
        async fn missing_resource_is_a_status_error() {
            let c = client(&serve(Router::new()).await);
            let err = c.retrieve_vector_store("vs_nope").await.unwrap_err();
            assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 404));
        }

        fn batch(status: BatchStatus) -> FileBatch {
            FileBatch {
                id: "vsfb_1".into(),
                vector_store_id: Some("vs_1".into()),
                status,
                file_counts: Default::default(),
            }
        }

        #[tokio::test]
        async fn polls_until_batch_leaves_in_progress() {
            let calls = Arc::new(AtomicUsize::new(0));
            let app = Router::new()
                .route(
                    "/openai/vector_stores/{store}/file_batches/{batch}",
                    get(|State(calls): State<Arc<AtomicUsize>>| async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        let status = if n < 3 { "in_progress" } else { "completed" };
                        Json(json!({"id": "vsfb_1", "status": status}))
                    }),
                )
                .with_state(calls.clone());
            let c = client(&serve(app).await).with_poll_settings(PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::from_secs(10),
            });

            let done = c
                .poll_file_batch("vs_1", batch(BatchStatus::InProgress))
                .await
                .unwrap();
            assert_eq!(done.status, BatchStatus::Completed);
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn zero_timeout_gives_up_on_unfinished_batch() {
            let c = client("http://127.0.0.1:9").with_poll_settings(PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::ZERO,
            });
            let err = c
                .poll_file_batch("vs_1", batch(BatchStatus::InProgress))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::PollTimeout { ref batch_id, .. } if batch_id == "vsfb_1"));
        }

        #[tokio::test]
        async fn finished_batch_is_not_polled() {
            let c = client("http://127.0.0.1:9").with_poll_settings(PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::ZERO,
            });
            let done = c
                .poll_file_batch("vs_1", batch(BatchStatus::Failed))
                .await
                .unwrap();
            assert_eq!(done.status, BatchStatus::Failed);
        }
    }
}
