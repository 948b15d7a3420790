use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::Stream;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::azure_client::{AzureClient, check_status};
use super::sse::SseDecoder;
use super::types::{Reply, Suggestions};
use super::{ApiError, Assistant};

const SUGGESTIONS_INSTRUCTION: &str =
    "Give next 3 probable queries based on the provided user query in the structured format.";

/// Responses API bound to one model deployment and one vector store.
pub struct ResponsesClient {
    azure: AzureClient,
    model: String,
    vector_store_id: String,
}

// -------- wire types --------

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponseObject },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.completed")]
    Completed { response: ResponseObject },
    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponseObject },
    #[serde(rename = "response.failed")]
    Failed { response: ResponseObject },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ResponseObject {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum OutputItem {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum OutputContent {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(rename = "refusal")]
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

impl ResponseObject {
    /// Concatenated text of every `output_text` part, in order.
    pub fn output_text(&self) -> String {
        let mut text = String::new();
        for item in &self.output {
            if let OutputItem::Message { content } = item {
                for part in content {
                    if let OutputContent::OutputText { text: t } = part {
                        text.push_str(t);
                    }
                }
            }
        }
        text
    }

    pub fn refusal(&self) -> Option<&str> {
        self.output.iter().find_map(|item| match item {
            OutputItem::Message { content } => content.iter().find_map(|part| match part {
                OutputContent::Refusal { refusal } => Some(refusal.as_str()),
                _ => None,
            }),
            OutputItem::Other => None,
        })
    }

    fn failure_message(&self) -> String {
        match &self.error {
            Some(e) => match &e.code {
                Some(code) => format!("{code}: {}", e.message),
                None => e.message.clone(),
            },
            None => format!(
                "response {} ended with status {}",
                self.id,
                self.status.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

// -------- client --------

impl ResponsesClient {
    pub fn new<S: Into<String>>(azure: AzureClient, model: S, vector_store_id: S) -> Self {
        Self {
            azure,
            model: model.into(),
            vector_store_id: vector_store_id.into(),
        }
    }

    fn file_search_tool(&self) -> Value {
        json!({
            "type": "file_search",
            "vector_store_ids": [self.vector_store_id]
        })
    }

    fn stream_body(&self, query: &str, previous_response_id: Option<&str>) -> Value {
        json!({
            "model": self.model,
            "input": query,
            "tools": [self.file_search_tool()],
            "previous_response_id": previous_response_id,
            "stream": true
        })
    }

    fn suggestions_body(&self, query: &str) -> Value {
        json!({
            "model": self.model,
            "input": [
                { "role": "system", "content": SUGGESTIONS_INSTRUCTION },
                { "role": "user", "content": query }
            ],
            "tools": [self.file_search_tool()],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "suggestions",
                    "strict": true,
                    "schema": suggestions_schema()
                }
            }
        })
    }

    /// Server-sent events of one streamed response, decoded.
    pub fn stream_response<'a>(
        &'a self,
        query: &'a str,
        previous_response_id: Option<&'a str>,
    ) -> impl Stream<Item = Result<StreamEvent, ApiError>> + Send + 'a {
        try_stream! {
            let body = self.stream_body(query, previous_response_id);
            let resp = self
                .azure
                .request(Method::POST, "/responses")
                .header("Accept", "text/event-stream")
                .json(&body)
                .send()
                .await?;
            let resp = check_status(resp).await?;

            let mut bytes = resp.bytes_stream();
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for data in decoder.feed(&chunk) {
                    let event: StreamEvent = serde_json::from_str(&data)?;
                    yield event;
                }
            }
            if let Some(data) = decoder.finish() {
                let event: StreamEvent = serde_json::from_str(&data)?;
                yield event;
            }
        }
    }
}

fn suggestions_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "suggestion1": { "type": "string" },
            "suggestion2": { "type": "string" },
            "suggestion3": { "type": "string" }
        },
        "required": ["suggestion1", "suggestion2", "suggestion3"],
        "additionalProperties": false
    })
}

fn parse_suggestions(response: &ResponseObject) -> Result<Suggestions, ApiError> {
    if let Some(refusal) = response.refusal() {
        return Err(ApiError::Stream(format!("suggestions refused: {refusal}")));
    }
    let text = response.output_text();
    if text.trim().is_empty() {
        return Err(ApiError::MissingOutput("suggestion text"));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Fold a stream of events into a [`Reply`], forwarding deltas as they arrive.
async fn collect_reply<S>(
    stream: S,
    on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
) -> Result<Reply, ApiError>
where
    S: Stream<Item = Result<StreamEvent, ApiError>> + Send,
{
    tokio::pin!(stream);

    let mut text = String::new();
    let mut response_id: Option<String> = None;
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Created { response } => {
                debug!(response = %response.id, "response created");
                response_id = Some(response.id);
            }
            StreamEvent::OutputTextDelta { delta } => {
                on_delta(&delta);
                text.push_str(&delta);
            }
            StreamEvent::Completed { response } => {
                // some deployments skip deltas and only send the final object
                if text.is_empty() {
                    text = response.output_text();
                    if !text.is_empty() {
                        on_delta(&text);
                    }
                }
                response_id = Some(response.id);
            }
            StreamEvent::Incomplete { response } => {
                warn!(response = %response.id, "response ended incomplete");
                response_id = Some(response.id);
            }
            StreamEvent::Failed { response } => {
                return Err(ApiError::Stream(response.failure_message()));
            }
            StreamEvent::Error { message } => return Err(ApiError::Stream(message)),
            StreamEvent::Other => {}
        }
    }

    let response_id = response_id.ok_or(ApiError::MissingOutput("response id"))?;
    Ok(Reply { response_id, text })
}

#[async_trait]
impl Assistant for ResponsesClient {
    async fn stream_reply(
        &self,
        query: &str,
        previous_response_id: Option<&str>,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<Reply, ApiError> {
        collect_reply(self.stream_response(query, previous_response_id), on_delta).await
    }

    async fn suggestions(&self, query: &str) -> Result<Suggestions, ApiError> {
        let req = self
            .azure
            .request(Method::POST, "/responses")
            .json(&self.suggestions_body(query));
        let response: ResponseObject = self.azure.send_json(req).await?;
        parse_suggestions(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use futures_util::stream;

    fn responses_client() -> ResponsesClient {
        let azure = AzureClient::new(&Credentials {
            api_key: "k".into(),
            endpoint: "https://res.openai.azure.com".into(),
            api_version: "2025-03-01-preview".into(),
        })
        .unwrap();
        ResponsesClient::new(azure, "gpt-4o-mini", "vs_123")
    }

    fn events(raw: &[&str]) -> Vec<Result<StreamEvent, ApiError>> {
        raw.iter()
            .map(|r| serde_json::from_str::<StreamEvent>(r).map_err(ApiError::from))
            .collect()
    }

    #[test]
    fn stream_body_binds_store_and_previous_response() {
        let body = responses_client().stream_body("how do I reset?", Some("resp_1"));
        assert_eq!(body["stream"], true);
        assert_eq!(body["previous_response_id"], "resp_1");
        assert_eq!(body["tools"][0]["vector_store_ids"][0], "vs_123");

        let first_turn = responses_client().stream_body("hi", None);
        assert!(first_turn["previous_response_id"].is_null());
    }

    #[test]
    fn suggestions_body_requests_strict_schema() {
        let body = responses_client().suggestions_body("q");
        assert_eq!(body["input"][0]["role"], "system");
        assert_eq!(body["input"][1]["content"], "q");
        assert_eq!(body["text"]["format"]["strict"], true);
        assert_eq!(
            body["text"]["format"]["schema"]["required"],
            json!(["suggestion1", "suggestion2", "suggestion3"])
        );
    }

    #[test]
    fn unknown_events_are_tolerated() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type": "response.file_search_call.searching", "item_id": "x"}"#)
                .unwrap();
        assert!(matches!(ev, StreamEvent::Other));
    }

    #[test]
    fn parses_suggestions_from_output_text() {
        let response: ResponseObject = serde_json::from_str(
            r#"{
                "id": "resp_9",
                "status": "completed",
                "output": [
                    {"type": "file_search_call", "id": "fs_1"},
                    {"type": "message", "content": [
                        {"type": "output_text", "text": "{\"suggestion1\":\"a\",\"suggestion2\":\"b\",\"suggestion3\":\"c\"}", "annotations": []}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        let s = parse_suggestions(&response).unwrap();
        assert_eq!(s.into_array(), ["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn empty_output_is_missing_suggestions() {
        let response: ResponseObject =
            serde_json::from_str(r#"{"id": "resp_1", "output": []}"#).unwrap();
        assert!(matches!(
            parse_suggestions(&response),
            Err(ApiError::MissingOutput(_))
        ));
    }

    #[tokio::test]
    async fn collects_deltas_and_response_id() {
        let evs = events(&[
            r#"{"type": "response.created", "response": {"id": "resp_7", "status": "in_progress"}}"#,
            r#"{"type": "response.output_text.delta", "delta": "Hel", "item_id": "m1"}"#,
            r#"{"type": "response.output_text.delta", "delta": "lo", "item_id": "m1"}"#,
            r#"{"type": "response.completed", "response": {"id": "resp_7", "status": "completed"}}"#,
        ]);
        let mut seen = Vec::new();
        let reply = collect_reply(stream::iter(evs), &mut |d: &str| seen.push(d.to_string()))
            .await
            .unwrap();
        assert_eq!(reply.response_id, "resp_7");
        assert_eq!(reply.text, "Hello");
        assert_eq!(seen, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn failed_response_is_an_error() {
        let evs = events(&[
            r#"{"type": "response.created", "response": {"id": "resp_8"}}"#,
            r#"{"type": "response.failed", "response": {"id": "resp_8", "status": "failed", "error": {"code": "server_error", "message": "boom"}}}"#,
        ]);
        let err = collect_reply(stream::iter(evs), &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Stream(m) if m == "server_error: boom"));
    }

    #[tokio::test]
    async fn stream_without_response_id_is_an_error() {
        let evs = events(&[r#"{"type": "response.output_text.delta", "delta": "x"}"#]);
        let err = collect_reply(stream::iter(evs), &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingOutput("response id")));
    }
}
