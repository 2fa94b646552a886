//! Multipart upload session against the `/upload_session` endpoints.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use subworkflow_http::{ApiClient, ApiEnvelope};

use crate::chunk;
use crate::error::UploadError;
use crate::limit::join_limited;
use crate::types::{StartSession, UploadedPart};

/// Chunk size used when the caller does not pick one (10 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;
/// Number of chunk uploads allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Delay applied before each chunk upload.
pub const DEFAULT_PART_PACING: Duration = Duration::from_millis(100);

/// Lifecycle of one multipart session.
///
/// Every operation checks the state explicitly, so illegal call orders fail
/// with `UploadError::InvalidState` instead of silently passing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    /// A start call succeeded; `key` is the server-side handle.
    Started { key: String },
    Ended,
    Aborted,
}

impl SessionState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Started { .. } => "started",
            Self::Ended => "ended",
            Self::Aborted => "aborted",
        }
    }
}

/// Driver for one chunked upload: start, append payloads, then end or
/// abort.
///
/// Chunks of a payload are submitted in ascending part-number order under a
/// bounded concurrency limit; completion order is unconstrained, so the
/// accumulated part list is re-sorted before finalization. Part numbers
/// continue across `append` calls, keeping the finalized list dense from 1.
#[derive(Debug)]
pub struct MultipartSession {
    api: ApiClient,
    state: SessionState,
    parts: Vec<UploadedPart>,
    chunk_size: u64,
    concurrency: usize,
    part_pacing: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct StartAck {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartAck {
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    part_number: Option<u32>,
}

impl MultipartSession {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: SessionState::Unstarted,
            parts: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            part_pacing: DEFAULT_PART_PACING,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Delay applied before each chunk upload. Set to zero in tests.
    #[must_use]
    pub fn with_part_pacing(mut self, pacing: Duration) -> Self {
        self.part_pacing = pacing;
        self
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The server-issued session key, while one is held.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match &self.state {
            SessionState::Started { key } => Some(key),
            _ => None,
        }
    }

    /// Parts acknowledged so far, in completion order.
    #[must_use]
    pub fn parts(&self) -> &[UploadedPart] {
        &self.parts
    }

    /// Open a session, storing the returned key and resetting the part
    /// list.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::MissingSessionKey` when the response lacks a
    /// key, or a transport error.
    pub async fn start(&mut self, request: &StartSession) -> Result<(), UploadError> {
        let mut form = Form::new()
            .text("fileName", request.file_name.clone())
            .text("fileExt", request.file_ext.clone())
            .text("fileType", request.file_type.clone())
            .text("jobType", request.job_type.as_str());
        if let Some(days) = request.expiry_in_days {
            form = form.text("expiryInDays", days.to_string());
        }

        let envelope: ApiEnvelope<StartAck> =
            self.api.post_form("/upload_session/start", form).await?;
        let key = envelope
            .data
            .and_then(|ack| ack.key)
            .filter(|key| !key.is_empty())
            .ok_or(UploadError::MissingSessionKey)?;

        tracing::debug!(key = %key, "upload session started");
        self.parts.clear();
        self.state = SessionState::Started { key };
        Ok(())
    }

    /// Upload a payload as chunks under the concurrency limit.
    ///
    /// Chunks are submitted in ascending part-number order; each successful
    /// acknowledgment is accumulated for the finalize call. The first chunk
    /// failure fails the whole append once its in-flight siblings have
    /// drained.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidState` outside the started state,
    /// `UploadError::EmptyPayload` for a zero-length payload,
    /// `UploadError::MissingPartAck` when an acknowledgment is incomplete,
    /// or a transport error.
    pub async fn append(&mut self, payload: Bytes) -> Result<(), UploadError> {
        let SessionState::Started { key } = &self.state else {
            return Err(UploadError::InvalidState {
                operation: "append",
                state: self.state.name(),
            });
        };
        if payload.is_empty() {
            return Err(UploadError::EmptyPayload);
        }

        let chunks = chunk::plan(payload.len() as u64, self.chunk_size);
        let base = u32::try_from(self.parts.len()).unwrap_or(u32::MAX);
        tracing::debug!(
            key = %key,
            chunk_count = chunks.len(),
            total_bytes = payload.len(),
            "appending payload"
        );

        let tasks: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                send_chunk(
                    &self.api,
                    key,
                    base + chunk.part_number,
                    payload.slice(chunk.range()),
                    self.part_pacing,
                )
            })
            .collect();

        let outcomes = join_limited(self.concurrency, tasks).await;
        for outcome in outcomes {
            self.parts.push(outcome?);
        }
        Ok(())
    }

    /// Finalize the session, handing the server the sorted part list.
    ///
    /// Once the finalize request has been answered the key is considered
    /// consumed: the session transitions to ended and the part list is
    /// cleared even when the returned envelope carries an `error` field.
    /// The raw envelope is returned so the caller can judge the outcome.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidState` outside the started state, or a
    /// transport error (which leaves the session started so the caller can
    /// abort).
    pub async fn end<T: DeserializeOwned>(&mut self) -> Result<ApiEnvelope<T>, UploadError> {
        let SessionState::Started { key } = &self.state else {
            return Err(UploadError::InvalidState {
                operation: "end",
                state: self.state.name(),
            });
        };

        let mut parts = self.parts.clone();
        parts.sort_by_key(|part| part.part_number);
        let form = Form::new()
            .text("key", key.clone())
            .text("parts", serde_json::to_string(&parts)?);

        let envelope = self.api.post_form("/upload_session/end", form).await?;
        self.state = SessionState::Ended;
        self.parts.clear();
        Ok(envelope)
    }

    /// Best-effort release of the server-side session.
    ///
    /// Without an active key this is a no-op with a warning: abort usually
    /// runs from cleanup paths where the session may already be finished.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the abort notification fails; the
    /// session is already marked aborted at that point.
    pub async fn abort(&mut self) -> Result<(), UploadError> {
        let SessionState::Started { key } = &self.state else {
            tracing::warn!(
                state = self.state.name(),
                "abort requested without an active upload session"
            );
            return Ok(());
        };

        let key = key.clone();
        self.state = SessionState::Aborted;
        self.parts.clear();

        let form = Form::new().text("key", key);
        let _: ApiEnvelope<serde_json::Value> =
            self.api.post_form("/upload_session/abort", form).await?;
        Ok(())
    }
}

async fn send_chunk(
    api: &ApiClient,
    key: &str,
    part_number: u32,
    data: Bytes,
    pacing: Duration,
) -> Result<UploadedPart, UploadError> {
    if !pacing.is_zero() {
        tokio::time::sleep(pacing).await;
    }

    let len = data.len() as u64;
    let file = Part::stream_with_length(reqwest::Body::from(data), len)
        .file_name(format!("{key}_{part_number}"));
    let form = Form::new()
        .text("key", key.to_owned())
        .text("partNumber", part_number.to_string())
        .part("file", file);

    let envelope: ApiEnvelope<PartAck> = api.post_form("/upload_session/append", form).await?;
    let ack = envelope.data.unwrap_or_default();
    match (ack.etag, ack.part_number) {
        (Some(etag), Some(acked)) if !etag.is_empty() && acked > 0 => Ok(UploadedPart {
            etag,
            part_number: acked,
        }),
        _ => {
            tracing::warn!(key = %key, part_number, "append acknowledgment incomplete");
            Err(UploadError::MissingPartAck {
                key: key.to_owned(),
                part_number,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use subworkflow_http::default_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;

    fn session_for(server: &MockServer) -> MultipartSession {
        let api = ApiClient::new(default_client(), server.uri(), "test-key");
        MultipartSession::new(api).with_part_pacing(Duration::ZERO)
    }

    async fn mount_start(server: &MockServer, key: &str) {
        Mock::given(method("POST"))
            .and(path("/upload_session/start"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "data": { "key": key } })),
            )
            .mount(server)
            .await;
    }

    fn start_request() -> StartSession {
        StartSession {
            file_name: "report".to_owned(),
            file_ext: "pdf".to_owned(),
            file_type: "application/pdf".to_owned(),
            job_type: crate::types::JobKind::Extract,
            expiry_in_days: Some(90),
        }
    }

    /// Pull a text field's value out of a multipart body.
    fn form_value(body: &[u8], field: &str) -> Option<String> {
        let body = String::from_utf8_lossy(body);
        let marker = format!("name=\"{field}\"");
        let at = body.find(&marker)?;
        let rest = &body[at + marker.len()..];
        let start = rest.find("\r\n\r\n")? + 4;
        let end = rest[start..].find("\r\n")? + start;
        Some(rest[start..end].to_owned())
    }

    /// Acknowledge each chunk with an etag derived from its part number.
    struct EchoPartAck;

    impl Respond for EchoPartAck {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let part_number = form_value(&request.body, "partNumber")
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(0);
            ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "etag": format!("etag-{part_number}"), "partNumber": part_number }
            }))
        }
    }

    #[tokio::test]
    async fn start_stores_the_session_key() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;

        let mut session = session_for(&server);
        session.start(&start_request()).await.unwrap();
        assert_eq!(session.key(), Some("sess_1"));
        assert_eq!(session.state().name(), "started");
        assert!(session.parts().is_empty());
    }

    #[tokio::test]
    async fn start_without_key_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_session/start"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": {} })),
            )
            .mount(&server)
            .await;

        let mut session = session_for(&server);
        let result = session.start(&start_request()).await;
        assert!(matches!(result, Err(UploadError::MissingSessionKey)));
        assert_eq!(session.state().name(), "unstarted");
    }

    #[tokio::test]
    async fn append_before_start_is_an_invalid_state() {
        let server = MockServer::start().await;
        let mut session = session_for(&server);
        let result = session.append(Bytes::from_static(b"data")).await;
        match result {
            Err(UploadError::InvalidState { operation, state }) => {
                assert_eq!(operation, "append");
                assert_eq!(state, "unstarted");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_rejects_an_empty_payload() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;

        let mut session = session_for(&server);
        session.start(&start_request()).await.unwrap();
        let result = session.append(Bytes::new()).await;
        assert!(matches!(result, Err(UploadError::EmptyPayload)));
    }

    #[tokio::test]
    async fn parts_accumulate_across_appends_and_end_sorts_them() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;
        Mock::given(method("POST"))
            .and(path("/upload_session/append"))
            .respond_with(EchoPartAck)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload_session/end"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "id": "dsj_1", "status": "PENDING" }
            })))
            .mount(&server)
            .await;

        let mut session = session_for(&server).with_chunk_size(4);
        session.start(&start_request()).await.unwrap();
        session.append(Bytes::from_static(b"abcdefghij")).await.unwrap();
        session.append(Bytes::from_static(b"klmno")).await.unwrap();
        assert_eq!(session.parts().len(), 5);

        let envelope: ApiEnvelope<serde_json::Value> = session.end().await.unwrap();
        assert!(envelope.error.is_none());
        assert_eq!(session.state().name(), "ended");
        assert_eq!(session.key(), None);
        assert!(session.parts().is_empty());

        let requests = server.received_requests().await.unwrap();
        let end = requests
            .iter()
            .find(|request| request.url.path() == "/upload_session/end")
            .expect("end request must be sent");
        let parts = form_value(&end.body, "parts").unwrap();
        let expected: String = serde_json::to_string(
            &(1..=5u32)
                .map(|n| UploadedPart {
                    etag: format!("etag-{n}"),
                    part_number: n,
                })
                .collect::<Vec<_>>(),
        )
        .unwrap();
        assert_eq!(parts, expected);
    }

    #[tokio::test]
    async fn chunk_filenames_derive_from_key_and_part_number() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_9").await;
        Mock::given(method("POST"))
            .and(path("/upload_session/append"))
            .respond_with(EchoPartAck)
            .mount(&server)
            .await;

        let mut session = session_for(&server).with_chunk_size(16);
        session.start(&start_request()).await.unwrap();
        session.append(Bytes::from_static(b"payload")).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let append = requests
            .iter()
            .find(|request| request.url.path() == "/upload_session/append")
            .unwrap();
        let body = String::from_utf8_lossy(&append.body);
        assert!(body.contains("filename=\"sess_9_1\""));
        assert_eq!(form_value(&append.body, "key").unwrap(), "sess_9");
    }

    #[tokio::test]
    async fn incomplete_part_ack_fails_the_append() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;
        Mock::given(method("POST"))
            .and(path("/upload_session/append"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "partNumber": 1 }
            })))
            .mount(&server)
            .await;

        let mut session = session_for(&server);
        session.start(&start_request()).await.unwrap();
        let result = session.append(Bytes::from_static(b"data")).await;
        match result {
            Err(UploadError::MissingPartAck { key, part_number }) => {
                assert_eq!(key, "sess_1");
                assert_eq!(part_number, 1);
            }
            other => panic!("expected MissingPartAck, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn end_consumes_the_key_even_on_an_error_envelope() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;
        Mock::given(method("POST"))
            .and(path("/upload_session/end"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "assembly failed"
            })))
            .mount(&server)
            .await;

        let mut session = session_for(&server);
        session.start(&start_request()).await.unwrap();
        let envelope: ApiEnvelope<serde_json::Value> = session.end().await.unwrap();
        assert_eq!(envelope.error.as_deref(), Some("assembly failed"));
        assert_eq!(session.state().name(), "ended");
        assert_eq!(session.key(), None);

        let again: Result<ApiEnvelope<serde_json::Value>, _> = session.end().await;
        assert!(matches!(again, Err(UploadError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn abort_without_a_key_is_a_warning_noop() {
        let server = MockServer::start().await;
        let mut session = session_for(&server);
        session.abort().await.unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn abort_releases_an_active_session() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;
        Mock::given(method("POST"))
            .and(path("/upload_session/abort"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session_for(&server);
        session.start(&start_request()).await.unwrap();
        session.abort().await.unwrap();
        assert_eq!(session.state().name(), "aborted");

        let result = session.append(Bytes::from_static(b"data")).await;
        match result {
            Err(UploadError::InvalidState { state, .. }) => assert_eq!(state, "aborted"),
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_during_append_propagates() {
        let server = MockServer::start().await;
        mount_start(&server, "sess_1").await;
        Mock::given(method("POST"))
            .and(path("/upload_session/append"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let mut session = session_for(&server);
        session.start(&start_request()).await.unwrap();
        let result = session.append(Bytes::from_static(b"data")).await;
        assert!(matches!(result, Err(UploadError::Http(_))));
        // the session still holds its key; the caller decides whether to abort
        assert_eq!(session.key(), Some("sess_1"));
    }
}
