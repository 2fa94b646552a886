//! File and URL ingestion: direct uploads, the multipart threshold, and
//! size-derived polling budgets.

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use url::Url;

use subworkflow_http::{ApiEnvelope, HttpError};
use subworkflow_upload::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, JobKind, MultipartSession, StartSession,
};

use crate::client::Subworkflow;
use crate::error::ClientError;
use crate::types::{Dataset, Job};

/// Payloads larger than this go through the multipart session flow.
pub const MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Poll iterations granted per MiB of uploaded payload.
const POLL_BUDGET_PER_MIB: u32 = 45;
/// Lower bound so small files still get a useful polling window.
const MIN_POLL_BUDGET: u32 = 15;
/// Budget when the payload size is unknown (URL ingestion without a probe).
const UNKNOWN_SIZE_POLL_BUDGET: u32 = 500;
/// Session uploads always carry an expiry; this is the service default.
const DEFAULT_SESSION_EXPIRY_DAYS: u32 = 90;

/// Payload handed to `extract`/`vectorize`: raw bytes or a fetchable URL.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes { data: Bytes, mime_type: String },
    Url(Url),
}

impl UploadSource {
    /// An in-memory payload with the generic binary MIME type.
    #[must_use]
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::bytes_with_mime(data, "application/octet-stream")
    }

    /// An in-memory payload with an explicit MIME type.
    #[must_use]
    pub fn bytes_with_mime(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Read a file from disk into an in-memory payload.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` when the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let data = tokio::fs::read(path).await?;
        Ok(Self::bytes(data))
    }
}

/// Per-call options for `extract`/`vectorize`.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub file_name: String,
    pub expiry_in_days: Option<u32>,
    pub chunk_size: u64,
    pub concurrency: usize,
    pub skip_url_check: bool,
}

impl UploadOptions {
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            expiry_in_days: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            skip_url_check: false,
        }
    }

    /// Days until the produced dataset expires.
    #[must_use]
    pub fn with_expiry_in_days(mut self, days: u32) -> Self {
        self.expiry_in_days = Some(days);
        self
    }

    /// Chunk size for the multipart flow.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// In-flight limit for chunk uploads of the multipart flow.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    /// Submit URL sources without probing them first.
    #[must_use]
    pub fn skip_url_check(mut self) -> Self {
        self.skip_url_check = true;
        self
    }
}

impl Subworkflow {
    /// Extract a document into a dataset, waiting for the job to finish.
    ///
    /// # Errors
    ///
    /// Returns an upload, polling, or transport error; `MissingDataset`
    /// when the finished job references no dataset.
    pub async fn extract(
        &self,
        source: UploadSource,
        opts: &UploadOptions,
    ) -> Result<Dataset, ClientError> {
        self.ingest(JobKind::Extract, source, opts).await
    }

    /// Extract and vectorize a document, waiting for the job to finish.
    ///
    /// # Errors
    ///
    /// Returns an upload, polling, or transport error; `MissingDataset`
    /// when the finished job references no dataset.
    pub async fn vectorize(
        &self,
        source: UploadSource,
        opts: &UploadOptions,
    ) -> Result<Dataset, ClientError> {
        self.ingest(JobKind::Vectorize, source, opts).await
    }

    /// Submit an extract job without waiting for completion.
    ///
    /// # Errors
    ///
    /// Returns an upload or transport error.
    pub async fn extract_job(
        &self,
        source: UploadSource,
        opts: &UploadOptions,
    ) -> Result<Job, ClientError> {
        let (job, _) = self.submit(JobKind::Extract, source, opts).await?;
        Ok(job)
    }

    /// Submit a vectorize job without waiting for completion.
    ///
    /// # Errors
    ///
    /// Returns an upload or transport error.
    pub async fn vectorize_job(
        &self,
        source: UploadSource,
        opts: &UploadOptions,
    ) -> Result<Job, ClientError> {
        let (job, _) = self.submit(JobKind::Vectorize, source, opts).await?;
        Ok(job)
    }

    async fn ingest(
        &self,
        kind: JobKind,
        source: UploadSource,
        opts: &UploadOptions,
    ) -> Result<Dataset, ClientError> {
        let (job, size) = self.submit(kind, source, opts).await?;
        let finished = self.jobs.poll(&job.id, poll_budget(size)).await?;
        let dataset_id = finished
            .dataset_id
            .clone()
            .ok_or(ClientError::MissingDataset {
                job_id: finished.id,
            })?;
        self.datasets.get(&dataset_id, None).await
    }

    async fn submit(
        &self,
        kind: JobKind,
        source: UploadSource,
        opts: &UploadOptions,
    ) -> Result<(Job, Option<u64>), ClientError> {
        match source {
            UploadSource::Bytes { data, mime_type } => {
                let size = data.len() as u64;
                let job = if size > MULTIPART_THRESHOLD {
                    self.upload_session(kind, data, &mime_type, opts).await?
                } else {
                    self.upload_direct(kind, data, &mime_type, opts).await?
                };
                Ok((job, Some(size)))
            }
            UploadSource::Url(url) => {
                let size = if opts.skip_url_check {
                    None
                } else {
                    self.probe_url(&url).await?
                };
                let job = self.submit_url(kind, &url, opts).await?;
                Ok((job, size))
            }
        }
    }

    /// Drive one multipart session to a job, aborting it on append failure.
    async fn upload_session(
        &self,
        kind: JobKind,
        data: Bytes,
        mime_type: &str,
        opts: &UploadOptions,
    ) -> Result<Job, ClientError> {
        let (stem, ext) = split_file_name(&opts.file_name);
        let mut session = MultipartSession::new(self.api.clone())
            .with_chunk_size(opts.chunk_size)
            .with_concurrency(opts.concurrency)
            .with_part_pacing(self.part_pacing);

        session
            .start(&StartSession {
                file_name: stem,
                file_ext: ext,
                file_type: mime_type.to_owned(),
                job_type: kind,
                expiry_in_days: Some(
                    opts.expiry_in_days.unwrap_or(DEFAULT_SESSION_EXPIRY_DAYS),
                ),
            })
            .await?;

        if let Err(append_err) = session.append(data).await {
            if let Err(abort_err) = session.abort().await {
                tracing::warn!("failed to abort upload session: {abort_err}");
            }
            return Err(append_err.into());
        }

        let envelope: ApiEnvelope<Job> = session.end().await?;
        envelope.into_data().map_err(ClientError::Http)
    }

    async fn upload_direct(
        &self,
        kind: JobKind,
        data: Bytes,
        mime_type: &str,
        opts: &UploadOptions,
    ) -> Result<Job, ClientError> {
        let mut form = Form::new();
        if let Some(days) = opts.expiry_in_days {
            form = form.text("expiryInDays", days.to_string());
        }
        let len = data.len() as u64;
        let file = Part::stream_with_length(reqwest::Body::from(data), len)
            .file_name(opts.file_name.clone())
            .mime_str(mime_type)
            .map_err(HttpError::Request)?;
        form = form.part("file", file);

        let envelope: ApiEnvelope<Job> = self
            .api
            .post_form(&format!("/{}", kind.as_str()), form)
            .await?;
        envelope.into_data().map_err(ClientError::Http)
    }

    async fn submit_url(
        &self,
        kind: JobKind,
        url: &Url,
        opts: &UploadOptions,
    ) -> Result<Job, ClientError> {
        let mut form = Form::new();
        if let Some(days) = opts.expiry_in_days {
            form = form.text("expiryInDays", days.to_string());
        }
        form = form.text("url", url.to_string());

        let envelope: ApiEnvelope<Job> = self
            .api
            .post_form(&format!("/{}", kind.as_str()), form)
            .await?;
        envelope.into_data().map_err(ClientError::Http)
    }

    /// HEAD the source URL to confirm it is reachable and learn its size.
    async fn probe_url(&self, url: &Url) -> Result<Option<u64>, ClientError> {
        let response = self
            .api
            .http()
            .head(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::UrlCheck {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ClientError::UrlCheck {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.content_length())
    }
}

/// Split a file name into the stem and extension the start endpoint wants.
fn split_file_name(file_name: &str) -> (String, String) {
    let path = Path::new(file_name);
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_owned();
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_owned();
    (stem, ext)
}

/// Iteration budget for polling an upload's job: proportional to payload
/// size, floored so small files are not starved, generous when the size is
/// unknown.
fn poll_budget(size: Option<u64>) -> u32 {
    match size {
        Some(bytes) => {
            // round to the nearest MiB before scaling
            let mib = u32::try_from((bytes + (1 << 19)) >> 20).unwrap_or(u32::MAX);
            mib.saturating_mul(POLL_BUDGET_PER_MIB).max(MIN_POLL_BUDGET)
        }
        None => UNKNOWN_SIZE_POLL_BUDGET,
    }
}
