//! Rust client for the Subworkflow document extraction and vectorization
//! API.
//!
//! Files or URLs are submitted for extraction or vectorization, server-side
//! jobs are polled to completion, and the resulting datasets can be fetched,
//! queried, and searched. Large payloads go through a chunked multipart
//! upload session transparently.

#![forbid(unsafe_code)]

mod client;
mod datasets;
mod error;
mod jobs;
mod search;
mod types;
mod upload;

pub use client::Subworkflow;
pub use datasets::{DatasetItemsQuery, DatasetsApi};
pub use error::ClientError;
pub use jobs::{JobListQuery, JobsApi};
pub use search::{SearchQuery, SearchRequest};
pub use types::{Dataset, DatasetItem, Job, JobStatus, ShareLink};
pub use upload::{MULTIPART_THRESHOLD, UploadOptions, UploadSource};

pub use subworkflow_http::{ApiClient, ApiEnvelope, HttpError, default_client};
pub use subworkflow_upload::{
    JobKind, MultipartSession, SessionState, StartSession, UploadError, UploadedPart,
};

/// Result type alias using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;
