use subworkflow_http::HttpError;
use subworkflow_upload::UploadError;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The job id does not carry the service's `dsj_` prefix.
    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    /// A status fetch came back malformed or with an error field.
    #[error("polling {job_id} failed: {reason}")]
    Polling { job_id: String, reason: String },

    /// The iteration budget ran out before a terminal status.
    #[error("job polling timed out for {job_id} after {iterations} iterations")]
    PollingTimeout { job_id: String, iterations: u32 },

    /// A terminal job did not reference a dataset.
    #[error("job {job_id} finished without a dataset id")]
    MissingDataset { job_id: String },

    /// A URL source could not be probed before submission.
    #[error("unable to fetch url metadata for {url}: {reason}")]
    UrlCheck { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Http(#[from] HttpError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
}
