/// Errors surfaced by the transport layer.
///
/// `Status` is a transport-level failure (the service did not answer with
/// 200); `Api` is an application-level failure (the service answered, but the
/// decoded envelope carries an `error` field). Callers that need to tell a
/// dead endpoint from a rejected request match on the two separately.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("response contained no data")]
    MissingData,
}
