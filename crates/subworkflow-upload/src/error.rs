use subworkflow_http::HttpError;

/// Errors raised by the multipart upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A session method was called out of lifecycle order.
    #[error("cannot {operation} a session in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The start response did not contain a session key.
    #[error("start response contained no session key")]
    MissingSessionKey,

    /// A chunk acknowledgment was missing its etag or part number.
    #[error("append response for {key} part {part_number} is missing etag or partNumber")]
    MissingPartAck { key: String, part_number: u32 },

    /// `append` was called with a zero-length payload.
    #[error("cannot append an empty payload")]
    EmptyPayload,

    #[error("JSON encode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Http(#[from] HttpError),
}
