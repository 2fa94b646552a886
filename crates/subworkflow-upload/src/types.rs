use serde::{Deserialize, Serialize};

/// Processing pipeline a payload is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Extract,
    Vectorize,
}

impl JobKind {
    /// Wire name, also the route of the direct (non-chunked) upload
    /// endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Vectorize => "vectorize",
        }
    }
}

/// Metadata sent when opening an upload session.
#[derive(Debug, Clone)]
pub struct StartSession {
    pub file_name: String,
    pub file_ext: String,
    pub file_type: String,
    pub job_type: JobKind,
    pub expiry_in_days: Option<u32>,
}

/// One acknowledged chunk upload. Immutable once the server has answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    pub etag: String,
    pub part_number: u32,
}
