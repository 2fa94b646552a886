//! Chunked multipart upload engine for the Subworkflow API.

#![forbid(unsafe_code)]

pub mod chunk;
mod error;
mod limit;
mod session;
mod types;

pub use error::UploadError;
pub use session::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_PART_PACING, MultipartSession, SessionState,
};
pub use types::{JobKind, StartSession, UploadedPart};

/// Result type alias using `UploadError`.
pub type Result<T> = std::result::Result<T, UploadError>;
