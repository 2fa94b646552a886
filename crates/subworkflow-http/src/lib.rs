//! HTTP transport for the Subworkflow API.

#![forbid(unsafe_code)]

mod client;
mod envelope;
mod error;

pub use client::{ApiClient, default_client};
pub use envelope::ApiEnvelope;
pub use error::HttpError;

/// Result type alias using `HttpError`.
pub type Result<T> = std::result::Result<T, HttpError>;
