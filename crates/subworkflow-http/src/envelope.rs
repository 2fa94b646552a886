use serde::Deserialize;

use crate::error::HttpError;

/// Response envelope every Subworkflow endpoint wraps its payload in.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, promoting an `error` field to `HttpError::Api`.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Api` when the envelope carries an error message,
    /// or `HttpError::MissingData` when it carries neither error nor data.
    pub fn into_data(self) -> Result<T, HttpError> {
        if let Some(message) = self.error {
            return Err(HttpError::Api(message));
        }
        self.data.ok_or(HttpError::MissingData)
    }
}
