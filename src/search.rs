//! Vector search across vectorized datasets.

use serde::Serialize;

use subworkflow_http::{ApiClient, ApiEnvelope};

use crate::error::ClientError;
use crate::types::DatasetItem;

/// What to search for: plain text, or text plus an image reference.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchQuery {
    Text(String),
    TextAndImage {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
    },
}

impl From<&str> for SearchQuery {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for SearchQuery {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Body of a search call. Sent as JSON, unlike the form-based upload
/// endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: SearchQuery,
    pub dataset_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_in_seconds: Option<u64>,
}

impl SearchRequest {
    /// Search `dataset_ids` for `query` with no extra filters.
    #[must_use]
    pub fn new(query: impl Into<SearchQuery>, dataset_ids: Vec<String>) -> Self {
        Self {
            query: query.into(),
            dataset_ids,
            sort: Vec::new(),
            offset: None,
            limit: None,
            expiry_in_seconds: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SearchApi {
    api: ApiClient,
}

impl SearchApi {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub(crate) async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<DatasetItem>, ClientError> {
        let envelope: ApiEnvelope<Vec<DatasetItem>> =
            self.api.post_json("/search", request).await?;
        Ok(envelope.into_data()?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_query_serializes_as_a_bare_string() {
        let request = SearchRequest::new("what is 4?", vec!["ds_1".to_owned()]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({ "query": "what is 4?", "datasetIds": ["ds_1"] })
        );
    }

    #[test]
    fn image_query_serializes_as_an_object() {
        let request = SearchRequest {
            query: SearchQuery::TextAndImage {
                text: "similar diagrams".to_owned(),
                image_url: Some("https://example.com/diagram.png".to_owned()),
            },
            dataset_ids: vec!["ds_1".to_owned()],
            sort: vec!["score".to_owned()],
            offset: None,
            limit: Some(5),
            expiry_in_seconds: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "query": {
                    "text": "similar diagrams",
                    "image_url": "https://example.com/diagram.png"
                },
                "datasetIds": ["ds_1"],
                "sort": ["score"],
                "limit": 5
            })
        );
    }
}
