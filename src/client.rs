//! Top-level client facade.

use std::time::Duration;

use subworkflow_http::{ApiClient, default_client};
use subworkflow_upload::DEFAULT_PART_PACING;

use crate::datasets::DatasetsApi;
use crate::error::ClientError;
use crate::jobs::JobsApi;
use crate::search::{SearchApi, SearchRequest};
use crate::types::DatasetItem;

const BASE_URL: &str = "https://api.subworkflow.ai/v1";

/// Client for the Subworkflow document processing API.
///
/// One instance wraps one API key and deployment; the sub-APIs share a
/// single HTTP connection pool.
#[derive(Clone)]
pub struct Subworkflow {
    pub(crate) api: ApiClient,
    pub(crate) jobs: JobsApi,
    pub(crate) datasets: DatasetsApi,
    pub(crate) search: SearchApi,
    pub(crate) part_pacing: Duration,
    api_key: String,
    base_url: String,
    poll_interval: Option<Duration>,
}

impl std::fmt::Debug for Subworkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subworkflow")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Subworkflow {
    /// Create a client against the hosted service.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::build(api_key.into(), BASE_URL.to_owned(), None, DEFAULT_PART_PACING)
    }

    /// Point the client at a different API root. Intended for tests and
    /// self-hosted deployments.
    #[must_use]
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self::build(
            self.api_key,
            base_url.into(),
            self.poll_interval,
            self.part_pacing,
        )
    }

    /// Delay between job status fetches. Set to zero in tests.
    #[must_use]
    pub fn with_poll_interval(self, interval: Duration) -> Self {
        Self::build(
            self.api_key,
            self.base_url,
            Some(interval),
            self.part_pacing,
        )
    }

    /// Delay before each chunk upload of a multipart session. Set to zero
    /// in tests.
    #[must_use]
    pub fn with_part_pacing(mut self, pacing: Duration) -> Self {
        self.part_pacing = pacing;
        self
    }

    fn build(
        api_key: String,
        base_url: String,
        poll_interval: Option<Duration>,
        part_pacing: Duration,
    ) -> Self {
        let api = ApiClient::new(default_client(), base_url.clone(), api_key.clone());
        let mut jobs = JobsApi::new(api.clone());
        if let Some(interval) = poll_interval {
            jobs = jobs.with_poll_interval(interval);
        }
        let datasets = DatasetsApi::new(api.clone(), jobs.clone());
        let search = SearchApi::new(api.clone());
        Self {
            api,
            jobs,
            datasets,
            search,
            part_pacing,
            api_key,
            base_url,
            poll_interval,
        }
    }

    /// The jobs API: get, cancel, list, and the poll loop.
    #[must_use]
    pub fn jobs(&self) -> &JobsApi {
        &self.jobs
    }

    /// The datasets API: records, items, and re-vectorization.
    #[must_use]
    pub fn datasets(&self) -> &DatasetsApi {
        &self.datasets
    }

    /// The raw transport, for endpoints this crate has no wrapper for.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Vector search across vectorized datasets.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<DatasetItem>, ClientError> {
        self.search.search(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_override_reaches_the_transport() {
        let client = Subworkflow::new("key").with_base_url("https://staging.example.com/v1/");
        assert_eq!(client.api().base_url(), "https://staging.example.com/v1");
    }

    #[test]
    fn debug_does_not_leak_the_api_key() {
        let client = Subworkflow::new("super-secret");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
