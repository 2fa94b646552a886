//! Dataset records and their extracted items.

use subworkflow_http::{ApiClient, ApiEnvelope};

use crate::error::ClientError;
use crate::jobs::JobsApi;
use crate::types::{Dataset, DatasetItem, Job};

/// Poll budget for dataset re-vectorization jobs.
const VECTORIZE_POLL_BUDGET: u32 = 500;

/// Filters for querying a dataset's items.
#[derive(Debug, Clone, Default)]
pub struct DatasetItemsQuery {
    pub row: Option<String>,
    pub cols: Vec<u32>,
    pub sort: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub expiry_in_seconds: Option<u64>,
}

/// Access to the datasets endpoints.
#[derive(Debug, Clone)]
pub struct DatasetsApi {
    api: ApiClient,
    jobs: JobsApi,
}

impl DatasetsApi {
    pub(crate) fn new(api: ApiClient, jobs: JobsApi) -> Self {
        Self { api, jobs }
    }

    /// Fetch one dataset record.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error.
    pub async fn get(
        &self,
        dataset_id: &str,
        expiry_in_seconds: Option<u64>,
    ) -> Result<Dataset, ClientError> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(seconds) = expiry_in_seconds {
            pairs.push(("expiryInSeconds", seconds.to_string()));
        }
        let envelope: ApiEnvelope<Dataset> = self
            .api
            .get(&format!("/datasets/{dataset_id}"), &pairs)
            .await?;
        Ok(envelope.into_data()?)
    }

    /// Delete a dataset, returning its final record.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error.
    pub async fn delete(&self, dataset_id: &str) -> Result<Dataset, ClientError> {
        let envelope: ApiEnvelope<Dataset> =
            self.api.delete(&format!("/datasets/{dataset_id}")).await?;
        Ok(envelope.into_data()?)
    }

    /// Kick off re-vectorization of an extracted dataset without waiting.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error.
    pub async fn vectorize_job(&self, dataset_id: &str) -> Result<Job, ClientError> {
        let envelope: ApiEnvelope<Job> = self
            .api
            .post(&format!("/datasets/{dataset_id}/vectorize"))
            .await?;
        Ok(envelope.into_data()?)
    }

    /// Re-vectorize a dataset and wait for the resulting job, returning the
    /// vectorized dataset.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error, a polling error, or
    /// `ClientError::MissingDataset` when the finished job references no
    /// dataset.
    pub async fn vectorize(&self, dataset_id: &str) -> Result<Dataset, ClientError> {
        let job = self.vectorize_job(dataset_id).await?;
        let finished = self.jobs.poll(&job.id, VECTORIZE_POLL_BUDGET).await?;
        let dataset_id = finished
            .dataset_id
            .clone()
            .ok_or(ClientError::MissingDataset {
                job_id: finished.id,
            })?;
        self.get(&dataset_id, None).await
    }

    /// Query a dataset's items. List filters are comma-joined.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error.
    pub async fn items(
        &self,
        dataset_id: &str,
        query: &DatasetItemsQuery,
    ) -> Result<Vec<DatasetItem>, ClientError> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(row) = &query.row {
            pairs.push(("row", row.clone()));
        }
        if !query.cols.is_empty() {
            let joined = query
                .cols
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("cols", joined));
        }
        if !query.sort.is_empty() {
            pairs.push(("sort", query.sort.join(",")));
        }
        if let Some(offset) = query.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(limit) = query.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(seconds) = query.expiry_in_seconds {
            pairs.push(("expiryInSeconds", seconds.to_string()));
        }

        let envelope: ApiEnvelope<Vec<DatasetItem>> = self
            .api
            .get(&format!("/datasets/{dataset_id}/items"), &pairs)
            .await?;
        Ok(envelope.into_data()?)
    }
}
