//! Job inspection and the bounded status poll loop.

use std::time::Duration;

use subworkflow_http::{ApiClient, ApiEnvelope};

use crate::error::ClientError;
use crate::types::{Job, JobStatus};

const JOB_ID_PREFIX: &str = "dsj_";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Filters for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    pub statuses: Vec<JobStatus>,
    pub types: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Read access to the jobs endpoint, including the poll loop.
///
/// The poller is a pure observer: it never mutates job state, only fetches
/// it until a terminal status appears or its iteration budget runs out.
#[derive(Debug, Clone)]
pub struct JobsApi {
    api: ApiClient,
    poll_interval: Duration,
}

impl JobsApi {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Delay between non-terminal status fetches. Set to zero in tests.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn validate_id(job_id: &str) -> Result<(), ClientError> {
        if job_id.starts_with(JOB_ID_PREFIX) {
            Ok(())
        } else {
            Err(ClientError::InvalidJobId(job_id.to_owned()))
        }
    }

    /// Fetch one job record.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidJobId` before any network call for a
    /// malformed id, or a transport/application error.
    pub async fn get(&self, job_id: &str) -> Result<Job, ClientError> {
        Self::validate_id(job_id)?;
        let envelope: ApiEnvelope<Job> = self.api.get(&format!("/jobs/{job_id}"), &[]).await?;
        Ok(envelope.into_data()?)
    }

    /// Cancel a job.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidJobId` for a malformed id, or a
    /// transport/application error.
    pub async fn cancel(&self, job_id: &str) -> Result<Job, ClientError> {
        Self::validate_id(job_id)?;
        let envelope: ApiEnvelope<Job> = self.api.delete(&format!("/jobs/{job_id}")).await?;
        Ok(envelope.into_data()?)
    }

    /// List jobs matching the query. List filters are comma-joined.
    ///
    /// # Errors
    ///
    /// Returns a transport/application error.
    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, ClientError> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if !query.statuses.is_empty() {
            let joined = query
                .statuses
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("statuses", joined));
        }
        if !query.types.is_empty() {
            pairs.push(("types", query.types.join(",")));
        }
        if let Some(offset) = query.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(limit) = query.limit {
            pairs.push(("limit", limit.to_string()));
        }

        let envelope: ApiEnvelope<Vec<Job>> = self.api.get("/jobs", &pairs).await?;
        Ok(envelope.into_data()?)
    }

    /// Fetch job status until it reaches a terminal state.
    ///
    /// Performs at most `max_iterations` fetches, sleeping the configured
    /// poll interval between non-terminal results. A terminal record is
    /// returned as soon as it is observed, with no trailing delay. A
    /// malformed status response is never retried.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidJobId` before any network call for a
    /// malformed id, `ClientError::Polling` when a fetch comes back with an
    /// error field or without a status, `ClientError::PollingTimeout` when
    /// the budget is exhausted, or a transport error.
    pub async fn poll(&self, job_id: &str, max_iterations: u32) -> Result<Job, ClientError> {
        Self::validate_id(job_id)?;

        for iteration in 1..=max_iterations {
            let envelope: ApiEnvelope<Job> = self.api.get(&format!("/jobs/{job_id}"), &[]).await?;
            if let Some(reason) = envelope.error {
                return Err(ClientError::Polling {
                    job_id: job_id.to_owned(),
                    reason,
                });
            }
            let job = envelope.data.ok_or_else(|| ClientError::Polling {
                job_id: job_id.to_owned(),
                reason: "response contained no job".to_owned(),
            })?;

            match job.status {
                Some(status) if status.is_terminal() => {
                    tracing::debug!(job_id, iteration, status = status.as_str(), "job finished");
                    return Ok(job);
                }
                Some(status) => {
                    tracing::debug!(job_id, iteration, status = status.as_str(), "job pending");
                }
                None => {
                    return Err(ClientError::Polling {
                        job_id: job_id.to_owned(),
                        reason: "response contained no status".to_owned(),
                    });
                }
            }

            if iteration < max_iterations && !self.poll_interval.is_zero() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(ClientError::PollingTimeout {
            job_id: job_id.to_owned(),
            iterations: max_iterations,
        })
    }
}
