//! Request building and response decoding against the Subworkflow API.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::Form;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::envelope::ApiEnvelope;
use crate::error::HttpError;

/// Create the shared HTTP client used by every API surface.
///
/// Config: 30s connect timeout, rustls TLS, `subworkflow/{version}`
/// user-agent, redirect limit 10. No overall request timeout, so chunk
/// uploads can run for as long as they need.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("subworkflow/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}

/// Authenticated client for one Subworkflow deployment.
///
/// Every request carries the `x-api-key` header. A non-200 answer is a hard
/// `HttpError::Status`, decoded before the envelope is even looked at.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Wrap a `reqwest` client for the deployment at `base_url`.
    ///
    /// Trailing slashes on the base URL are stripped so route joining always
    /// produces exactly one separator.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// The underlying `reqwest` client, for requests outside the API root.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> String {
        if route.starts_with('/') {
            format!("{}{route}", self.base_url)
        } else {
            format!("{}/{route}", self.base_url)
        }
    }

    /// GET `route` with the given query pairs.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` on network failure, a non-200 status, or an
    /// undecodable body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        route: &str,
        query: &[(&str, String)],
    ) -> Result<ApiEnvelope<T>, HttpError> {
        let mut request = self.client.get(self.endpoint(route));
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send(request).await
    }

    /// POST `route` with no body.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` on network failure, a non-200 status, or an
    /// undecodable body.
    pub async fn post<T: DeserializeOwned>(&self, route: &str) -> Result<ApiEnvelope<T>, HttpError> {
        self.send(self.client.post(self.endpoint(route))).await
    }

    /// POST `route` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` on network failure, a non-200 status, or an
    /// undecodable body.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        route: &str,
        body: &impl Serialize,
    ) -> Result<ApiEnvelope<T>, HttpError> {
        self.send(self.client.post(self.endpoint(route)).json(body))
            .await
    }

    /// POST `route` with a multipart form body.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` on network failure, a non-200 status, or an
    /// undecodable body.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        route: &str,
        form: Form,
    ) -> Result<ApiEnvelope<T>, HttpError> {
        self.send(self.client.post(self.endpoint(route)).multipart(form))
            .await
    }

    /// DELETE `route`.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` on network failure, a non-200 status, or an
    /// undecodable body.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        route: &str,
    ) -> Result<ApiEnvelope<T>, HttpError> {
        self.send(self.client.delete(self.endpoint(route))).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiEnvelope<T>, HttpError> {
        let response = request.header("x-api-key", &self.api_key).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "request rejected by the service");
            return Err(HttpError::Status { status, body });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
