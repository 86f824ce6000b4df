//! REST client for the backend experiment endpoints.
//!
//! Wraps `GET /experiments/{id}` and `PUT /experiments/{id}` using
//! [`reqwest`]. Every request carries the static auth token and a JSON
//! content type, and is bounded by the client timeout. No retries happen
//! here; the completion watcher re-drives failures on its next cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use stax_core::error::CoreError;
use stax_core::ports::ExperimentBackend;

/// Header carrying the static backend token.
pub const AUTH_HEADER: &str = "x-auth-token";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The configured auth token is not a valid header value.
    #[error("Auth token is not a valid header value")]
    InvalidToken,

    /// The configured base URL cannot carry a path.
    #[error("Invalid backend base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl From<BackendError> for CoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Request(e) if e.is_decode() => {
                CoreError::Malformed(format!("backend response body: {e}"))
            }
            BackendError::Request(e) => CoreError::Backend(e.to_string()),
            BackendError::ApiError { status, .. } => CoreError::BackendStatus(status),
            BackendError::InvalidToken => {
                CoreError::Internal("backend auth token is not a valid header value".into())
            }
            BackendError::InvalidBaseUrl(url) => {
                CoreError::Internal(format!("invalid backend base URL '{url}'"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BackendClient
// ---------------------------------------------------------------------------

/// HTTP client for the backend system of record.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client for `base_url`, e.g. `http://backend:8080/api`.
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Result<Self, BackendError> {
        let parsed = Url::parse(base_url).map_err(|_| BackendError::InvalidBaseUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(BackendError::InvalidBaseUrl(base_url.to_string()));
        }

        let mut token = HeaderValue::from_str(auth_token).map_err(|_| BackendError::InvalidToken)?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(AUTH_HEADER), token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the full representation of an experiment.
    pub async fn fetch_experiment(&self, experiment_id: &str) -> Result<serde_json::Value, BackendError> {
        let response = self
            .client
            .get(self.experiment_url(experiment_id))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Overwrite the representation of an experiment.
    ///
    /// Returns the response status code; a non-2xx answer is not an error
    /// at this layer.
    pub async fn update_experiment(
        &self,
        experiment_id: &str,
        representation: &serde_json::Value,
    ) -> Result<u16, BackendError> {
        let response = self
            .client
            .put(self.experiment_url(experiment_id))
            .json(representation)
            .send()
            .await?;

        let status = response.status().as_u16();
        tracing::debug!(experiment_id, status, "Backend update answered");
        Ok(status)
    }

    /// `{base}/experiments/{id}` with the id as one percent-encoded segment,
    /// so reserved characters never reach another resource.
    fn experiment_url(&self, experiment_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("experiments")
                .push(experiment_id);
        }
        url
    }

    /// Pass successful responses through; turn anything else into
    /// [`BackendError::ApiError`] carrying the body for debugging.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ExperimentBackend for BackendClient {
    async fn fetch(&self, experiment_id: &str) -> Result<serde_json::Value, CoreError> {
        match self.fetch_experiment(experiment_id).await {
            Ok(representation) => Ok(representation),
            Err(BackendError::ApiError { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(CoreError::NotFound {
                    entity: "backend experiment",
                    id: experiment_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        experiment_id: &str,
        representation: &serde_json::Value,
    ) -> Result<u16, CoreError> {
        Ok(self.update_experiment(experiment_id, representation).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
