//! HTTP client for the editorial backend.
//!
//! Every backend collaborator sits behind [`EditorialBackend`] so the action
//! handlers and the pipeline console can run against fakes in tests.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::{Config, Endpoints, RetryPolicy};
use crate::logging;
use crate::models::{
    AnalysisResult, AnalyzeFolderRequest, FolderListing, MetadataReceipt, RunPipelineRequest,
    SaveMetadataRequest, StyleGuides,
};
use crate::utils::{join_url, truncate_with_ellipsis};

const ERROR_BODY_MAX_CHARS: usize = 300;

// === Errors ===

/// Failure talking to one backend endpoint.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("backend unreachable at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The backend answered with a non-success status.
    #[error("{endpoint} returned {status_text}")]
    Status {
        endpoint: String,
        status: StatusCode,
        status_text: String,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },

    /// The backend answered 2xx but reported an error in the body.
    #[error("{endpoint} reported an error: {message}")]
    Rejected { endpoint: String, message: String },

    /// The response stream broke after it was opened.
    #[error("stream from {endpoint} failed: {message}")]
    Stream { endpoint: String, message: String },
}

impl BackendError {
    /// Whether the failure means the backend was unreachable.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    fn from_reqwest(endpoint: &str, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Parse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            };
        }
        Self::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }

    fn status(endpoint: &str, status: StatusCode, body: String) -> Self {
        let status_text = match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => status.as_u16().to_string(),
        };
        Self::Status {
            endpoint: endpoint.to_string(),
            status,
            status_text,
            body: truncate_with_ellipsis(body.trim(), ERROR_BODY_MAX_CHARS, "..."),
        }
    }
}

/// Raw bytes of a streamed pipeline response.
pub type PipelineByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

// === Backend Trait ===

/// The backend collaborators the console mediates.
#[async_trait]
pub trait EditorialBackend: Send + Sync {
    /// Base URL, used in user-facing connection errors.
    fn base_url(&self) -> &str;

    async fn list_style_guides(&self) -> Result<StyleGuides, BackendError>;

    async fn list_content_folders(&self) -> Result<FolderListing, BackendError>;

    async fn analyze_folder(&self, folder_path: &str) -> Result<AnalysisResult, BackendError>;

    async fn save_metadata(
        &self,
        folder_path: &str,
        content: &str,
    ) -> Result<MetadataReceipt, BackendError>;

    /// Start a pipeline job. Resolves once the response headers arrive; the
    /// body is returned unread.
    async fn start_pipeline(&self, content_path: &str) -> Result<PipelineByteStream, BackendError>;
}

// === BackendClient ===

/// `reqwest` implementation of [`EditorialBackend`].
#[derive(Clone)]
#[must_use]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
    endpoints: Endpoints,
    retry: RetryPolicy,
}

impl BackendClient {
    /// Create a client from resolved configuration.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_parts(config.base_url(), config.endpoints(), config.retry_policy())
    }

    pub fn with_parts(
        base_url: impl Into<String>,
        endpoints: Endpoints,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        logging::info(format!("Editorial backend base URL: {base_url}"));
        logging::info(format!(
            "Retry policy (GET only): enabled={}, max_retries={}, initial_delay={}s, max_delay={}s",
            retry.enabled, retry.max_retries, retry.initial_delay, retry.max_delay
        ));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            endpoints,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.url(path);
        let response = send_with_retry(&self.retry, path, || self.http_client.get(&url)).await?;
        decode_json(path, response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| BackendError::from_reqwest(path, &err))?;
        decode_json(path, response).await
    }
}

#[async_trait]
impl EditorialBackend for BackendClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_style_guides(&self) -> Result<StyleGuides, BackendError> {
        self.get_json(&self.endpoints.style_guides).await
    }

    async fn list_content_folders(&self) -> Result<FolderListing, BackendError> {
        let path = &self.endpoints.content_folders;
        let listing: FolderListing = self.get_json(path).await?;
        if is_error_status(listing.status.as_deref()) {
            return Err(BackendError::Rejected {
                endpoint: path.clone(),
                message: listing
                    .message
                    .unwrap_or_else(|| "folder listing failed".to_string()),
            });
        }
        Ok(listing)
    }

    async fn analyze_folder(&self, folder_path: &str) -> Result<AnalysisResult, BackendError> {
        let path = &self.endpoints.analyze_folder;
        let raw: Value = self
            .post_json(path, &AnalyzeFolderRequest { folder_path })
            .await?;
        if let Some(message) = rejection_message(&raw) {
            return Err(BackendError::Rejected {
                endpoint: path.clone(),
                message,
            });
        }
        serde_json::from_value(raw).map_err(|err| BackendError::Parse {
            endpoint: path.clone(),
            message: err.to_string(),
        })
    }

    async fn save_metadata(
        &self,
        folder_path: &str,
        content: &str,
    ) -> Result<MetadataReceipt, BackendError> {
        let path = &self.endpoints.save_metadata;
        let url = self.url(path);
        let response = self
            .http_client
            .post(&url)
            .json(&SaveMetadataRequest {
                folder_path,
                content,
            })
            .send()
            .await
            .map_err(|err| BackendError::from_reqwest(path, &err))?;
        let response = ensure_success(path, response).await?;

        // The ack body carries nothing we need; tolerate empty or non-JSON bodies.
        let text = response.text().await.unwrap_or_default();
        let raw: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if let Some(message) = rejection_message(&raw) {
            return Err(BackendError::Rejected {
                endpoint: path.clone(),
                message,
            });
        }
        Ok(serde_json::from_value(raw).unwrap_or_default())
    }

    async fn start_pipeline(&self, content_path: &str) -> Result<PipelineByteStream, BackendError> {
        let path = self.endpoints.run_pipeline.clone();
        let url = self.url(&path);
        let response = self
            .http_client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&RunPipelineRequest { content_path })
            .send()
            .await
            .map_err(|err| BackendError::from_reqwest(&path, &err))?;
        let response = ensure_success(&path, response).await?;

        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|err| BackendError::Stream {
                endpoint: path.clone(),
                message: err.to_string(),
            })
        });
        Ok(Box::pin(stream))
    }
}

// === Response Helpers ===

fn is_error_status(status: Option<&str>) -> bool {
    status.is_some_and(|status| status.eq_ignore_ascii_case("error"))
}

/// Extract the message of a `{status: "error", ...}` body.
fn rejection_message(raw: &Value) -> Option<String> {
    if !is_error_status(raw.get("status").and_then(Value::as_str)) {
        return None;
    }
    let message = raw
        .get("error")
        .or_else(|| raw.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Some(message.to_string())
}

async fn ensure_success(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    logging::warn(format!("{endpoint} returned HTTP {status}: {body}"));
    Err(BackendError::status(endpoint, status, body))
}

async fn decode_json<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let response = ensure_success(endpoint, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|err| BackendError::from_reqwest(endpoint, &err))?;
    serde_json::from_slice(&bytes).map_err(|err| BackendError::Parse {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    })
}

// === Retry Helpers ===

async fn send_with_retry<F>(
    policy: &RetryPolicy,
    endpoint: &str,
    mut build: F,
) -> Result<reqwest::Response, BackendError>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt: u32 = 0;

    loop {
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable || !policy.enabled || attempt >= policy.max_retries {
                    return Ok(response);
                }

                logging::warn(format!(
                    "Retryable HTTP {} from {endpoint} (attempt {} of {})",
                    status.as_u16(),
                    attempt + 1,
                    policy.max_retries + 1
                ));
            }
            Err(err) => {
                if !policy.enabled || attempt >= policy.max_retries {
                    return Err(BackendError::from_reqwest(endpoint, &err));
                }
                logging::warn(format!(
                    "Request error from {endpoint}: {err} (attempt {} of {})",
                    attempt + 1,
                    policy.max_retries + 1
                ));
            }
        }

        let delay = policy.delay_for_attempt(attempt);
        attempt += 1;
        logging::info(format!("Retrying after {:.2}s", delay.as_secs_f64()));
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, retry: RetryPolicy) -> BackendClient {
        BackendClient::with_parts(server.uri(), Endpoints::default(), retry).expect("client")
    }

    #[tokio::test]
    async fn get_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/list-content-folders"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/list-content-folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "folders": [{"name": "a", "files_count": 2}],
                "total": 1
            })))
            .mount(&server)
            .await;

        let retry = RetryPolicy {
            enabled: true,
            max_retries: 2,
            initial_delay: 0.0,
            max_delay: 0.0,
            exponential_base: 1.0,
        };
        let listing = client_for(&server, retry)
            .list_content_folders()
            .await
            .expect("listing after retry");
        assert_eq!(listing.total(), 1);
    }

    #[tokio::test]
    async fn analysis_error_body_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analyze-folder"))
            .and(body_json(json!({"folder_path": "content/raw/x"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error", "error": "folder missing", "folder": "x"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, RetryPolicy::disabled())
            .analyze_folder("content/raw/x")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected { ref message, .. } if message == "folder missing"));
    }

    #[tokio::test]
    async fn status_error_carries_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save-metadata"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, RetryPolicy::disabled())
            .save_metadata("content/raw/x", "# doc")
            .await
            .unwrap_err();
        match err {
            BackendError::Status {
                status,
                status_text,
                body,
                ..
            } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(status_text, "500 Internal Server Error");
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_ack_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save-metadata"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let receipt = client_for(&server, RetryPolicy::disabled())
            .save_metadata("content/raw/x", "# doc")
            .await
            .expect("ack");
        assert_eq!(receipt.artifact_name(), crate::models::METADATA_FILE_NAME);
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let client = BackendClient::with_parts(
            "http://127.0.0.1:9",
            Endpoints::default(),
            RetryPolicy::disabled(),
        )
        .expect("client");
        let err = client.list_style_guides().await.unwrap_err();
        assert!(err.is_transport(), "expected transport error, got {err:?}");
    }
}
