//! HTTP client for the Rekor REST API

use super::LogClient;
use crate::config::FETCH_TIMEOUT;
use crate::error::{RekorError, RekorResult};
use crate::types::{LogEntry, LogInfo};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

/// HTTP client for a Rekor server
pub struct RekorClient {
    client: Client,
    base_url: String,
}

impl RekorClient {
    /// Create a new client for the server at `base_url`
    pub fn new(base_url: &str) -> RekorResult<Self> {
        let base_url = base_url.trim_end_matches('/');
        let url = Url::parse(base_url)
            .map_err(|e| RekorError::Config(format!("invalid rekor server {}: {}", base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(RekorError::Config(format!(
                "rekor server must be an http(s) URL: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(format!("tlog-rekor/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> RekorResult<reqwest::Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                RekorError::Timeout
            } else {
                RekorError::Network(e)
            }
        })
    }

    /// Generic response handler
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> RekorResult<T> {
        let status = response.status();

        match status {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| RekorError::InvalidResponse(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {}s", retry_after);
                Err(RekorError::RateLimited(retry_after))
            }
            _ if status.is_server_error() => {
                let message = self.parse_error(response).await;
                error!("Server error {}: {}", status, message);
                Err(RekorError::server(status.as_u16(), message))
            }
            _ => {
                let message = self.parse_error(response).await;
                Err(RekorError::server(status.as_u16(), message))
            }
        }
    }

    async fn parse_error(&self, response: reqwest::Response) -> String {
        response
            .json::<ApiError>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|_| "Unknown error".to_string())
    }
}

#[async_trait]
impl LogClient for RekorClient {
    async fn log_info(&self) -> RekorResult<LogInfo> {
        let url = format!("{}/api/v1/log", self.base_url);

        debug!("Fetching log info from {}", url);

        let response = self.send(self.client.get(&url)).await?;
        self.handle_response(response).await
    }

    async fn entry_by_index(&self, index: u64, timeout: Duration) -> RekorResult<LogEntry> {
        let url = format!("{}/api/v1/log/entries", self.base_url);

        let response = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("logIndex", index)])
                    .timeout(timeout),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RekorError::NotFound { index });
        }

        self.handle_response(response).await
    }
}

/// Error body returned by Rekor
#[derive(Debug, Deserialize)]
struct ApiError {
    #[allow(dead_code)]
    #[serde(default)]
    code: Option<i64>,
    message: String,
}
