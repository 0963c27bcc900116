//! Shared HTTP plumbing for the vendor clients.
//!
//! Both vendors expose the same shape of API (`GET {base}/v1/breeds`, optional
//! `x-api-key`), so request building, retries and error classification live
//! here and the vendor modules only describe their payloads.

use std::time::Duration;

use petreg_core::HttpConfig;
use petreg_core::error::AppError;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

/// Header carrying the vendor API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Configured reqwest client bound to one vendor base URL.
#[derive(Clone)]
pub struct VendorHttp {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl VendorHttp {
    /// Maximum backoff delay between retries, including `Retry-After` waits.
    const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        config: &HttpConfig,
    ) -> Result<Self, AppError> {
        let base_url =
            Url::parse(base_url).map_err(|_| AppError::InvalidUrl(base_url.to_string()))?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` (e.g. `v1/breeds`) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|_| AppError::InvalidUrl(joined))
    }

    /// GETs `path` and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = self.endpoint(path)?;
        let resp = self.request_with_retry(&url).await?;

        resp.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::ClientError(format!("Invalid response body from {}: {}", url, e))
            }
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base_delay
            .saturating_mul(factor)
            .min(Self::MAX_RETRY_DELAY)
    }

    /// Sends a GET, retrying transient failures up to `max_retries` times.
    ///
    /// Retried: 429 (honoring `Retry-After`), 5xx, timeouts and connection
    /// failures. Any other non-success status fails immediately.
    async fn request_with_retry(&self, url: &Url) -> Result<reqwest::Response, AppError> {
        let attempts = self.max_retries + 1;
        let mut last_error = AppError::Generic("No attempts made".to_string());

        for attempt in 1..=attempts {
            let mut request = self.client.get(url.clone());
            if let Some(key) = &self.api_key {
                request = request.header(API_KEY_HEADER, key);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = AppError::RateLimitExceeded;
                        if attempt < attempts {
                            let delay = resp
                                .headers()
                                .get(reqwest::header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or_else(|| self.backoff(attempt))
                                .min(Self::MAX_RETRY_DELAY);
                            tracing::debug!(%url, attempt, delay_ms = delay.as_millis() as u64, "Rate limited, retrying");
                            sleep(delay).await;
                            continue;
                        }
                        break;
                    }

                    last_error = AppError::UpstreamStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    };
                    if status.is_server_error() && attempt < attempts {
                        let delay = self.backoff(attempt);
                        tracing::debug!(%url, attempt, status = status.as_u16(), "Server error, retrying");
                        sleep(delay).await;
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    last_error = if e.is_timeout() {
                        AppError::Timeout(self.timeout.as_secs())
                    } else if e.is_connect() {
                        AppError::NetworkError(format!("Connection failed: {}", e))
                    } else {
                        AppError::ClientError(e.to_string())
                    };

                    if transient && attempt < attempts {
                        let delay = self.backoff(attempt);
                        tracing::debug!(%url, attempt, error = %e, "Request failed, retrying");
                        sleep(delay).await;
                        continue;
                    }
                    break;
                }
            }
        }

        tracing::warn!(%url, error = %last_error, "Vendor request failed");
        Err(last_error)
    }
}
