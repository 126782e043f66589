//! HTTP transport for calendar servers with retry and backoff.
//!
//! Shared by every [`RemoteCalendar`](super::RemoteCalendar): one request is
//! retried at most `max_retries` times, and only for transient failures.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use tracing::{debug, warn};

use crate::error::{EvidenceError, Result};

/// Media type calendars expect in `Accept`.
pub const OTS_MEDIA_TYPE: &str = "application/vnd.opentimestamps.v1";

/// Largest response body accepted from a calendar.
pub const MAX_RESPONSE_LEN: usize = 10_000;

/// Configuration for the calendar HTTP transport.
#[derive(Debug, Clone)]
pub struct CalendarHttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Refuse plain-HTTP calendars.
    pub require_https: bool,
}

impl Default for CalendarHttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 1,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            require_https: true,
        }
    }
}

pub struct CalendarHttpClient {
    client: Client,
    config: CalendarHttpConfig,
}

impl CalendarHttpClient {
    pub fn new(config: CalendarHttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("evidence/", env!("CARGO_PKG_VERSION")));

        if config.require_https {
            builder = builder
                .https_only(true)
                .min_tls_version(reqwest::tls::Version::TLS_1_2);
        }

        let client = builder.build().map_err(|e| EvidenceError::NetworkFailure {
            endpoint: "client".into(),
            reason: format!("Failed to create HTTP client: {e}"),
        })?;

        Ok(Self { client, config })
    }

    /// POST `body` and return the response body.
    pub async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let build = |client: &Client| {
            client
                .post(url)
                .header(header::ACCEPT, OTS_MEDIA_TYPE)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.clone())
        };
        self.execute(url, build).await?.ok_or_else(|| EvidenceError::NetworkFailure {
            endpoint: url.to_string(),
            reason: "calendar returned 404 for submission".into(),
        })
    }

    /// GET `url`; `None` when the server answers 404.
    pub async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let build = |client: &Client| client.get(url).header(header::ACCEPT, OTS_MEDIA_TYPE);
        self.execute(url, build).await
    }

    async fn execute<F>(&self, url: &str, build: F) -> Result<Option<Vec<u8>>>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let attempts = AtomicU32::new(0);

        retry_notify(
            self.build_backoff(),
            || {
                let build = &build;
                let attempts = &attempts;
                async move { self.execute_once(url, build, attempts).await }
            },
            |err: EvidenceError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn execute_once<F>(
        &self,
        url: &str,
        build: &F,
        attempts: &AtomicU32,
    ) -> std::result::Result<Option<Vec<u8>>, backoff::Error<EvidenceError>>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        let retries_left = attempt < self.config.max_retries;
        let start = Instant::now();

        let classify = |err: EvidenceError, transient: bool| {
            if transient && retries_left {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            }
        };

        let response = build(&self.client).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            let transient = is_transient_error(&e);
            warn!(error = %e, latency_ms, transient, "Calendar request failed");
            classify(network_failure(url, format!("request failed: {e}")), transient)
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let latency_ms = start.elapsed().as_millis() as u64;
            let transient = is_transient_status(status);
            warn!(status = %status, latency_ms, transient, "Calendar returned error status");
            return Err(classify(
                network_failure(url, format!("calendar returned status {status}")),
                transient,
            ));
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RESPONSE_LEN {
                return Err(backoff::Error::permanent(network_failure(
                    url,
                    format!("response of {len} bytes exceeds {MAX_RESPONSE_LEN}"),
                )));
            }
        }

        let body = response.bytes().await.map_err(|e| {
            classify(
                network_failure(url, format!("failed to read body: {e}")),
                is_transient_error(&e),
            )
        })?;

        if body.len() > MAX_RESPONSE_LEN {
            return Err(backoff::Error::permanent(network_failure(
                url,
                format!("response of {} bytes exceeds {MAX_RESPONSE_LEN}", body.len()),
            )));
        }

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = body.len(),
            "Request completed successfully"
        );
        Ok(Some(body.to_vec()))
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * (self.config.max_retries + 1)),
            ..Default::default()
        }
    }
}

fn network_failure(url: &str, reason: String) -> EvidenceError {
    EvidenceError::NetworkFailure {
        endpoint: url.to_string(),
        reason,
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_default_config() {
        let config = CalendarHttpConfig::default();
        assert_eq!(config.max_retries, 1);
        assert!(config.require_https);
    }

    #[test]
    fn test_create_client() {
        assert!(CalendarHttpClient::new(CalendarHttpConfig::default()).is_ok());
    }
}
