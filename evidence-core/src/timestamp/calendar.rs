//! Calendar endpoints.
//!
//! A calendar accepts a 32-byte commitment and answers with a timestamp tree
//! rooted at that commitment. Later, the same commitment can be looked up to
//! fetch a tree whose pending leaves have been anchored.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::http_client::{CalendarHttpClient, CalendarHttpConfig};
use super::tree::Timestamp;
use crate::error::{EvidenceError, Result};

/// A remote (or simulated) timestamp calendar.
///
/// Implementations must be thread-safe (`Send + Sync`) since submissions fan
/// out to several endpoints concurrently.
#[async_trait]
pub trait CalendarEndpoint: Send + Sync {
    /// Base URL identifying the calendar.
    fn url(&self) -> &str;

    /// Submit a commitment; the returned tree is rooted at `commitment`.
    async fn submit(&self, commitment: &[u8]) -> Result<Timestamp>;

    /// Look up the current tree for a previously submitted commitment.
    ///
    /// `Ok(None)` means the calendar has nothing newer yet.
    async fn fetch_timestamp(&self, commitment: &[u8]) -> Result<Option<Timestamp>>;
}

/// Settings for [`RemoteCalendar`].
#[derive(Debug, Clone)]
pub struct RemoteCalendarConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries for transient failures.
    pub max_retries: u32,
    /// Refuse plain-HTTP calendars.
    pub require_https: bool,
}

impl Default for RemoteCalendarConfig {
    fn default() -> Self {
        let http = CalendarHttpConfig::default();
        Self {
            timeout: http.timeout,
            max_retries: http.max_retries,
            require_https: http.require_https,
        }
    }
}

/// OpenTimestamps calendar reached over HTTP.
///
/// ## Example
///
/// ```no_run
/// use evidence_core::timestamp::{CalendarEndpoint, RemoteCalendar};
///
/// # async fn example() -> evidence_core::Result<()> {
/// let calendar = RemoteCalendar::new("https://alice.btc.calendar.opentimestamps.org")?;
/// let tree = calendar.submit(&[0u8; 32]).await?;
/// println!("{} attestations", tree.all_attestations().len());
/// # Ok(())
/// # }
/// ```
pub struct RemoteCalendar {
    url: String,
    http: CalendarHttpClient,
}

impl RemoteCalendar {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, RemoteCalendarConfig::default())
    }

    #[instrument(level = "debug", skip_all, fields(
        url = %url,
        timeout_ms = config.timeout.as_millis() as u64,
        max_retries = config.max_retries
    ))]
    pub fn with_config(url: &str, config: RemoteCalendarConfig) -> Result<Self> {
        if config.require_https && !url.starts_with("https://") {
            return Err(EvidenceError::NetworkFailure {
                endpoint: url.to_string(),
                reason: "plain-HTTP calendars are not allowed".into(),
            });
        }

        let http = CalendarHttpClient::new(CalendarHttpConfig {
            timeout: config.timeout,
            max_retries: config.max_retries,
            require_https: config.require_https,
            ..Default::default()
        })?;

        debug!("Calendar client created");
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl CalendarEndpoint for RemoteCalendar {
    fn url(&self) -> &str {
        &self.url
    }

    #[instrument(level = "debug", skip_all, fields(calendar = %self.url))]
    async fn submit(&self, commitment: &[u8]) -> Result<Timestamp> {
        let endpoint = format!("{}/digest", self.url);
        let body = self.http.post(&endpoint, commitment.to_vec()).await?;
        let tree = Timestamp::from_bytes(&body, commitment.to_vec())?;

        info!(
            attestations = tree.all_attestations().len(),
            "Calendar accepted commitment"
        );
        Ok(tree)
    }

    #[instrument(level = "debug", skip_all, fields(calendar = %self.url))]
    async fn fetch_timestamp(&self, commitment: &[u8]) -> Result<Option<Timestamp>> {
        let endpoint = format!("{}/timestamp/{}", self.url, hex::encode(commitment));
        match self.http.get(&endpoint).await? {
            Some(body) => {
                let tree = Timestamp::from_bytes(&body, commitment.to_vec())?;
                debug!(state = %tree.state(), "Fetched timestamp");
                Ok(Some(tree))
            }
            None => {
                debug!("Commitment not yet known to calendar");
                Ok(None)
            }
        }
    }
}
