//! Calendar configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::calendar::{CalendarEndpoint, RemoteCalendar, RemoteCalendarConfig};
use crate::error::{EvidenceError, Result};

/// Public calendars used when nothing else is configured.
pub const DEFAULT_CALENDARS: &[&str] = &[
    "https://alice.btc.calendar.opentimestamps.org",
    "https://bob.btc.calendar.opentimestamps.org",
    "https://finney.calendar.eternitywall.com",
];

/// Default timeout for one endpoint attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which calendars to use and how long to wait for them.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Calendar base URLs.
    pub calendars: Vec<String>,
    /// Deadline for each endpoint.
    pub timeout: Duration,
    /// Successful calendars to wait for before returning.
    pub min_attestations: usize,
    /// Retries per endpoint for transient failures.
    pub max_retries: u32,
    /// Refuse plain-HTTP calendars.
    pub require_https: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendars: DEFAULT_CALENDARS.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_TIMEOUT,
            min_attestations: 1,
            max_retries: 1,
            require_https: true,
        }
    }
}

impl CalendarConfig {
    /// Load configuration from environment variables.
    ///
    /// - `EVIDENCE_CALENDARS`: comma-separated calendar URLs
    /// - `EVIDENCE_CALENDAR_TIMEOUT_SECS`: per-endpoint timeout
    /// - `EVIDENCE_MIN_ATTESTATIONS`: calendars to wait for
    /// - `EVIDENCE_ALLOW_HTTP`: `true` to accept plain-HTTP calendars
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let calendars = std::env::var("EVIDENCE_CALENDARS")
            .ok()
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.calendars);

        let timeout = std::env::var("EVIDENCE_CALENDAR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let min_attestations = std::env::var("EVIDENCE_MIN_ATTESTATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.min_attestations);

        let require_https = !std::env::var("EVIDENCE_ALLOW_HTTP")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            calendars,
            timeout,
            min_attestations,
            max_retries: defaults.max_retries,
            require_https,
        }
    }

    /// Build an HTTP endpoint for every configured calendar.
    pub fn endpoints(&self) -> Result<Vec<Arc<dyn CalendarEndpoint>>> {
        if self.calendars.is_empty() {
            return Err(EvidenceError::AllEndpointsFailed {
                failures: vec!["no calendars configured".into()],
            });
        }

        let config = RemoteCalendarConfig {
            timeout: self.timeout,
            max_retries: self.max_retries,
            require_https: self.require_https,
        };

        let endpoints = self
            .calendars
            .iter()
            .map(|url| {
                RemoteCalendar::with_config(url, config.clone())
                    .map(|c| Arc::new(c) as Arc<dyn CalendarEndpoint>)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(count = endpoints.len(), "Configured calendar endpoints");
        Ok(endpoints)
    }
}
