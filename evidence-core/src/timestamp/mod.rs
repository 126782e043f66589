//! Timestamp proofs backed by remote calendar servers.
//!
//! A digest is blinded with a random nonce, hashed, and submitted to one or
//! more calendars. Each calendar answers with a timestamp tree that usually
//! ends in a *pending* attestation; once the calendar has anchored its
//! aggregate in a public ledger, the pending leaf can be upgraded to a full
//! inclusion path.
//!
//! The binary format is the OpenTimestamps detached-proof format, so emitted
//! `.ots` files can be checked with existing tooling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use evidence_core::timestamp::{CalendarEndpoint, RemoteCalendar, TimestampProofClient};
//! use evidence_core::digest::digest_bytes;
//!
//! # async fn example() -> evidence_core::Result<()> {
//! let endpoints: Vec<Arc<dyn CalendarEndpoint>> = vec![Arc::new(RemoteCalendar::new(
//!     "https://alice.btc.calendar.opentimestamps.org",
//! )?)];
//! let digest = digest_bytes(b"image bytes")?;
//! let submission = TimestampProofClient::default()
//!     .submit(digest, &endpoints, Duration::from_secs(10))
//!     .await?;
//! let ots = submission.proof.serialize()?;
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod codec;
pub mod op;
pub mod proof;
pub mod tree;

#[cfg(feature = "network")]
mod calendar;
#[cfg(feature = "network")]
mod client;
#[cfg(feature = "network")]
mod config;
#[cfg(feature = "network")]
mod http_client;
#[cfg(feature = "network")]
mod mock;

pub use attestation::{Attestation, CalendarUri};
pub use op::Op;
pub use proof::{Commitment, TimestampProof, VerifiedAttestation};
pub use tree::Timestamp;

#[cfg(feature = "network")]
pub use calendar::{CalendarEndpoint, RemoteCalendar, RemoteCalendarConfig};
#[cfg(feature = "network")]
pub use client::{
    pending_calendars, EndpointOutcome, EndpointReport, Submission, TimestampProofClient,
    UpgradeReport, NONCE_LEN,
};
#[cfg(feature = "network")]
pub use config::{CalendarConfig, DEFAULT_CALENDARS};
#[cfg(feature = "network")]
pub use mock::{MockBehavior, MockCalendar, MOCK_CALENDAR_URL};

/// Lifecycle of a submission, also used to summarize a proof tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    /// Commitment built, nothing sent.
    Created,
    /// Request in flight to at least one endpoint.
    Submitted,
    /// Accepted by a calendar; only pending attestations so far.
    Pending,
    /// At least one ledger-backed attestation present.
    Attested,
    /// Every endpoint failed.
    Failed,
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::Submitted => "SUBMITTED",
            Self::Pending => "PENDING",
            Self::Attested => "ATTESTED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
