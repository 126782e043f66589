//! In-process calendar for tests and offline runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::attestation::Attestation;
use super::calendar::CalendarEndpoint;
use super::op::Op;
use super::tree::Timestamp;
use crate::error::{EvidenceError, Result};

/// URL used by [`MockCalendar::default`].
pub const MOCK_CALENDAR_URL: &str = "https://mock-calendar.local";

/// How a [`MockCalendar`] answers submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Accept with a pending attestation naming this calendar.
    Pending,
    /// Accept with a Bitcoin attestation at `height`.
    Attested { height: u64 },
    /// Reject every request.
    Fail(String),
    /// Sleep, then accept with a pending attestation.
    Delay(Duration),
}

/// Deterministic calendar.
///
/// Each accepted commitment is prepended with an 8-byte big-endian sequence
/// number and hashed, mimicking how a real calendar folds commitments into
/// its aggregation tree. Pending leaves can later be upgraded after
/// [`MockCalendar::anchor`] is called.
/// WARNING: Do not use in production - attestations are fabricated!
pub struct MockCalendar {
    url: String,
    behavior: MockBehavior,
    sequence: AtomicU64,
    pending: Mutex<HashSet<Vec<u8>>>,
    anchored: Mutex<Option<u64>>,
}

impl MockCalendar {
    pub fn new(url: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            url: url.into(),
            behavior,
            sequence: AtomicU64::new(0),
            pending: Mutex::new(HashSet::new()),
            anchored: Mutex::new(None),
        }
    }

    pub fn pending() -> Self {
        Self::new(MOCK_CALENDAR_URL, MockBehavior::Pending)
    }

    pub fn failing(url: impl Into<String>) -> Self {
        Self::new(url, MockBehavior::Fail("mock calendar unavailable".into()))
    }

    /// Mark every pending leaf issued so far as anchored at `height`.
    pub fn anchor(&self, height: u64) {
        *self.anchored.lock().unwrap_or_else(|e| e.into_inner()) = Some(height);
    }

    /// Number of commitments accepted.
    pub fn submissions(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn accept(&self, commitment: &[u8], attestation: Attestation) -> Result<Timestamp> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut tree = Timestamp::new(commitment.to_vec());
        let leaf = tree
            .add_op(Op::Prepend(seq.to_be_bytes().to_vec()))?
            .add_op(Op::Sha256)?;

        if attestation.is_pending() {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(leaf.msg().to_vec());
        }
        leaf.add_attestation(attestation);

        debug!(calendar = %self.url, seq, "Mock calendar accepted commitment");
        Ok(tree)
    }
}

impl Default for MockCalendar {
    fn default() -> Self {
        Self::pending()
    }
}

#[async_trait]
impl CalendarEndpoint for MockCalendar {
    fn url(&self) -> &str {
        &self.url
    }

    async fn submit(&self, commitment: &[u8]) -> Result<Timestamp> {
        match &self.behavior {
            MockBehavior::Pending => self.accept(commitment, Attestation::pending(&self.url)?),
            MockBehavior::Attested { height } => {
                self.accept(commitment, Attestation::Bitcoin { height: *height })
            }
            MockBehavior::Fail(reason) => Err(EvidenceError::NetworkFailure {
                endpoint: self.url.clone(),
                reason: reason.clone(),
            }),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                self.accept(commitment, Attestation::pending(&self.url)?)
            }
        }
    }

    async fn fetch_timestamp(&self, commitment: &[u8]) -> Result<Option<Timestamp>> {
        if let MockBehavior::Fail(reason) = &self.behavior {
            return Err(EvidenceError::NetworkFailure {
                endpoint: self.url.clone(),
                reason: reason.clone(),
            });
        }

        let known = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(commitment);
        let anchored = *self.anchored.lock().unwrap_or_else(|e| e.into_inner());

        match (known, anchored) {
            (true, Some(height)) => {
                let mut tree = Timestamp::new(commitment.to_vec());
                tree.add_op(Op::Append(b"mock-block".to_vec()))?
                    .add_op(Op::Sha256)?
                    .add_attestation(Attestation::Bitcoin { height });
                Ok(Some(tree))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::SubmissionState;

    #[tokio::test]
    async fn test_pending_response_rooted_at_commitment() {
        let calendar = MockCalendar::pending();
        let tree = calendar.submit(&[7u8; 32]).await.unwrap();

        assert_eq!(tree.msg(), &[7u8; 32]);
        assert_eq!(tree.state(), SubmissionState::Pending);
        let (_, attestation) = tree.all_attestations()[0];
        assert_eq!(attestation.calendar_uri(), Some(MOCK_CALENDAR_URL));
    }

    #[tokio::test]
    async fn test_responses_are_deterministic_per_sequence() {
        let a = MockCalendar::pending();
        let b = MockCalendar::pending();
        assert_eq!(
            a.submit(&[1u8; 32]).await.unwrap(),
            b.submit(&[1u8; 32]).await.unwrap()
        );
        assert_eq!(a.submissions(), 1);
    }

    #[tokio::test]
    async fn test_attested_behavior() {
        let calendar = MockCalendar::new(MOCK_CALENDAR_URL, MockBehavior::Attested { height: 840_000 });
        let tree = calendar.submit(&[2u8; 32]).await.unwrap();
        assert_eq!(tree.state(), SubmissionState::Attested);
    }

    #[tokio::test]
    async fn test_failing_calendar() {
        let calendar = MockCalendar::failing("https://down.example");
        assert!(matches!(
            calendar.submit(&[0u8; 32]).await,
            Err(EvidenceError::NetworkFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_after_anchor() {
        let calendar = MockCalendar::pending();
        let tree = calendar.submit(&[3u8; 32]).await.unwrap();
        let (leaf_msg, _) = tree.all_attestations()[0];
        let leaf_msg = leaf_msg.to_vec();

        assert!(calendar.fetch_timestamp(&leaf_msg).await.unwrap().is_none());

        calendar.anchor(100);
        let upgraded = calendar.fetch_timestamp(&leaf_msg).await.unwrap().unwrap();
        assert_eq!(upgraded.state(), SubmissionState::Attested);
        assert!(calendar.fetch_timestamp(&[9u8; 32]).await.unwrap().is_none());
    }
}
