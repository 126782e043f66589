//! Submission of commitments to calendars and later proof upgrades.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::attestation::Attestation;
use super::calendar::CalendarEndpoint;
use super::op::Op;
use super::proof::{Commitment, TimestampProof};
use super::tree::Timestamp;
use super::SubmissionState;
use crate::digest::Digest;
use crate::error::{EvidenceError, Result};

/// Length of the random nonce that blinds the digest.
pub const NONCE_LEN: usize = 16;

/// What happened at one endpoint during a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    Pending,
    Attested,
    Failed(String),
    /// Still in flight when enough endpoints had answered.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    pub url: String,
    pub outcome: EndpointOutcome,
}

/// Result of [`TimestampProofClient::submit`].
#[derive(Debug, Clone)]
pub struct Submission {
    pub proof: TimestampProof,
    pub state: SubmissionState,
    /// One report per endpoint, in the order the endpoints were given.
    pub endpoints: Vec<EndpointReport>,
}

impl Submission {
    /// Number of endpoints that answered successfully.
    pub fn accepted(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|r| matches!(r.outcome, EndpointOutcome::Pending | EndpointOutcome::Attested))
            .count()
    }
}

/// Counts from [`TimestampProofClient::upgrade`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Pending attestations replaced by a ledger attestation.
    pub upgraded: usize,
    /// Calendar answered but has nothing newer.
    pub still_pending: usize,
    /// Calendar errored or timed out.
    pub failed: usize,
    /// No endpoint matches the attestation's calendar.
    pub skipped: usize,
}

impl UpgradeReport {
    pub fn changed(&self) -> bool {
        self.upgraded > 0
    }
}

/// Drives commitments through calendar endpoints.
#[derive(Debug, Clone)]
pub struct TimestampProofClient {
    min_attestations: usize,
}

impl Default for TimestampProofClient {
    fn default() -> Self {
        Self { min_attestations: 1 }
    }
}

impl TimestampProofClient {
    /// Client that returns once `min_attestations` endpoints succeed (at least 1).
    pub fn new(min_attestations: usize) -> Self {
        Self {
            min_attestations: min_attestations.max(1),
        }
    }

    pub fn min_attestations(&self) -> usize {
        self.min_attestations
    }

    /// Blind `digest`, submit it to every endpoint concurrently, and merge the
    /// answers into a proof.
    ///
    /// Returns once `min_attestations` endpoints have answered or every
    /// endpoint has resolved; requests still in flight are dropped. Fails
    /// with [`EvidenceError::AllEndpointsFailed`] when nobody answered.
    #[instrument(skip_all, fields(
        digest = %digest,
        endpoints = endpoints.len(),
        timeout_ms = timeout.as_millis() as u64
    ))]
    pub async fn submit(
        &self,
        digest: Digest,
        endpoints: &[Arc<dyn CalendarEndpoint>],
        timeout: Duration,
    ) -> Result<Submission> {
        if endpoints.is_empty() {
            return Err(EvidenceError::AllEndpointsFailed {
                failures: vec!["no calendar endpoints configured".into()],
            });
        }

        let nonce: [u8; NONCE_LEN] = rand::random();
        let mut proof = TimestampProof::new(Commitment::sha256(&digest));
        let commitment = Op::Sha256.apply(&Op::Append(nonce.to_vec()).apply(digest.as_bytes())?)?;
        debug!(commitment = %hex::encode(&commitment), "Commitment created");

        let start = Instant::now();
        let mut in_flight: FuturesUnordered<_> = endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                let commitment = commitment.as_slice();
                async move {
                    let result = tokio::time::timeout(timeout, endpoint.submit(commitment)).await;
                    (index, result)
                }
            })
            .collect();

        let mut outcomes: Vec<Option<EndpointOutcome>> = vec![None; endpoints.len()];
        let mut failures = Vec::new();
        let mut merged = Timestamp::new(commitment.clone());
        let mut accepted = 0;

        while let Some((index, result)) = in_flight.next().await {
            let url = endpoints[index].url();
            let latency_ms = start.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(Ok(tree)) => match merge_response(&mut merged, tree) {
                    Ok(state) => {
                        accepted += 1;
                        info!(calendar = url, latency_ms, state = %state, "Calendar answered");
                        if state == SubmissionState::Attested {
                            EndpointOutcome::Attested
                        } else {
                            EndpointOutcome::Pending
                        }
                    }
                    Err(e) => EndpointOutcome::Failed(e.to_string()),
                },
                Ok(Err(e)) => EndpointOutcome::Failed(e.to_string()),
                Err(_) => EndpointOutcome::Failed(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )),
            };

            if let EndpointOutcome::Failed(reason) = &outcome {
                warn!(calendar = url, latency_ms, reason = %reason, "Calendar submission failed");
                failures.push(format!("{url}: {reason}"));
            }
            outcomes[index] = Some(outcome);

            if accepted >= self.min_attestations {
                break;
            }
        }
        drop(in_flight);

        let reports: Vec<EndpointReport> = endpoints
            .iter()
            .zip(outcomes)
            .map(|(endpoint, outcome)| EndpointReport {
                url: endpoint.url().to_string(),
                outcome: outcome.unwrap_or(EndpointOutcome::Cancelled),
            })
            .collect();

        if accepted == 0 {
            warn!(failures = failures.len(), "Every calendar failed");
            return Err(EvidenceError::AllEndpointsFailed { failures });
        }
        if accepted < self.min_attestations {
            warn!(
                accepted,
                required = self.min_attestations,
                "Fewer calendars answered than requested"
            );
        }

        proof
            .timestamp_mut()
            .add_op(Op::Append(nonce.to_vec()))?
            .add_op(Op::Sha256)?
            .merge(merged)?;

        let state = proof.state();
        info!(
            accepted,
            state = %state,
            latency_ms = start.elapsed().as_millis() as u64,
            "Submission complete"
        );

        Ok(Submission {
            proof,
            state,
            endpoints: reports,
        })
    }

    /// Ask calendars for newer versions of every pending attestation in `proof`.
    ///
    /// A pending leaf is replaced only when the calendar's answer carries a
    /// ledger attestation. Pending leaves whose calendar is not among
    /// `endpoints` are counted as skipped.
    #[instrument(skip_all, fields(endpoints = endpoints.len()))]
    pub async fn upgrade(
        &self,
        proof: &mut TimestampProof,
        endpoints: &[Arc<dyn CalendarEndpoint>],
        timeout: Duration,
    ) -> Result<UpgradeReport> {
        let mut report = UpgradeReport::default();

        let mut lookups = Vec::new();
        for (msg, attestation) in pending_leaves(proof) {
            let uri = attestation.calendar_uri().unwrap_or_default();
            match endpoints
                .iter()
                .find(|e| e.url().trim_end_matches('/') == uri.trim_end_matches('/'))
            {
                Some(endpoint) => lookups.push((msg, attestation, Arc::clone(endpoint))),
                None => {
                    debug!(calendar = uri, "No endpoint for pending attestation");
                    report.skipped += 1;
                }
            }
        }

        let answers = join_all(lookups.iter().map(|(msg, _, endpoint)| {
            tokio::time::timeout(timeout, endpoint.fetch_timestamp(msg))
        }))
        .await;

        for ((msg, pending, endpoint), answer) in lookups.into_iter().zip(answers) {
            match answer {
                Ok(Ok(Some(tree))) if tree.msg() == msg.as_slice() => {
                    if tree.state() != SubmissionState::Attested {
                        report.still_pending += 1;
                        continue;
                    }
                    let Some(node) = proof.timestamp_mut().find_mut(&msg) else {
                        report.failed += 1;
                        continue;
                    };
                    node.merge(tree)?;
                    node.remove_attestation(&pending);
                    info!(calendar = endpoint.url(), "Pending attestation upgraded");
                    report.upgraded += 1;
                }
                Ok(Ok(Some(_))) => {
                    warn!(calendar = endpoint.url(), "Calendar answered for a different message");
                    report.failed += 1;
                }
                Ok(Ok(None)) => report.still_pending += 1,
                Ok(Err(e)) => {
                    warn!(calendar = endpoint.url(), error = %e, "Upgrade lookup failed");
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(calendar = endpoint.url(), "Upgrade lookup timed out");
                    report.failed += 1;
                }
            }
        }

        info!(
            upgraded = report.upgraded,
            still_pending = report.still_pending,
            failed = report.failed,
            skipped = report.skipped,
            "Upgrade complete"
        );
        Ok(report)
    }
}

/// Distinct calendar URIs named by pending attestations in `proof`.
pub fn pending_calendars(proof: &TimestampProof) -> Vec<String> {
    let mut uris: Vec<String> = pending_leaves(proof)
        .into_iter()
        .filter_map(|(_, a)| a.calendar_uri().map(str::to_string))
        .collect();
    uris.sort();
    uris.dedup();
    uris
}

fn pending_leaves(proof: &TimestampProof) -> Vec<(Vec<u8>, Attestation)> {
    proof
        .timestamp()
        .all_attestations()
        .into_iter()
        .filter(|(_, a)| a.is_pending())
        .map(|(msg, a)| (msg.to_vec(), a.clone()))
        .collect()
}

fn merge_response(merged: &mut Timestamp, tree: Timestamp) -> Result<SubmissionState> {
    if tree.msg() != merged.msg() {
        return Err(EvidenceError::InvalidProof(
            "calendar answered for a different commitment".into(),
        ));
    }
    let state = tree.state();
    if state == SubmissionState::Created {
        return Err(EvidenceError::InvalidProof(
            "calendar response has no attestations".into(),
        ));
    }
    merged.merge(tree)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_bytes;
    use crate::timestamp::{MockBehavior, MockCalendar};

    fn endpoints(calendars: Vec<MockCalendar>) -> Vec<Arc<dyn CalendarEndpoint>> {
        calendars
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn CalendarEndpoint>)
            .collect()
    }

    #[tokio::test]
    async fn test_submit_single_pending() {
        let digest = digest_bytes(b"frame").unwrap();
        let submission = TimestampProofClient::default()
            .submit(digest, &endpoints(vec![MockCalendar::pending()]), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(submission.state, SubmissionState::Pending);
        assert_eq!(submission.proof.digest(), Some(digest));
        assert_eq!(submission.endpoints[0].outcome, EndpointOutcome::Pending);
        assert!(submission.proof.verify().is_ok());
    }

    #[tokio::test]
    async fn test_nonce_hides_digest_and_differs_per_submission() {
        let digest = digest_bytes(b"frame").unwrap();
        let eps = endpoints(vec![MockCalendar::pending()]);
        let client = TimestampProofClient::default();
        let a = client.submit(digest, &eps, Duration::from_secs(1)).await.unwrap();
        let b = client.submit(digest, &eps, Duration::from_secs(1)).await.unwrap();
        assert_ne!(a.proof, b.proof);
    }

    #[tokio::test]
    async fn test_one_of_many_succeeds() {
        let digest = digest_bytes(b"frame").unwrap();
        let eps = endpoints(vec![
            MockCalendar::failing("https://a.example"),
            MockCalendar::failing("https://b.example"),
            MockCalendar::new("https://c.example", MockBehavior::Attested { height: 5 }),
        ]);
        let submission = TimestampProofClient::default()
            .submit(digest, &eps, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(submission.state, SubmissionState::Attested);
        assert_eq!(submission.accepted(), 1);
        assert!(matches!(
            submission.endpoints[0].outcome,
            EndpointOutcome::Failed(_) | EndpointOutcome::Cancelled
        ));
        assert_eq!(submission.endpoints[2].outcome, EndpointOutcome::Attested);
    }

    #[tokio::test]
    async fn test_all_failures_reported() {
        let digest = digest_bytes(b"frame").unwrap();
        let eps = endpoints(vec![
            MockCalendar::failing("https://a.example"),
            MockCalendar::failing("https://b.example"),
        ]);
        let err = TimestampProofClient::default()
            .submit(digest, &eps, Duration::from_secs(1))
            .await
            .unwrap_err();

        match err {
            EvidenceError::AllEndpointsFailed { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_count_as_failures() {
        let digest = digest_bytes(b"frame").unwrap();
        let eps = endpoints(vec![MockCalendar::new(
            "https://slow.example",
            MockBehavior::Delay(Duration::from_secs(30)),
        )]);
        let err = TimestampProofClient::default()
            .submit(digest, &eps, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EvidenceError::AllEndpointsFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_endpoint_cancelled_after_first_success() {
        let digest = digest_bytes(b"frame").unwrap();
        let eps = endpoints(vec![
            MockCalendar::new("https://slow.example", MockBehavior::Delay(Duration::from_secs(5))),
            MockCalendar::pending(),
        ]);
        let submission = TimestampProofClient::default()
            .submit(digest, &eps, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(submission.endpoints[0].outcome, EndpointOutcome::Cancelled);
        assert_eq!(submission.endpoints[1].outcome, EndpointOutcome::Pending);
    }

    #[tokio::test]
    async fn test_upgrade_replaces_pending_leaf() {
        let digest = digest_bytes(b"frame").unwrap();
        let calendar = Arc::new(MockCalendar::pending());
        let eps: Vec<Arc<dyn CalendarEndpoint>> = vec![calendar.clone()];
        let client = TimestampProofClient::default();
        let mut proof = client
            .submit(digest, &eps, Duration::from_secs(1))
            .await
            .unwrap()
            .proof;

        let report = client.upgrade(&mut proof, &eps, Duration::from_secs(1)).await.unwrap();
        assert_eq!(report.still_pending, 1);
        assert!(!report.changed());

        calendar.anchor(800_000);
        let report = client.upgrade(&mut proof, &eps, Duration::from_secs(1)).await.unwrap();
        assert_eq!(report.upgraded, 1);
        assert_eq!(proof.state(), SubmissionState::Attested);
        assert!(proof
            .timestamp()
            .all_attestations()
            .iter()
            .all(|(_, a)| !a.is_pending()));
        assert!(proof.verify().is_ok());
    }

    #[tokio::test]
    async fn test_upgrade_skips_unknown_calendar() {
        let digest = digest_bytes(b"frame").unwrap();
        let client = TimestampProofClient::default();
        let mut proof = client
            .submit(digest, &endpoints(vec![MockCalendar::pending()]), Duration::from_secs(1))
            .await
            .unwrap()
            .proof;

        assert_eq!(pending_calendars(&proof), vec![crate::timestamp::mock::MOCK_CALENDAR_URL]);
        let report = client.upgrade(&mut proof, &[], Duration::from_secs(1)).await.unwrap();
        assert_eq!(report.skipped, 1);
    }
}
