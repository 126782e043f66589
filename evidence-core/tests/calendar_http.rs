//! Calendar HTTP contract tests.
//!
//! Runs `RemoteCalendar` and `TimestampProofClient` against wiremock servers
//! standing in for OpenTimestamps calendars.

use std::sync::Arc;
use std::time::Duration;

use evidence_core::digest_bytes;
use evidence_core::timestamp::{
    Attestation, CalendarEndpoint, EndpointOutcome, Op, RemoteCalendar, RemoteCalendarConfig,
    SubmissionState, Timestamp, TimestampProofClient,
};
use evidence_core::EvidenceError;
use wiremock::matchers::{body_bytes, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OTS_ACCEPT: &str = "application/vnd.opentimestamps.v1";

fn calendar(server: &MockServer) -> RemoteCalendar {
    let config = RemoteCalendarConfig {
        timeout: Duration::from_secs(5),
        max_retries: 1,
        require_https: false,
    };
    RemoteCalendar::with_config(&server.uri(), config).expect("calendar build")
}

/// Headerless tree body: prepend, sha256, then a pending attestation.
/// The encoding does not depend on the root message.
fn pending_body(uri: &str) -> Vec<u8> {
    let mut tree = Timestamp::new(vec![0u8; 32]);
    tree.add_op(Op::Prepend(vec![0, 0, 0, 0, 0, 0, 0, 42]))
        .expect("prepend")
        .add_op(Op::Sha256)
        .expect("sha256")
        .add_attestation(Attestation::pending(uri).expect("uri"));
    tree.to_bytes().expect("encode")
}

fn bitcoin_body(height: u64) -> Vec<u8> {
    let mut tree = Timestamp::new(vec![0u8; 32]);
    tree.add_op(Op::Append(b"block".to_vec()))
        .expect("append")
        .add_op(Op::Sha256)
        .expect("sha256")
        .add_attestation(Attestation::Bitcoin { height });
    tree.to_bytes().expect("encode")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_posts_raw_commitment() {
    let server = MockServer::start().await;
    let commitment = [0x5au8; 32];

    Mock::given(method("POST"))
        .and(path("/digest"))
        .and(header("Accept", OTS_ACCEPT))
        .and(body_bytes(commitment.to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pending_body(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    let tree = calendar(&server).submit(&commitment).await.expect("submit");

    assert_eq!(tree.msg(), &commitment);
    assert_eq!(tree.state(), SubmissionState::Pending);
    let (_, attestation) = tree.all_attestations()[0];
    assert_eq!(attestation.calendar_uri(), Some(server.uri().as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_not_found_means_pending() {
    let server = MockServer::start().await;
    let commitment = [0x11u8; 32];

    Mock::given(method("GET"))
        .and(path(format!("/timestamp/{}", hex::encode(commitment))))
        .respond_with(ResponseTemplate::new(404).set_body_string("Pending confirmation in Bitcoin blockchain"))
        .expect(1)
        .mount(&server)
        .await;

    let result = calendar(&server)
        .fetch_timestamp(&commitment)
        .await
        .expect("fetch");
    assert!(result.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_returns_anchored_tree() {
    let server = MockServer::start().await;
    let commitment = [0x22u8; 32];

    Mock::given(method("GET"))
        .and(path(format!("/timestamp/{}", hex::encode(commitment))))
        .and(header("Accept", OTS_ACCEPT))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bitcoin_body(840_000)))
        .expect(1)
        .mount(&server)
        .await;

    let tree = calendar(&server)
        .fetch_timestamp(&commitment)
        .await
        .expect("fetch")
        .expect("tree");
    assert_eq!(tree.state(), SubmissionState::Attested);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_status_retried_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pending_body(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    assert!(calendar(&server).submit(&[1u8; 32]).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_error_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = calendar(&server).submit(&[1u8; 32]).await.unwrap_err();
    assert!(matches!(err, EvidenceError::NetworkFailure { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_response_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20_000]))
        .mount(&server)
        .await;

    assert!(calendar(&server).submit(&[1u8; 32]).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_response_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x42, 0x42]))
        .mount(&server)
        .await;

    let err = calendar(&server).submit(&[1u8; 32]).await.unwrap_err();
    assert!(matches!(err, EvidenceError::InvalidProof(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_then_upgrade_through_client() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pending_body(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/timestamp/[0-9a-f]{64}$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bitcoin_body(800_123)))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints: Vec<Arc<dyn CalendarEndpoint>> = vec![Arc::new(calendar(&server))];
    let client = TimestampProofClient::default();
    let digest = digest_bytes(b"frame bytes").expect("digest");

    let submission = client
        .submit(digest, &endpoints, Duration::from_secs(5))
        .await
        .expect("submit");
    assert_eq!(submission.state, SubmissionState::Pending);

    let mut proof = submission.proof;
    let report = client
        .upgrade(&mut proof, &endpoints, Duration::from_secs(5))
        .await
        .expect("upgrade");

    assert_eq!(report.upgraded, 1);
    assert_eq!(proof.state(), SubmissionState::Attested);
    let found = proof.verify().expect("verify");
    assert!(found
        .iter()
        .any(|v| v.attestation == Attestation::Bitcoin { height: 800_123 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_calendar_failing_is_an_error() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("POST"))
            .and(path("/digest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    let endpoints: Vec<Arc<dyn CalendarEndpoint>> =
        vec![Arc::new(calendar(&first)), Arc::new(calendar(&second))];
    let digest = digest_bytes(b"frame bytes").expect("digest");

    let err = TimestampProofClient::default()
        .submit(digest, &endpoints, Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        EvidenceError::AllEndpointsFailed { failures } => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_calendar_times_out_while_other_answers() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(pending_body(&slow.uri()))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("POST"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pending_body(&fast.uri())))
        .mount(&fast)
        .await;

    let endpoints: Vec<Arc<dyn CalendarEndpoint>> =
        vec![Arc::new(calendar(&slow)), Arc::new(calendar(&fast))];
    let digest = digest_bytes(b"frame bytes").expect("digest");

    let submission = TimestampProofClient::new(2)
        .submit(digest, &endpoints, Duration::from_millis(500))
        .await
        .expect("submit");

    assert_eq!(submission.accepted(), 1);
    assert!(matches!(submission.endpoints[0].outcome, EndpointOutcome::Failed(_)));
    assert_eq!(submission.endpoints[1].outcome, EndpointOutcome::Pending);
}
