//! End-to-end capture against the in-process mock calendar.
//!
//! Run with: cargo run -p evidence-core --example mock_capture

use std::sync::Arc;

use evidence_core::{
    unpack, CalendarEndpoint, CaptureSession, FixedGeolocation, Geolocation, MockCalendar,
    RawFrame, StaticFrameSource, TimestampProofClient,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> evidence_core::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::new("evidence_core=debug,info"))
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Mock Capture Demo ===\n");

    let calendar = Arc::new(MockCalendar::pending());
    let endpoints: Vec<Arc<dyn CalendarEndpoint>> = vec![calendar.clone()];

    let frame = RawFrame::solid(640, 480, [40, 90, 160, 255])?;
    let mut session = CaptureSession::new(endpoints.clone())
        .with_frame_source(Box::new(StaticFrameSource::new(frame)))
        .with_geolocation(Box::new(FixedGeolocation(Geolocation::new(48.8584, 2.2945))));

    let outcome = session.capture().await?;
    println!("\nBundle:  {}", outcome.bundle.file_name());
    println!("SHA-256: {}", outcome.digest);
    println!("Proof:   {}", outcome.state);

    calendar.anchor(840_000);
    let mut proof = unpack(outcome.bundle.as_bytes())?.proof;
    let report = TimestampProofClient::default()
        .upgrade(&mut proof, &endpoints, std::time::Duration::from_secs(5))
        .await?;

    println!("\nUpgraded {} leaf(s), proof now {}", report.upgraded, proof.state());
    Ok(())
}
