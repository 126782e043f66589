//! Evidence Core - tamper-evident image evidence
//!
//! This crate turns a captured frame into a self-contained evidence bundle:
//! the image with a burned-in provenance overlay, a SHA-256 digest of the
//! exact encoded bytes, and a third-party timestamp proof showing the digest
//! existed no later than a given time.
//!
//! # Features
//!
//! - Deterministic watermark compositing (integer rasterization, fixed PNG settings)
//! - SHA-256 integrity digests over the final encoded bytes
//! - OpenTimestamps-compatible proofs from one or more calendar servers
//! - Zip bundles binding image, metadata and proof
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use evidence_core::{CaptureSession, Geolocation, ImageFileSource, FixedGeolocation, MockCalendar};
//!
//! # async fn example() -> evidence_core::Result<()> {
//! // Mock calendar for local runs (use RemoteCalendar against real calendars)
//! let mut session = CaptureSession::new(vec![Arc::new(MockCalendar::pending())])
//!     .with_frame_source(Box::new(ImageFileSource::new("photo.jpg")))
//!     .with_geolocation(Box::new(FixedGeolocation(Geolocation::new(48.8584, 2.2945))));
//!
//! let outcome = session.capture().await?;
//! outcome.save(std::path::Path::new("."))?;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod digest;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod timestamp;
pub mod watermark;

#[cfg(feature = "network")]
pub mod capture;

// Re-export main types for convenience
pub use bundle::{pack, unpack, BundleBuilder, EvidenceBundle, UnpackedBundle};
pub use digest::{digest, digest_bytes, Digest};
pub use error::{EvidenceError, Result};
pub use frame::{EncodedImage, RawFrame, ScaleFactor};
pub use metadata::{EnvironmentInfo, EvidenceMetadata, Geolocation};
pub use timestamp::{Attestation, Commitment, SubmissionState, TimestampProof};
pub use watermark::{compose, WatermarkSpec};

// Network-dependent exports
#[cfg(feature = "network")]
pub use capture::{
    CaptureOptions, CaptureOutcome, CaptureSession, FixedGeolocation, FrameSource,
    GeolocationSource, ImageFileSource, StaticFrameSource,
};
#[cfg(feature = "network")]
pub use timestamp::{
    CalendarConfig, CalendarEndpoint, MockBehavior, MockCalendar, RemoteCalendar,
    TimestampProofClient,
};
