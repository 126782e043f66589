//! Capture sessions: one frame in, one evidence bundle out.
//!
//! A [`CaptureSession`] owns the active [`FrameSource`] and a
//! [`GeolocationSource`], and runs the pipeline
//!
//! ```text
//! frame -> compose -> digest -> submit -> metadata -> pack
//! ```
//!
//! for one capture at a time. Capture is all-or-nothing: any failure,
//! including every calendar failing, yields an error and no bundle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::bundle::{check_capture_time, BundleBuilder, EvidenceBundle};
use crate::digest::{digest, Digest};
use crate::error::{EvidenceError, Result};
use crate::frame::{RawFrame, ScaleFactor};
use crate::metadata::{EnvironmentInfo, EvidenceMetadata, Geolocation};
use crate::timestamp::{
    CalendarEndpoint, EndpointReport, SubmissionState, TimestampProofClient,
};
use crate::watermark::{compose, OverlayStyle, WatermarkSpec};

/// Supplies raw frames, e.g. a camera stream.
pub trait FrameSource: Send {
    /// Grab the frame currently on offer.
    fn current_frame(&mut self) -> Result<RawFrame>;

    /// Short human-readable label for logs.
    fn describe(&self) -> String;
}

/// Supplies the device position. Absence is a value, not an error.
pub trait GeolocationSource: Send + Sync {
    fn last_known_position(&self) -> Geolocation;
}

/// Reads and decodes an image file on every capture.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileSource {
    fn current_frame(&mut self) -> Result<RawFrame> {
        let bytes = std::fs::read(&self.path)?;
        RawFrame::decode(&bytes)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Hands out clones of one in-memory frame.
#[derive(Debug, Clone)]
pub struct StaticFrameSource {
    frame: RawFrame,
}

impl StaticFrameSource {
    pub fn new(frame: RawFrame) -> Self {
        Self { frame }
    }
}

impl FrameSource for StaticFrameSource {
    fn current_frame(&mut self) -> Result<RawFrame> {
        Ok(self.frame.clone())
    }

    fn describe(&self) -> String {
        format!("static:{}x{}", self.frame.width(), self.frame.height())
    }
}

/// Always reports the same position (or none).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGeolocation(pub Geolocation);

impl GeolocationSource for FixedGeolocation {
    fn last_known_position(&self) -> Geolocation {
        self.0
    }
}

/// Per-capture settings.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub scale: ScaleFactor,
    /// Deadline for each calendar endpoint.
    pub timeout: Duration,
    pub style: OverlayStyle,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: ScaleFactor::FULL,
            timeout: Duration::from_secs(10),
            style: OverlayStyle::default(),
        }
    }
}

/// Everything produced by one successful capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub bundle: EvidenceBundle,
    pub digest: Digest,
    pub metadata: EvidenceMetadata,
    pub state: SubmissionState,
    pub endpoints: Vec<EndpointReport>,
}

impl CaptureOutcome {
    /// Write the bundle into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        self.bundle.write_to_dir(dir)
    }
}

/// Owns the capture collaborators and runs the pipeline.
pub struct CaptureSession {
    source: Option<Box<dyn FrameSource>>,
    geolocation: Box<dyn GeolocationSource>,
    endpoints: Vec<Arc<dyn CalendarEndpoint>>,
    client: TimestampProofClient,
    environment: EnvironmentInfo,
    options: CaptureOptions,
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("source", &self.source.as_ref().map(|s| s.describe()))
            .field("endpoints", &self.endpoints.iter().map(|e| e.url()).collect::<Vec<_>>())
            .field("client", &self.client)
            .field("options", &self.options)
            .finish()
    }
}

impl CaptureSession {
    /// A session without a frame source and without a position.
    pub fn new(endpoints: Vec<Arc<dyn CalendarEndpoint>>) -> Self {
        Self {
            source: None,
            geolocation: Box::new(FixedGeolocation(Geolocation::Unavailable)),
            endpoints,
            client: TimestampProofClient::default(),
            environment: EnvironmentInfo::detect(),
            options: CaptureOptions::default(),
        }
    }

    pub fn with_frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.replace_source(source);
        self
    }

    pub fn with_geolocation(mut self, geolocation: Box<dyn GeolocationSource>) -> Self {
        self.geolocation = geolocation;
        self
    }

    pub fn with_client(mut self, client: TimestampProofClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentInfo) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// Swap the frame source. The previous source is dropped before the new
    /// one is installed, so a device held by it is released first.
    pub fn replace_source(&mut self, source: Box<dyn FrameSource>) {
        if let Some(old) = self.source.take() {
            debug!(source = %old.describe(), "Releasing frame source");
            drop(old);
        }
        debug!(source = %source.describe(), "Frame source attached");
        self.source = Some(source);
    }

    /// Drop the current frame source, if any.
    pub fn release_source(&mut self) {
        if let Some(old) = self.source.take() {
            debug!(source = %old.describe(), "Releasing frame source");
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Capture now.
    pub async fn capture(&mut self) -> Result<CaptureOutcome> {
        self.capture_at(Utc::now()).await
    }

    /// Capture, stamping the evidence with `captured_at`.
    #[instrument(skip_all, fields(captured_at = %captured_at))]
    pub async fn capture_at(&mut self, captured_at: DateTime<Utc>) -> Result<CaptureOutcome> {
        // Checked before the commitment leaves the process
        check_capture_time(captured_at)?;

        let source = self.source.as_mut().ok_or(EvidenceError::NoFrameSource)?;
        let frame = source.current_frame()?;
        let location = self.geolocation.last_known_position();
        debug!(
            width = frame.width(),
            height = frame.height(),
            located = location.is_available(),
            "Frame acquired"
        );

        let spec = WatermarkSpec::provenance(captured_at, &location).with_style(self.options.style);
        let image = compose(frame, self.options.scale, &spec)?;
        let digest = digest(&image)?;
        info!(digest = %digest, bytes = image.as_bytes().len(), "Image composed");

        let submission = self
            .client
            .submit(digest, &self.endpoints, self.options.timeout)
            .await?;

        let metadata = EvidenceMetadata::compose(
            &digest.to_hex(),
            captured_at,
            &location,
            &self.environment,
            (image.width(), image.height()),
        );

        let bundle = BundleBuilder::new()
            .image(image)
            .metadata(metadata.clone())
            .proof(submission.proof)
            .build()?;

        info!(
            file_name = bundle.file_name(),
            state = %submission.state,
            "Capture complete"
        );

        Ok(CaptureOutcome {
            bundle,
            digest,
            metadata,
            state: submission.state,
            endpoints: submission.endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::MockCalendar;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        live: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(live: &Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self { live: Arc::clone(live) }
        }
    }

    impl Drop for CountingSource {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl FrameSource for CountingSource {
        fn current_frame(&mut self) -> Result<RawFrame> {
            RawFrame::solid(4, 4, [0, 0, 0, 255])
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    fn session() -> CaptureSession {
        CaptureSession::new(vec![Arc::new(MockCalendar::pending())])
    }

    #[test]
    fn test_replace_source_releases_previous() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut session = session().with_frame_source(Box::new(CountingSource::new(&live)));
        assert_eq!(live.load(Ordering::SeqCst), 1);

        session.replace_source(Box::new(CountingSource::new(&live)));
        assert_eq!(live.load(Ordering::SeqCst), 1);

        session.release_source();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(!session.has_source());
    }

    #[tokio::test]
    async fn test_capture_without_source_fails() {
        let err = session().capture().await.unwrap_err();
        assert!(matches!(err, EvidenceError::NoFrameSource));
    }

    #[tokio::test]
    async fn test_capture_produces_bundle() {
        let frame = RawFrame::solid(64, 48, [90, 90, 90, 255]).unwrap();
        let mut session = session()
            .with_frame_source(Box::new(StaticFrameSource::new(frame)))
            .with_geolocation(Box::new(FixedGeolocation(Geolocation::new(48.8584, 2.2945))));

        let outcome = session.capture().await.unwrap();
        assert_eq!(outcome.state, SubmissionState::Pending);
        assert_eq!(outcome.metadata.gps().lat, "48.858400");
        assert_eq!(outcome.metadata.hash_sha256(), outcome.digest.to_hex());
        assert!(outcome.bundle.file_name().starts_with("evidence_"));
    }

    #[tokio::test]
    async fn test_frame_source_error_propagates() {
        let mut session = session().with_frame_source(Box::new(ImageFileSource::new(
            "/nonexistent/frame.png",
        )));
        assert!(matches!(session.capture().await, Err(EvidenceError::Io(_))));
    }

    #[tokio::test]
    async fn test_unstorable_capture_time_rejected_before_submission() {
        use chrono::TimeZone;

        let calendar = Arc::new(MockCalendar::pending());
        let frame = RawFrame::solid(8, 8, [0, 0, 0, 255]).unwrap();
        let mut session = CaptureSession::new(vec![calendar.clone() as Arc<dyn CalendarEndpoint>])
            .with_frame_source(Box::new(StaticFrameSource::new(frame)));

        let at = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let err = session.capture_at(at).await.unwrap_err();
        assert!(matches!(err, EvidenceError::PackagingFailure(_)));
        assert_eq!(calendar.submissions(), 0);
    }
}
