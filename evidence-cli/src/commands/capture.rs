//! Capture command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use evidence_core::timestamp::EndpointOutcome;
use evidence_core::{
    CalendarConfig, CalendarEndpoint, CaptureOptions, CaptureSession, FixedGeolocation,
    Geolocation, ImageFileSource, MockCalendar, ScaleFactor, TimestampProofClient,
};
use tracing::{info, warn};

use crate::utils::{short_hex, state_label};

pub struct CaptureArgs {
    pub image: PathBuf,
    pub scale: f64,
    pub position: Option<(f64, f64)>,
    pub calendars: Vec<String>,
    pub timeout: Option<u64>,
    pub min_attestations: Option<usize>,
    pub out: PathBuf,
    pub mock_calendar: bool,
    pub allow_http: bool,
    pub quiet: bool,
}

/// Merge command-line overrides into the environment configuration.
fn calendar_config(args: &CaptureArgs) -> CalendarConfig {
    let mut config = CalendarConfig::from_env();
    if !args.calendars.is_empty() {
        config.calendars = args.calendars.clone();
    }
    if let Some(secs) = args.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(n) = args.min_attestations {
        config.min_attestations = n.max(1);
    }
    if args.allow_http {
        config.require_https = false;
    }
    config
}

/// Execute the capture command.
pub async fn execute(args: CaptureArgs) -> Result<()> {
    let scale = ScaleFactor::new(args.scale).context("Invalid --scale")?;

    let location = match args.position {
        Some((lat, lon)) => Geolocation::checked(lat, lon).context("Invalid --lat/--lon")?,
        None => Geolocation::Unavailable,
    };

    std::fs::metadata(&args.image)
        .with_context(|| format!("Failed to read image: {}", args.image.display()))?;

    let config = calendar_config(&args);
    let endpoints: Vec<Arc<dyn CalendarEndpoint>> = if args.mock_calendar {
        warn!("Using MOCK calendar (attestations are not real!)");
        if !args.quiet {
            eprintln!("{}", "Using MOCK calendar (attestations are not real!)".yellow());
        }
        vec![Arc::new(MockCalendar::pending())]
    } else {
        config.endpoints().context("Failed to configure calendars")?
    };

    let mut session = CaptureSession::new(endpoints)
        .with_frame_source(Box::new(ImageFileSource::new(&args.image)))
        .with_geolocation(Box::new(FixedGeolocation(location)))
        .with_client(TimestampProofClient::new(config.min_attestations))
        .with_options(CaptureOptions {
            scale,
            timeout: config.timeout,
            ..Default::default()
        });

    let outcome = session.capture().await.context("Capture failed")?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory: {}", args.out.display()))?;
    let path = outcome
        .save(&args.out)
        .context("Failed to write bundle")?;

    info!(path = %path.display(), state = %outcome.state, "Evidence saved");

    if args.quiet {
        println!("{}", path.display());
        return Ok(());
    }

    let resolution = outcome.metadata.image_resolution();
    let gps = outcome.metadata.gps();

    println!();
    println!("{}", "Evidence captured!".green().bold());
    println!();
    println!("   {} {}", "Bundle:".dimmed(), path.display());
    println!("   {} {}", "SHA-256:".dimmed(), short_hex(&outcome.digest.to_hex(), 16));
    println!("   {} {}", "Captured:".dimmed(), outcome.metadata.timestamp_utc());
    println!("   {} {}, {}", "Position:".dimmed(), gps.lat, gps.lon);
    println!(
        "   {} {}x{}",
        "Resolution:".dimmed(),
        resolution.width,
        resolution.height
    );
    println!("   {} {}", "Proof:".dimmed(), state_label(outcome.state));
    for report in &outcome.endpoints {
        let status = match &report.outcome {
            EndpointOutcome::Pending => "pending".yellow(),
            EndpointOutcome::Attested => "attested".green(),
            EndpointOutcome::Failed(reason) => format!("failed ({reason})").red(),
            EndpointOutcome::Cancelled => "not awaited".dimmed(),
        };
        println!("     {} {}", report.url.dimmed(), status);
    }

    Ok(())
}
