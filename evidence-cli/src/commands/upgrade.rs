//! Upgrade command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use evidence_core::bundle::write_atomic;
use evidence_core::timestamp::{pending_calendars, RemoteCalendarConfig};
use evidence_core::{pack, CalendarEndpoint, RemoteCalendar, TimestampProofClient};
use tracing::{debug, info};

use crate::utils::{load_bundle, state_label};

/// Execute the upgrade command.
pub async fn execute(bundle_path: PathBuf, timeout: u64, allow_http: bool, quiet: bool) -> Result<()> {
    let bundle = load_bundle(&bundle_path)?;
    let mut proof = bundle.proof;

    let calendars = pending_calendars(&proof);
    if calendars.is_empty() {
        info!("No pending attestations");
        if !quiet {
            println!("{} {}", "Nothing to upgrade:".dimmed(), state_label(proof.state()));
        }
        return Ok(());
    }

    let config = RemoteCalendarConfig {
        timeout: Duration::from_secs(timeout),
        require_https: !allow_http,
        ..Default::default()
    };
    let endpoints = calendars
        .iter()
        .map(|url| {
            RemoteCalendar::with_config(url, config.clone())
                .map(|c| Arc::new(c) as Arc<dyn CalendarEndpoint>)
        })
        .collect::<evidence_core::Result<Vec<_>>>()
        .context("Failed to configure calendars")?;
    debug!(calendars = ?calendars, "Querying calendars");

    let report = TimestampProofClient::default()
        .upgrade(&mut proof, &endpoints, Duration::from_secs(timeout))
        .await
        .context("Upgrade failed")?;

    if report.changed() {
        let upgraded = pack(&bundle.image, &bundle.metadata, &proof)
            .context("Failed to repack bundle")?;
        write_atomic(&bundle_path, upgraded.as_bytes())
            .with_context(|| format!("Failed to write bundle: {}", bundle_path.display()))?;
        info!(path = %bundle_path.display(), upgraded = report.upgraded, "Bundle rewritten");
    }

    if !quiet {
        println!();
        if report.changed() {
            println!("{}", "Proof upgraded!".green().bold());
        } else {
            println!("{}", "Proof unchanged".yellow().bold());
        }
        println!();
        println!("   {} {}", "Upgraded:".dimmed(), report.upgraded);
        println!("   {} {}", "Still pending:".dimmed(), report.still_pending);
        println!("   {} {}", "Failed:".dimmed(), report.failed);
        println!("   {} {}", "Proof:".dimmed(), state_label(proof.state()));
    }

    Ok(())
}
