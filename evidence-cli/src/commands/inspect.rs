//! Inspect command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use evidence_core::{digest, Attestation};
use tracing::{debug, info};

use crate::exit_codes::Tampered;
use crate::utils::{load_bundle, state_label};

/// Execute the inspect command.
pub fn execute(bundle_path: PathBuf, quiet: bool) -> Result<()> {
    let bundle = load_bundle(&bundle_path)?;

    let recomputed = digest(&bundle.image)?;
    debug!(digest = %recomputed, "Recomputed image digest");

    if bundle.metadata.hash_sha256() != recomputed.to_hex() {
        return Err(Tampered(format!(
            "image digest {} does not match metadata {}",
            recomputed,
            bundle.metadata.hash_sha256()
        ))
        .into());
    }
    if bundle.proof.digest() != Some(recomputed) {
        return Err(Tampered("timestamp proof does not commit to the image digest".into()).into());
    }

    let resolution = bundle.metadata.image_resolution();
    if (resolution.width, resolution.height) != (bundle.image.width(), bundle.image.height()) {
        return Err(Tampered(format!(
            "metadata resolution {}x{} does not match image {}x{}",
            resolution.width,
            resolution.height,
            bundle.image.width(),
            bundle.image.height()
        ))
        .into());
    }

    let attestations = bundle
        .proof
        .verify()
        .map_err(|e| Tampered(format!("timestamp proof is invalid: {e}")))?;
    let state = bundle.proof.state();

    info!(
        path = %bundle_path.display(),
        state = %state,
        attestations = attestations.len(),
        "Bundle consistent"
    );

    if quiet {
        return Ok(());
    }

    let metadata = &bundle.metadata;
    let gps = metadata.gps();

    println!();
    println!("{}", "Bundle is consistent".green().bold());
    println!();
    println!("   {} {}", "Captured:".dimmed(), metadata.timestamp_utc());
    println!("   {} {}, {}", "Position:".dimmed(), gps.lat, gps.lon);
    println!("   {} {}", "SHA-256:".dimmed(), metadata.hash_sha256());
    println!(
        "   {} {}x{}",
        "Resolution:".dimmed(),
        resolution.width,
        resolution.height
    );
    println!(
        "   {} {} ({}, UTC offset {} min)",
        "Environment:".dimmed(),
        metadata.user_agent(),
        metadata.platform(),
        metadata.timezone_offset_min()
    );
    println!("   {} {}", "Proof:".dimmed(), state_label(state));

    for found in &attestations {
        let description = match &found.attestation {
            Attestation::Pending { uri } => format!("pending at {uri}"),
            Attestation::Bitcoin { height } => format!("Bitcoin block {height}"),
            Attestation::Litecoin { height } => format!("Litecoin block {height}"),
            Attestation::Unknown { tag, .. } => format!("unknown attestation {}", hex::encode(tag)),
        };
        println!(
            "     {} {}",
            description,
            format!("(message {})", hex::encode(&found.msg)).dimmed()
        );
    }

    Ok(())
}
