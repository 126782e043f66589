//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use evidence_core::{unpack, SubmissionState, UnpackedBundle};
use tracing::debug;

/// Read and unpack a bundle file.
pub fn load_bundle(path: &Path) -> Result<UnpackedBundle> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read bundle: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read bundle");

    unpack(&bytes).with_context(|| format!("Failed to unpack bundle: {}", path.display()))
}

/// First `len` characters of a hex string, for compact display.
pub fn short_hex(hex: &str, len: usize) -> &str {
    hex.get(..len).unwrap_or(hex)
}

/// Colored label for a proof state.
pub fn state_label(state: SubmissionState) -> ColoredString {
    let label = state.to_string();
    match state {
        SubmissionState::Attested => label.green().bold(),
        SubmissionState::Pending | SubmissionState::Submitted => label.yellow().bold(),
        SubmissionState::Created | SubmissionState::Failed => label.red().bold(),
    }
}
