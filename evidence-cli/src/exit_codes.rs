//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use std::fmt;
use std::io;

use evidence_core::EvidenceError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (bad bundle, digest mismatch, tampered content).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (every calendar failed).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Help text appended to `--help`.
pub const HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Invalid arguments (e.g. scale outside (0, 1])
  65  Bundle is malformed or its parts disagree
  66  Input file not found
  69  No calendar accepted the commitment
  74  Output could not be written";

/// An evidence bundle whose parts do not agree with each other.
#[derive(Debug)]
pub struct Tampered(pub String);

impl fmt::Display for Tampered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bundle verification failed: {}", self.0)
    }
}

impl std::error::Error for Tampered {}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                if cause.downcast_ref::<Tampered>().is_some() {
                    Some(DATA_ERROR)
                } else if let Some(e) = cause.downcast_ref::<EvidenceError>() {
                    Some(classify(e))
                } else {
                    cause.downcast_ref::<io::Error>().map(classify_io)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(format!("{err:#}")),
        }
    }
}

fn classify(err: &EvidenceError) -> i32 {
    match err {
        EvidenceError::InvalidGeometry(_) => USAGE_ERROR,
        EvidenceError::EmptyInput
        | EvidenceError::ImageEncoding(_)
        | EvidenceError::InvalidProof(_)
        | EvidenceError::PackagingFailure(_)
        | EvidenceError::SerializationError(_) => DATA_ERROR,
        EvidenceError::NetworkFailure { .. }
        | EvidenceError::AllEndpointsFailed { .. }
        | EvidenceError::HttpError(_) => NETWORK_ERROR,
        EvidenceError::Io(e) => classify_io(e),
        EvidenceError::NoFrameSource => GENERAL_ERROR,
    }
}

fn classify_io(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound => INPUT_ERROR,
        _ => IO_ERROR,
    }
}
