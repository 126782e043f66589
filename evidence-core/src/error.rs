use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Cannot hash an empty byte sequence")]
    EmptyInput,

    #[error("No frame source attached to the capture session")]
    NoFrameSource,

    #[error("Network failure at {endpoint}: {reason}")]
    NetworkFailure { endpoint: String, reason: String },

    #[error("All {} attestation endpoints failed: {}", failures.len(), failures.join("; "))]
    AllEndpointsFailed { failures: Vec<String> },

    #[error("Packaging failure: {0}")]
    PackagingFailure(String),

    #[error("Invalid timestamp proof: {0}")]
    InvalidProof(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Image encoding error: {0}")]
    ImageEncoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
