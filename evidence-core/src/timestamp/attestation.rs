//! Attestations: the leaves of a timestamp tree.

use std::cmp::Ordering;

use super::codec::{ProofReader, ProofWriter};
use crate::error::{EvidenceError, Result};

pub const ATTESTATION_TAG_LEN: usize = 8;
pub const MAX_PAYLOAD_LEN: usize = 8192;
pub const MAX_URI_LEN: usize = 1000;

pub const PENDING_TAG: [u8; 8] = [0x83, 0xdf, 0xe3, 0x0d, 0x2e, 0xf9, 0x0c, 0x8e];
pub const BITCOIN_TAG: [u8; 8] = [0x05, 0x88, 0x96, 0x0d, 0x73, 0xd7, 0x19, 0x01];
pub const LITECOIN_TAG: [u8; 8] = [0x06, 0x86, 0x9a, 0x0d, 0x73, 0xd7, 0x1b, 0x45];

/// Calendar URI carried by a pending attestation.
///
/// Only built through [`CalendarUri::new`], so it always satisfies the
/// length and character limits of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarUri(String);

impl CalendarUri {
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        validate_uri(&uri)?;
        Ok(Self(uri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CalendarUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A claim that the message at this node existed at or before some time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attestation {
    /// Calendar accepted the commitment; poll `uri` later for the full path.
    Pending { uri: CalendarUri },
    /// Commitment is included in the Bitcoin block at `height`.
    Bitcoin { height: u64 },
    /// Commitment is included in the Litecoin block at `height`.
    Litecoin { height: u64 },
    /// Attestation type this implementation does not interpret, kept verbatim.
    Unknown { tag: [u8; 8], payload: Vec<u8> },
}

impl Attestation {
    pub fn pending(uri: impl Into<String>) -> Result<Self> {
        Ok(Self::Pending {
            uri: CalendarUri::new(uri)?,
        })
    }

    /// Check the limits the decoder enforces, so anything that passes here
    /// reads back as the same attestation.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Unknown { tag, payload } => {
                if matches!(*tag, PENDING_TAG | BITCOIN_TAG | LITECOIN_TAG) {
                    return Err(EvidenceError::InvalidProof(format!(
                        "unknown attestation reuses known tag {}",
                        hex::encode(tag)
                    )));
                }
                if payload.len() > MAX_PAYLOAD_LEN {
                    return Err(EvidenceError::InvalidProof(format!(
                        "attestation payload of {} bytes exceeds {MAX_PAYLOAD_LEN}",
                        payload.len()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn tag(&self) -> [u8; 8] {
        match self {
            Self::Pending { .. } => PENDING_TAG,
            Self::Bitcoin { .. } => BITCOIN_TAG,
            Self::Litecoin { .. } => LITECOIN_TAG,
            Self::Unknown { tag, .. } => *tag,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Calendar URI of a pending attestation.
    pub fn calendar_uri(&self) -> Option<&str> {
        match self {
            Self::Pending { uri } => Some(uri.as_str()),
            _ => None,
        }
    }

    fn payload(&self) -> Vec<u8> {
        let mut w = ProofWriter::new();
        match self {
            Self::Pending { uri } => w.write_varbytes(uri.as_str().as_bytes()),
            Self::Bitcoin { height } | Self::Litecoin { height } => w.write_varuint(*height),
            Self::Unknown { payload, .. } => w.write_bytes(payload),
        }
        w.into_inner()
    }

    pub fn encode(&self, w: &mut ProofWriter) {
        w.write_bytes(&self.tag());
        w.write_varbytes(&self.payload());
    }

    pub fn decode(r: &mut ProofReader<'_>) -> Result<Self> {
        let tag: [u8; 8] = r
            .read_bytes(ATTESTATION_TAG_LEN)?
            .try_into()
            .map_err(|_| EvidenceError::InvalidProof("short attestation tag".into()))?;
        let payload = r.read_varbytes(0, MAX_PAYLOAD_LEN)?;
        let mut inner = ProofReader::new(payload);

        let attestation = match tag {
            PENDING_TAG => {
                let raw = inner.read_varbytes(0, MAX_URI_LEN)?;
                let uri = std::str::from_utf8(raw)
                    .map_err(|_| EvidenceError::InvalidProof("pending URI is not UTF-8".into()))?;
                Self::pending(uri)?
            }
            BITCOIN_TAG => Self::Bitcoin {
                height: inner.read_varuint()?,
            },
            LITECOIN_TAG => Self::Litecoin {
                height: inner.read_varuint()?,
            },
            _ => {
                return Ok(Self::Unknown {
                    tag,
                    payload: payload.to_vec(),
                })
            }
        };

        inner.expect_eof()?;
        Ok(attestation)
    }
}

impl Ord for Attestation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tag()
            .cmp(&other.tag())
            .then_with(|| self.payload().cmp(&other.payload()))
    }
}

impl PartialOrd for Attestation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Attestation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending { uri } => write!(f, "pending at {uri}"),
            Self::Bitcoin { height } => write!(f, "bitcoin block {height}"),
            Self::Litecoin { height } => write!(f, "litecoin block {height}"),
            Self::Unknown { tag, .. } => write!(f, "unknown attestation {}", hex::encode(tag)),
        }
    }
}

fn validate_uri(uri: &str) -> Result<()> {
    if uri.len() > MAX_URI_LEN {
        return Err(EvidenceError::InvalidProof(format!(
            "calendar URI longer than {MAX_URI_LEN} bytes"
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | ':');
    if let Some(bad) = uri.chars().find(|c| !allowed(*c)) {
        return Err(EvidenceError::InvalidProof(format!(
            "calendar URI contains disallowed character {bad:?}"
        )));
    }
    Ok(())
}
