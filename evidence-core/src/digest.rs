//! Integrity hashing of encoded images.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{EvidenceError, Result};
use crate::frame::EncodedImage;

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of an [`EncodedImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string (either case).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes: [u8; DIGEST_LEN] = hex::decode(hex_str)
            .map_err(|e| EvidenceError::SerializationError(format!("Invalid digest hex: {e}")))?
            .try_into()
            .map_err(|v: Vec<u8>| {
                EvidenceError::SerializationError(format!(
                    "Expected {DIGEST_LEN} digest bytes, got {}",
                    v.len()
                ))
            })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering used in metadata.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash the complete encoded image.
pub fn digest(image: &EncodedImage) -> Result<Digest> {
    digest_bytes(image.as_bytes())
}

/// Hash an arbitrary non-empty byte sequence.
pub fn digest_bytes(bytes: &[u8]) -> Result<Digest> {
    if bytes.is_empty() {
        return Err(EvidenceError::EmptyInput);
    }
    Ok(Digest(sha256(bytes)))
}

pub(crate) fn sha256(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let d = digest_bytes(b"abc").unwrap();
        assert_eq!(
            d.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_input_rejected() {
        let image = EncodedImage::new(Vec::new(), 1, 1);
        assert!(matches!(digest(&image), Err(EvidenceError::EmptyInput)));
    }

    #[test]
    fn test_hex_roundtrip_and_case() {
        let d = digest_bytes(b"evidence").unwrap();
        let upper = d.to_hex().to_uppercase();
        assert_eq!(Digest::from_hex(&upper).unwrap(), d);
        assert_eq!(d.to_string(), d.to_hex());
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(Digest::from_hex("abcd").is_err());
        assert!(Digest::from_hex("zz").is_err());
    }
}
