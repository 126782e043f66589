//! Detached timestamp proofs (`.ots` files).

use super::attestation::Attestation;
use super::codec::{ProofReader, ProofWriter};
use super::op::Op;
use super::tree::Timestamp;
use super::SubmissionState;
use crate::digest::Digest;
use crate::error::{EvidenceError, Result};

/// Magic bytes opening every serialized proof.
pub const HEADER_MAGIC: &[u8; 31] =
    b"\x00OpenTimestamps\x00\x00Proof\x00\xbf\x89\xe2\xe8\x84\xe8\x92\x94";

/// Format major version written after the magic.
pub const MAJOR_VERSION: u64 = 1;

/// A digest tagged with the hash operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    hash_op: Op,
    digest: Vec<u8>,
}

impl Commitment {
    /// Commitment for a SHA-256 digest.
    pub fn sha256(digest: &Digest) -> Self {
        Self {
            hash_op: Op::Sha256,
            digest: digest.as_bytes().to_vec(),
        }
    }

    pub fn new(hash_op: Op, digest: Vec<u8>) -> Result<Self> {
        match hash_op.digest_len() {
            Some(len) if len == digest.len() => Ok(Self { hash_op, digest }),
            Some(len) => Err(EvidenceError::InvalidProof(format!(
                "{hash_op} digest must be {len} bytes, got {}",
                digest.len()
            ))),
            None => Err(EvidenceError::InvalidProof(format!(
                "{hash_op} is not a hash operation"
            ))),
        }
    }

    pub fn hash_op(&self) -> &Op {
        &self.hash_op
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}

/// One attestation found by [`TimestampProof::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAttestation {
    /// Message the attestation commits to.
    pub msg: Vec<u8>,
    pub attestation: Attestation,
}

/// A commitment plus the tree of operations and attestations rooted at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampProof {
    hash_op: Op,
    timestamp: Timestamp,
}

impl TimestampProof {
    /// An empty proof containing only the commitment.
    pub fn new(commitment: Commitment) -> Self {
        Self {
            timestamp: Timestamp::new(commitment.digest),
            hash_op: commitment.hash_op,
        }
    }

    pub fn commitment(&self) -> Commitment {
        Commitment {
            hash_op: self.hash_op.clone(),
            digest: self.timestamp.msg().to_vec(),
        }
    }

    /// The committed digest when it is SHA-256.
    pub fn digest(&self) -> Option<Digest> {
        if self.hash_op != Op::Sha256 {
            return None;
        }
        self.timestamp
            .msg()
            .try_into()
            .ok()
            .map(Digest::from_bytes)
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn timestamp_mut(&mut self) -> &mut Timestamp {
        &mut self.timestamp
    }

    pub fn state(&self) -> SubmissionState {
        self.timestamp.state()
    }

    /// Serialize with header. Fails for a proof with no attestations yet.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = ProofWriter::new();
        w.write_bytes(HEADER_MAGIC);
        w.write_varuint(MAJOR_VERSION);
        self.hash_op.encode(&mut w);
        w.write_bytes(self.timestamp.msg());
        self.timestamp.encode(&mut w)?;
        Ok(w.into_inner())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r = ProofReader::new(bytes);

        let magic = r.read_bytes(HEADER_MAGIC.len())?;
        if magic != HEADER_MAGIC {
            return Err(EvidenceError::InvalidProof(
                "missing timestamp proof header".into(),
            ));
        }

        let version = r.read_varuint()?;
        if version != MAJOR_VERSION {
            return Err(EvidenceError::InvalidProof(format!(
                "unsupported proof version {version}"
            )));
        }

        let tag = r.read_byte()?;
        let hash_op = Op::decode_with_tag(tag, &mut r)?;
        let len = hash_op.digest_len().ok_or_else(|| {
            EvidenceError::InvalidProof(format!("{hash_op} is not a hash operation"))
        })?;
        let digest = r.read_bytes(len)?.to_vec();

        let timestamp = Timestamp::decode(&mut r, digest)?;
        r.expect_eof()?;

        Ok(Self { hash_op, timestamp })
    }

    /// Structural check of the proof.
    ///
    /// Re-executes every operation from the committed digest and returns each
    /// attestation with the message it covers. No ledger is consulted, so a
    /// pending or ledger attestation is only as trustworthy as its issuer
    /// until checked against the chain.
    pub fn verify(&self) -> Result<Vec<VerifiedAttestation>> {
        if self.hash_op.digest_len() != Some(self.timestamp.msg().len()) {
            return Err(EvidenceError::InvalidProof(format!(
                "digest length {} does not match {}",
                self.timestamp.msg().len(),
                self.hash_op
            )));
        }

        self.timestamp.check_consistency()?;

        let found: Vec<VerifiedAttestation> = self
            .timestamp
            .all_attestations()
            .into_iter()
            .map(|(msg, attestation)| VerifiedAttestation {
                msg: msg.to_vec(),
                attestation: attestation.clone(),
            })
            .collect();

        if found.is_empty() {
            return Err(EvidenceError::InvalidProof("proof has no attestations".into()));
        }
        Ok(found)
    }
}
