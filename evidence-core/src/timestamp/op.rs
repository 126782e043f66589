//! Proof operations: hash functions and byte transformations.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use super::codec::{ProofReader, ProofWriter};
use crate::error::{EvidenceError, Result};

/// Largest message any operation may produce.
pub const MAX_MSG_LEN: usize = 4096;

pub const TAG_SHA1: u8 = 0x02;
pub const TAG_RIPEMD160: u8 = 0x03;
pub const TAG_SHA256: u8 = 0x08;
pub const TAG_KECCAK256: u8 = 0x67;
pub const TAG_APPEND: u8 = 0xf0;
pub const TAG_PREPEND: u8 = 0xf1;
pub const TAG_REVERSE: u8 = 0xf2;
pub const TAG_HEXLIFY: u8 = 0xf3;

/// A single edge of the timestamp tree.
///
/// Variant order follows tag order, so the derived `Ord` matches the
/// canonical serialization order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    Sha1,
    Ripemd160,
    Sha256,
    Keccak256,
    Append(Vec<u8>),
    Prepend(Vec<u8>),
    Reverse,
    Hexlify,
}

impl Op {
    pub fn tag(&self) -> u8 {
        match self {
            Op::Sha1 => TAG_SHA1,
            Op::Ripemd160 => TAG_RIPEMD160,
            Op::Sha256 => TAG_SHA256,
            Op::Keccak256 => TAG_KECCAK256,
            Op::Append(_) => TAG_APPEND,
            Op::Prepend(_) => TAG_PREPEND,
            Op::Reverse => TAG_REVERSE,
            Op::Hexlify => TAG_HEXLIFY,
        }
    }

    /// Output length for hash operations, `None` otherwise.
    pub fn digest_len(&self) -> Option<usize> {
        match self {
            Op::Sha1 | Op::Ripemd160 => Some(20),
            Op::Sha256 | Op::Keccak256 => Some(32),
            _ => None,
        }
    }

    pub fn is_hash(&self) -> bool {
        self.digest_len().is_some()
    }

    /// Execute the operation on `msg`.
    pub fn apply(&self, msg: &[u8]) -> Result<Vec<u8>> {
        if msg.len() > MAX_MSG_LEN {
            return Err(EvidenceError::InvalidProof(format!(
                "message of {} bytes exceeds {MAX_MSG_LEN}",
                msg.len()
            )));
        }

        let out = match self {
            Op::Sha1 => Sha1::digest(msg).to_vec(),
            Op::Ripemd160 => Ripemd160::digest(msg).to_vec(),
            Op::Sha256 => Sha256::digest(msg).to_vec(),
            Op::Keccak256 => Keccak256::digest(msg).to_vec(),
            Op::Append(arg) | Op::Prepend(arg) if arg.is_empty() => {
                return Err(EvidenceError::InvalidProof(format!(
                    "{} requires a non-empty argument",
                    if self.tag() == TAG_APPEND { "append" } else { "prepend" }
                )));
            }
            Op::Append(arg) => [msg, arg.as_slice()].concat(),
            Op::Prepend(arg) => [arg.as_slice(), msg].concat(),
            Op::Reverse | Op::Hexlify if msg.is_empty() => {
                return Err(EvidenceError::InvalidProof(format!(
                    "{self} requires a non-empty message"
                )));
            }
            Op::Reverse => msg.iter().rev().copied().collect(),
            Op::Hexlify => hex::encode(msg).into_bytes(),
        };

        if out.len() > MAX_MSG_LEN {
            return Err(EvidenceError::InvalidProof(format!(
                "{self} would produce {} bytes, limit is {MAX_MSG_LEN}",
                out.len()
            )));
        }
        Ok(out)
    }

    pub fn encode(&self, w: &mut ProofWriter) {
        w.write_byte(self.tag());
        if let Op::Append(arg) | Op::Prepend(arg) = self {
            w.write_varbytes(arg);
        }
    }

    /// Decode the operation introduced by `tag`.
    pub fn decode_with_tag(tag: u8, r: &mut ProofReader<'_>) -> Result<Self> {
        let op = match tag {
            TAG_SHA1 => Op::Sha1,
            TAG_RIPEMD160 => Op::Ripemd160,
            TAG_SHA256 => Op::Sha256,
            TAG_KECCAK256 => Op::Keccak256,
            TAG_APPEND => Op::Append(r.read_varbytes(1, MAX_MSG_LEN)?.to_vec()),
            TAG_PREPEND => Op::Prepend(r.read_varbytes(1, MAX_MSG_LEN)?.to_vec()),
            TAG_REVERSE => Op::Reverse,
            TAG_HEXLIFY => Op::Hexlify,
            other => {
                return Err(EvidenceError::InvalidProof(format!(
                    "unknown operation tag 0x{other:02x}"
                )))
            }
        };
        Ok(op)
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Sha1 => write!(f, "sha1"),
            Op::Ripemd160 => write!(f, "ripemd160"),
            Op::Sha256 => write!(f, "sha256"),
            Op::Keccak256 => write!(f, "keccak256"),
            Op::Append(arg) => write!(f, "append {}", hex::encode(arg)),
            Op::Prepend(arg) => write!(f, "prepend {}", hex::encode(arg)),
            Op::Reverse => write!(f, "reverse"),
            Op::Hexlify => write!(f, "hexlify"),
        }
    }
}
