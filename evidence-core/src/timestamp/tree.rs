//! The timestamp tree.
//!
//! Every node holds a message. Edges are [`Op`]s; a child's message is always
//! the result of applying its edge to the parent's message. Leaves carry
//! [`Attestation`]s about the message at that node.
//!
//! Messages are never serialized: they are recomputed from the root while
//! decoding, so a decoded tree is consistent by construction.

use std::collections::{BTreeMap, BTreeSet};

use super::attestation::Attestation;
use super::codec::{ProofReader, ProofWriter};
use super::op::Op;
use super::SubmissionState;
use crate::error::{EvidenceError, Result};

/// Most nodes on any root-to-leaf path, root included.
pub const MAX_DEPTH: usize = 256;

const ATTESTATION_MARKER: u8 = 0x00;
const FORK_MARKER: u8 = 0xff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    msg: Vec<u8>,
    attestations: BTreeSet<Attestation>,
    ops: BTreeMap<Op, Timestamp>,
}

impl Timestamp {
    pub fn new(msg: Vec<u8>) -> Self {
        Self {
            msg,
            attestations: BTreeSet::new(),
            ops: BTreeMap::new(),
        }
    }

    pub fn msg(&self) -> &[u8] {
        &self.msg
    }

    pub fn attestations(&self) -> impl Iterator<Item = &Attestation> {
        self.attestations.iter()
    }

    pub fn ops(&self) -> impl Iterator<Item = (&Op, &Timestamp)> {
        self.ops.iter()
    }

    /// True when the node has neither attestations nor children.
    pub fn is_empty(&self) -> bool {
        self.attestations.is_empty() && self.ops.is_empty()
    }

    pub fn add_attestation(&mut self, attestation: Attestation) {
        self.attestations.insert(attestation);
    }

    pub fn remove_attestation(&mut self, attestation: &Attestation) -> bool {
        self.attestations.remove(attestation)
    }

    /// Follow (or create) the edge `op`, returning the child node.
    pub fn add_op(&mut self, op: Op) -> Result<&mut Timestamp> {
        let child_msg = op.apply(&self.msg)?;
        Ok(self
            .ops
            .entry(op)
            .or_insert_with(|| Timestamp::new(child_msg)))
    }

    /// Hang an existing subtree under the edge `op`, merging with any subtree
    /// already there.
    pub fn attach(&mut self, op: Op, child: Timestamp) -> Result<()> {
        let expected = op.apply(&self.msg)?;
        if expected != child.msg {
            return Err(EvidenceError::InvalidProof(format!(
                "{op} of {} does not yield the child message {}",
                hex::encode(&self.msg),
                hex::encode(&child.msg)
            )));
        }
        match self.ops.get_mut(&op) {
            Some(existing) => existing.merge(child),
            None => {
                self.ops.insert(op, child);
                Ok(())
            }
        }
    }

    /// Union `other` into this tree. Both must start from the same message.
    pub fn merge(&mut self, other: Timestamp) -> Result<()> {
        if self.msg != other.msg {
            return Err(EvidenceError::InvalidProof(
                "cannot merge timestamps for different messages".into(),
            ));
        }
        self.attestations.extend(other.attestations);
        for (op, child) in other.ops {
            self.attach(op, child)?;
        }
        Ok(())
    }

    /// First node (depth-first) whose message equals `msg`.
    pub fn find_mut(&mut self, msg: &[u8]) -> Option<&mut Timestamp> {
        if self.msg == msg {
            return Some(self);
        }
        self.ops.values_mut().find_map(|child| child.find_mut(msg))
    }

    /// Every attestation in the tree with the message it attests to.
    pub fn all_attestations(&self) -> Vec<(&[u8], &Attestation)> {
        let mut out = Vec::new();
        self.collect_attestations(&mut out);
        out
    }

    fn collect_attestations<'a>(&'a self, out: &mut Vec<(&'a [u8], &'a Attestation)>) {
        out.extend(self.attestations.iter().map(|a| (self.msg.as_slice(), a)));
        for child in self.ops.values() {
            child.collect_attestations(out);
        }
    }

    /// Aggregate state: attested if any non-pending leaf exists.
    pub fn state(&self) -> SubmissionState {
        let all = self.all_attestations();
        if all.is_empty() {
            SubmissionState::Created
        } else if all.iter().any(|(_, a)| !a.is_pending()) {
            SubmissionState::Attested
        } else {
            SubmissionState::Pending
        }
    }

    /// Re-execute every edge and check it yields the stored child message.
    ///
    /// Also applies the decoder's limits (depth, empty nodes, attestation
    /// payloads), so a consistent tree always survives encode and decode.
    pub fn check_consistency(&self) -> Result<()> {
        self.check_at_depth(0)
    }

    fn check_at_depth(&self, depth: usize) -> Result<()> {
        if depth >= MAX_DEPTH {
            return Err(EvidenceError::InvalidProof(format!(
                "timestamp nested deeper than {MAX_DEPTH}"
            )));
        }
        if self.is_empty() {
            return Err(EvidenceError::InvalidProof(format!(
                "node {} has no attestations or operations",
                hex::encode(&self.msg)
            )));
        }
        for attestation in &self.attestations {
            attestation.validate()?;
        }
        for (op, child) in &self.ops {
            let expected = op.apply(&self.msg)?;
            if expected != child.msg {
                return Err(EvidenceError::InvalidProof(format!(
                    "{op} does not produce the recorded message"
                )));
            }
            child.check_at_depth(depth + 1)?;
        }
        Ok(())
    }

    pub fn encode(&self, w: &mut ProofWriter) -> Result<()> {
        if self.is_empty() {
            return Err(EvidenceError::InvalidProof(format!(
                "node {} has no attestations or operations",
                hex::encode(&self.msg)
            )));
        }

        let total = self.attestations.len() + self.ops.len();
        let mut written = 0;
        let mut next_item = |w: &mut ProofWriter| {
            written += 1;
            if written < total {
                w.write_byte(FORK_MARKER);
            }
        };

        for attestation in &self.attestations {
            next_item(w);
            w.write_byte(ATTESTATION_MARKER);
            attestation.encode(w);
        }
        for (op, child) in &self.ops {
            next_item(w);
            op.encode(w);
            child.encode(w)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut ProofReader<'_>, msg: Vec<u8>) -> Result<Self> {
        Self::decode_at_depth(r, msg, 0)
    }

    fn decode_at_depth(r: &mut ProofReader<'_>, msg: Vec<u8>, depth: usize) -> Result<Self> {
        if depth >= MAX_DEPTH {
            return Err(EvidenceError::InvalidProof(format!(
                "timestamp nested deeper than {MAX_DEPTH}"
            )));
        }

        let mut node = Timestamp::new(msg);
        let mut tag = r.read_byte()?;
        while tag == FORK_MARKER {
            let item = r.read_byte()?;
            node.decode_item(r, item, depth)?;
            tag = r.read_byte()?;
        }
        node.decode_item(r, tag, depth)?;
        Ok(node)
    }

    fn decode_item(&mut self, r: &mut ProofReader<'_>, tag: u8, depth: usize) -> Result<()> {
        if tag == ATTESTATION_MARKER {
            self.add_attestation(Attestation::decode(r)?);
            return Ok(());
        }
        let op = Op::decode_with_tag(tag, r)?;
        let child_msg = op.apply(&self.msg)?;
        let child = Self::decode_at_depth(r, child_msg, depth + 1)?;
        self.attach(op, child)
    }

    /// Serialize without any header (calendar wire format).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = ProofWriter::new();
        self.encode(&mut w)?;
        Ok(w.into_inner())
    }

    /// Parse a headerless tree rooted at `msg`, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8], msg: Vec<u8>) -> Result<Self> {
        let mut r = ProofReader::new(bytes);
        let node = Self::decode(&mut r, msg)?;
        r.expect_eof()?;
        Ok(node)
    }
}
