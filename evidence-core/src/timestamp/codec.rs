//! Byte-level reader and writer for the proof format.
//!
//! Integers are unsigned LEB128 ("varuint"); byte strings are a varuint
//! length followed by the bytes ("varbytes").

use crate::error::{EvidenceError, Result};

/// Append-only buffer for serializing proofs.
#[derive(Debug, Default)]
pub struct ProofWriter {
    buf: Vec<u8>,
}

impl ProofWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_varuint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_varbytes(&mut self, bytes: &[u8]) {
        self.write_varuint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over serialized proof bytes.
#[derive(Debug)]
pub struct ProofReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ProofReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| truncated(self.pos, 1))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| truncated(self.pos, len))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_varuint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift > 63 || (shift == 63 && byte & 0x7f > 1) {
                return Err(EvidenceError::InvalidProof("varuint overflows 64 bits".into()));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read a varbytes field whose length must fall in `min_len..=max_len`.
    pub fn read_varbytes(&mut self, min_len: usize, max_len: usize) -> Result<&'a [u8]> {
        let len = self.read_varuint()?;
        if len < min_len as u64 || len > max_len as u64 {
            return Err(EvidenceError::InvalidProof(format!(
                "varbytes length {len} outside {min_len}..={max_len}"
            )));
        }
        self.read_bytes(len as usize)
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn expect_eof(&self) -> Result<()> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(EvidenceError::InvalidProof(format!(
                "{} trailing bytes after proof",
                self.data.len() - self.pos
            )))
        }
    }
}

fn truncated(pos: usize, wanted: usize) -> EvidenceError {
    EvidenceError::InvalidProof(format!("unexpected end of data at offset {pos} (wanted {wanted} bytes)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varuint_encoding() {
        let cases: [(u64, &[u8]); 4] = [
            (0, &[0x00]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xac, 0x02]),
        ];
        for (value, expected) in cases {
            let mut w = ProofWriter::new();
            w.write_varuint(value);
            assert_eq!(w.into_inner(), expected, "encoding {value}");

            let mut r = ProofReader::new(expected);
            assert_eq!(r.read_varuint().unwrap(), value);
            assert!(r.is_eof());
        }
    }

    #[test]
    fn test_varuint_max_value() {
        let mut w = ProofWriter::new();
        w.write_varuint(u64::MAX);
        let bytes = w.into_inner();
        assert_eq!(ProofReader::new(&bytes).read_varuint().unwrap(), u64::MAX);
    }

    #[test]
    fn test_varuint_overflow_rejected() {
        let bytes = [0xff; 11];
        assert!(ProofReader::new(&bytes).read_varuint().is_err());
    }

    #[test]
    fn test_varbytes_bounds() {
        let mut w = ProofWriter::new();
        w.write_varbytes(b"abcd");
        let bytes = w.into_inner();

        assert_eq!(ProofReader::new(&bytes).read_varbytes(1, 4).unwrap(), b"abcd");
        assert!(ProofReader::new(&bytes).read_varbytes(1, 3).is_err());
        assert!(ProofReader::new(&bytes).read_varbytes(5, 10).is_err());
    }

    #[test]
    fn test_truncated_read() {
        let mut r = ProofReader::new(&[0x05, 0x01]);
        assert!(r.read_varbytes(0, 10).is_err());
    }

    #[test]
    fn test_expect_eof() {
        let mut r = ProofReader::new(&[1, 2]);
        r.read_byte().unwrap();
        assert!(r.expect_eof().is_err());
        r.read_byte().unwrap();
        assert!(r.expect_eof().is_ok());
    }
}
