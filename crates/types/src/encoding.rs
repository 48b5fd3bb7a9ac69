// Path: crates/types/src/encoding.rs
//! The canonical, deterministic wire codec for all consensus-critical state.
//!
//! The byte format is fixed by the protocol: little-endian integers,
//! unsigned LEB128 varints for lengths, and positional layouts per
//! structure. The codec is bijective for every value that parses: decoding
//! and re-encoding any accepted byte string yields the same bytes, and
//! re-decoding an encoding yields the same value. All components must go
//! through this module for anything that is hashed or persisted; a second
//! serialization path would be a consensus failure waiting to happen.

use crate::hash::{Hash, HASH_SIZE};
use thiserror::Error;

/// The reason a decode failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeKind {
    /// The buffer ended before the field did.
    UnexpectedEnd,
    /// A varint used more groups than its value requires, or overflowed u64.
    NonCanonicalVarint,
    /// A fixed-range field carried an out-of-range value.
    ValueOutOfRange,
    /// A length prefix exceeded the structure's limit.
    Oversized,
    /// An enum tag byte did not name a known variant.
    BadTag,
    /// A top-level decode left unconsumed bytes.
    TrailingBytes,
}

/// A failed decode, with the byte offset at which it was detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("decode failed at offset {offset}: {kind:?}")]
pub struct DecodeError {
    /// What went wrong.
    pub kind: DecodeKind,
    /// Offset into the input buffer where the failure was detected.
    pub offset: usize,
}

/// A cursor over an input buffer that tracks its offset so every failure
/// can report where it happened.
#[derive(Debug)]
pub struct SliceReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> SliceReader<'a> {
    /// Wrap a buffer for reading from the start.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Current offset into the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Whether every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Build a `DecodeError` at the current offset.
    pub fn fail(&self, kind: DecodeKind) -> DecodeError {
        DecodeError {
            kind,
            offset: self.offset,
        }
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(self.fail(DecodeKind::UnexpectedEnd));
        }
        let out = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Read a 32-byte hash.
    pub fn read_hash(&mut self) -> Result<Hash, DecodeError> {
        Ok(Hash(self.read_array::<HASH_SIZE>()?))
    }

    /// Read a canonical unsigned LEB128 varint.
    ///
    /// Canonical means the minimal number of groups: a continuation into a
    /// final zero group (other than a lone zero) is rejected, as is anything
    /// that does not fit in a u64.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.offset;
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            let group = (byte & 0x7f) as u64;
            // The 10th group may only carry the single top bit of a u64.
            if shift == 63 && group > 1 {
                return Err(DecodeError {
                    kind: DecodeKind::NonCanonicalVarint,
                    offset: start,
                });
            }
            value |= group << shift;
            if byte & 0x80 == 0 {
                // A trailing zero group pads the encoding; reject it.
                if group == 0 && shift != 0 {
                    return Err(DecodeError {
                        kind: DecodeKind::NonCanonicalVarint,
                        offset: start,
                    });
                }
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError {
                    kind: DecodeKind::NonCanonicalVarint,
                    offset: start,
                });
            }
        }
    }

    /// Read a varint length prefix bounded by `max`, then that many bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<Vec<u8>, DecodeError> {
        let start = self.offset;
        let len = self.read_varint()?;
        if len > max as u64 {
            return Err(DecodeError {
                kind: DecodeKind::Oversized,
                offset: start,
            });
        }
        Ok(self.read_bytes(len as usize)?.to_vec())
    }

    /// Assert that the reader is fully consumed (top-level decodes only).
    pub fn expect_end(&self) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.fail(DecodeKind::TrailingBytes))
        }
    }
}

/// Append a canonical unsigned LEB128 varint.
pub fn write_varint(w: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.push(byte);
        if value == 0 {
            return;
        }
    }
}

/// Encoded size of a varint.
pub fn varint_size(value: u64) -> usize {
    match value {
        0 => 1,
        v => (70 - v.leading_zeros() as usize) / 7,
    }
}

/// Append a varint length prefix and the bytes themselves.
pub fn write_var_bytes(w: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(w, bytes.len() as u64);
    w.extend_from_slice(bytes);
}

/// Encoded size of a length-prefixed byte string.
pub fn var_bytes_size(bytes: &[u8]) -> usize {
    varint_size(bytes.len() as u64) + bytes.len()
}

/// A value with a fixed wire encoding. Writes are infallible.
pub trait Encodable {
    /// Exact size of the encoding in bytes.
    fn encoded_size(&self) -> usize;

    /// Append the encoding to `w`.
    fn write(&self, w: &mut Vec<u8>);

    /// Encode into a fresh buffer.
    fn encode(&self) -> Vec<u8> {
        let mut w = Vec::with_capacity(self.encoded_size());
        self.write(&mut w);
        w
    }
}

/// A value that can be read back from its wire encoding.
pub trait Decodable: Sized {
    /// Read one value, advancing the reader.
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError>;

    /// Decode a complete buffer, rejecting trailing bytes.
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = SliceReader::new(bytes);
        let value = Self::read(&mut r)?;
        r.expect_end()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn varint_known_values() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xac, 0x02]),
            (u64::MAX, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        ];
        for (value, bytes) in cases {
            let mut w = Vec::new();
            write_varint(&mut w, *value);
            assert_eq!(&w, bytes, "encoding of {value}");
            assert_eq!(varint_size(*value), bytes.len(), "size of {value}");
            let mut r = SliceReader::new(bytes);
            assert_eq!(r.read_varint().unwrap(), *value);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn varint_rejects_padding() {
        // 0x80 0x00 is a padded zero; the canonical form is 0x00.
        let mut r = SliceReader::new(&[0x80, 0x00]);
        assert_eq!(
            r.read_varint().unwrap_err().kind,
            DecodeKind::NonCanonicalVarint
        );
        // 0xff... with an 11th group overflows.
        let mut r = SliceReader::new(&[0xff; 11]);
        assert_eq!(
            r.read_varint().unwrap_err().kind,
            DecodeKind::NonCanonicalVarint
        );
        // A 10th group carrying more than the top bit overflows u64.
        let mut r = SliceReader::new(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02]);
        assert_eq!(
            r.read_varint().unwrap_err().kind,
            DecodeKind::NonCanonicalVarint
        );
    }

    #[test]
    fn short_buffer_reports_offset() {
        let mut r = SliceReader::new(&[1, 2, 3]);
        r.read_u16().unwrap();
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.kind, DecodeKind::UnexpectedEnd);
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn var_bytes_respects_max() {
        let mut w = Vec::new();
        write_var_bytes(&mut w, &[9u8; 8]);
        let mut r = SliceReader::new(&w);
        assert_eq!(
            r.read_var_bytes(4).unwrap_err().kind,
            DecodeKind::Oversized
        );
        let mut r = SliceReader::new(&w);
        assert_eq!(r.read_var_bytes(8).unwrap(), vec![9u8; 8]);
    }

    proptest! {
        #[test]
        fn varint_roundtrip(value in any::<u64>()) {
            let mut w = Vec::new();
            write_varint(&mut w, value);
            prop_assert_eq!(w.len(), varint_size(value));
            let mut r = SliceReader::new(&w);
            prop_assert_eq!(r.read_varint().unwrap(), value);
            prop_assert!(r.is_empty());
        }

        #[test]
        fn varint_decode_is_injective(bytes in proptest::collection::vec(any::<u8>(), 1..11)) {
            // Any byte string that parses as a varint must re-encode to itself.
            let mut r = SliceReader::new(&bytes);
            if let Ok(value) = r.read_varint() {
                let consumed = r.offset();
                let mut w = Vec::new();
                write_varint(&mut w, value);
                prop_assert_eq!(&w[..], &bytes[..consumed]);
            }
        }
    }
}
