// Path: crates/types/src/primitives/outpoint.rs

use crate::encoding::{Decodable, DecodeError, Encodable, SliceReader};
use crate::hash::{Hash, HASH_SIZE};

/// A reference to a transaction output: the funding txid plus output index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Outpoint {
    /// Identity of the funding transaction.
    pub hash: Hash,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl Outpoint {
    /// The null outpoint: all-zero hash, `u32::MAX` index. Only a coinbase
    /// input may carry it.
    pub const NULL: Outpoint = Outpoint {
        hash: Hash::ZERO,
        index: u32::MAX,
    };

    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    /// Whether this is the null outpoint.
    pub fn is_null(&self) -> bool {
        self.index == u32::MAX && self.hash.is_zero()
    }
}

impl Default for Outpoint {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for Outpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.hash, self.index)
    }
}

impl Encodable for Outpoint {
    fn encoded_size(&self) -> usize {
        HASH_SIZE + 4
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.extend_from_slice(self.hash.as_bytes());
        w.extend_from_slice(&self.index.to_le_bytes());
    }
}

impl Decodable for Outpoint {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let hash = r.read_hash()?;
        let index = r.read_u32()?;
        Ok(Self { hash, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::blake2b256;

    #[test]
    fn null_requires_both_fields() {
        assert!(Outpoint::NULL.is_null());
        assert!(!Outpoint::new(Hash::ZERO, 0).is_null());
        assert!(!Outpoint::new(blake2b256(b"tx"), u32::MAX).is_null());
    }

    #[test]
    fn roundtrip() {
        let op = Outpoint::new(blake2b256(b"tx"), 7);
        let bytes = op.encode();
        assert_eq!(bytes.len(), op.encoded_size());
        assert_eq!(Outpoint::decode(&bytes).unwrap(), op);
    }
}
