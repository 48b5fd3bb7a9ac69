// Path: crates/types/src/hash.rs
//! Hash primitives used throughout the chain.
//!
//! Two fixed functions cover every consensus surface: BLAKE2b-256 for
//! transaction, block and tree-node identity, and SHA3-256 for name hashes
//! and sealed-bid blinds. Centralizing the wrappers here keeps every
//! component hashing the exact same preimages.

use sha3::{Digest, Sha3_256};

/// Size in bytes of every consensus hash.
pub const HASH_SIZE: usize = 32;

/// A 32-byte opaque hash value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl Hash {
    /// The all-zero hash. Stands for "empty" wherever a hash slot is optional
    /// (null outpoints, empty tree children, the root of an empty tree).
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    /// Whether this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Build a hash from a slice. Returns `None` unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().ok()?;
        Some(Hash(arr))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// BLAKE2b with a 256-bit digest.
pub fn blake2b256(data: &[u8]) -> Hash {
    let digest = blake2b_simd::Params::new()
        .hash_length(HASH_SIZE)
        .hash(data);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(digest.as_bytes());
    Hash(out)
}

/// BLAKE2b-256 over the concatenation of two hashes. Used by the merkle
/// fold and for witness txids.
pub fn blake2b256_pair(left: &Hash, right: &Hash) -> Hash {
    let mut buf = [0u8; HASH_SIZE * 2];
    buf[..HASH_SIZE].copy_from_slice(&left.0);
    buf[HASH_SIZE..].copy_from_slice(&right.0);
    blake2b256(&buf)
}

/// SHA3-256 (the Keccak variant standardized by FIPS 202).
pub fn sha3_256(data: &[u8]) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest);
    Hash(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(!blake2b256(b"x").is_zero());
    }

    #[test]
    fn digests_are_stable() {
        // Pinned vectors; a change here is a consensus break.
        assert_eq!(
            blake2b256(b"").to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
        assert_eq!(
            sha3_256(b"").to_string(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn pair_matches_concatenation() {
        let a = blake2b256(b"a");
        let b = blake2b256(b"b");
        let mut buf = Vec::new();
        buf.extend_from_slice(a.as_bytes());
        buf.extend_from_slice(b.as_bytes());
        assert_eq!(blake2b256_pair(&a, &b), blake2b256(&buf));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[0u8; 31]).is_none());
        assert!(Hash::from_slice(&[0u8; 33]).is_none());
        assert!(Hash::from_slice(&[7u8; 32]).is_some());
    }
}
