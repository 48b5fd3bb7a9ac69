// Path: crates/types/src/primitives/address.rs

use crate::encoding::{
    var_bytes_size, write_var_bytes, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};

/// Highest witness program version. Version 31 marks unspendable nulldata.
pub const MAX_ADDRESS_VERSION: u8 = 31;
/// Smallest witness program for a spendable address.
pub const MIN_ADDRESS_HASH_SIZE: usize = 2;
/// Largest witness program.
pub const MAX_ADDRESS_HASH_SIZE: usize = 40;

/// A versioned witness program. Version 0 with a 20-byte hash is
/// pay-to-pubkey-hash, version 0 with a 32-byte hash pay-to-script-hash;
/// version 31 outputs are provably unspendable data carriers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct Address {
    /// Witness program version, `0..=31`.
    pub version: u8,
    /// The program payload, usually a key or script hash.
    pub hash: Vec<u8>,
}

impl Address {
    pub fn new(version: u8, hash: Vec<u8>) -> Self {
        Self { version, hash }
    }

    /// An empty version-31 output, the canonical nulldata form.
    pub fn nulldata() -> Self {
        Self {
            version: MAX_ADDRESS_VERSION,
            hash: Vec::new(),
        }
    }

    /// Whether outputs paying this address can never be spent.
    pub fn is_unspendable(&self) -> bool {
        self.version == MAX_ADDRESS_VERSION
    }

    /// Version 0, 20-byte program: a single key, a single signature.
    pub fn is_pubkeyhash(&self) -> bool {
        self.version == 0 && self.hash.len() == 20
    }

    /// Version 0, 32-byte program: a script commitment.
    pub fn is_scripthash(&self) -> bool {
        self.version == 0 && self.hash.len() == 32
    }

    /// Structural validity: version range and program size. Nulldata
    /// programs may be shorter than the spendable minimum.
    pub fn is_valid(&self) -> bool {
        if self.version > MAX_ADDRESS_VERSION {
            return false;
        }
        if self.hash.len() > MAX_ADDRESS_HASH_SIZE {
            return false;
        }
        if self.is_unspendable() {
            return true;
        }
        self.hash.len() >= MIN_ADDRESS_HASH_SIZE
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}:{}", self.version, hex::encode(&self.hash))
    }
}

impl Encodable for Address {
    fn encoded_size(&self) -> usize {
        1 + var_bytes_size(&self.hash)
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.push(self.version);
        write_var_bytes(w, &self.hash);
    }
}

impl Decodable for Address {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let start = r.offset();
        let version = r.read_u8()?;
        if version > MAX_ADDRESS_VERSION {
            return Err(DecodeError {
                kind: DecodeKind::ValueOutOfRange,
                offset: start,
            });
        }
        let hash = r.read_var_bytes(MAX_ADDRESS_HASH_SIZE)?;
        let address = Self { version, hash };
        if !address.is_valid() {
            return Err(DecodeError {
                kind: DecodeKind::ValueOutOfRange,
                offset: start,
            });
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_rules() {
        assert!(Address::new(0, vec![0u8; 20]).is_valid());
        assert!(Address::new(0, vec![0u8; 32]).is_valid());
        assert!(Address::nulldata().is_valid());
        // Spendable programs need at least two bytes.
        assert!(!Address::new(0, vec![0u8; 1]).is_valid());
        // Nulldata may be short but not oversized.
        assert!(Address::new(31, vec![0u8; 1]).is_valid());
        assert!(!Address::new(31, vec![0u8; 41]).is_valid());
        assert!(!Address::new(32, vec![0u8; 20]).is_valid());
    }

    #[test]
    fn decode_rejects_bad_version() {
        let mut bytes = Address::new(0, vec![7u8; 20]).encode();
        bytes[0] = 32;
        let err = Address::decode(&bytes).unwrap_err();
        assert_eq!(err.kind, DecodeKind::ValueOutOfRange);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn roundtrip() {
        for address in [
            Address::new(0, vec![9u8; 20]),
            Address::new(0, vec![9u8; 32]),
            Address::new(5, vec![1, 2]),
            Address::nulldata(),
        ] {
            let bytes = address.encode();
            assert_eq!(bytes.len(), address.encoded_size());
            assert_eq!(Address::decode(&bytes).unwrap(), address);
        }
    }
}
