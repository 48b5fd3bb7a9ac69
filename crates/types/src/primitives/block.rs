// Path: crates/types/src/primitives/block.rs

use crate::encoding::{
    write_varint, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};
use crate::hash::{blake2b256, Hash, HASH_SIZE};
use crate::primitives::{merkle_root, Transaction};

/// Fixed encoded size of a block header.
pub const BLOCK_HEADER_SIZE: usize = 4 + HASH_SIZE * 5 + 24 + 8 + 4 + 4 + HASH_SIZE;

/// A proof-of-work block header.
///
/// `tree_root` commits to the authenticated name tree as of the commit
/// interval covering this height; between intervals it repeats the last
/// committed root.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: Hash,
    /// Merkle root over txids.
    pub merkle_root: Hash,
    /// Merkle root over wtxids.
    pub witness_root: Hash,
    /// Root of the committed name tree.
    pub tree_root: Hash,
    /// Commitment root for the reserved-name registry.
    pub reserved_root: Hash,
    /// Miner-controlled entropy outside the PoW preimage mask.
    pub extra_nonce: [u8; 24],
    pub time: u64,
    pub bits: u32,
    pub nonce: u32,
    /// PoW masking field.
    pub mask: [u8; 32],
}

impl BlockHeader {
    /// Block identity: BLAKE2b-256 of the fixed 236-byte encoding.
    pub fn hash(&self) -> Hash {
        blake2b256(&self.encode())
    }
}

impl Encodable for BlockHeader {
    fn encoded_size(&self) -> usize {
        BLOCK_HEADER_SIZE
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.extend_from_slice(&self.version.to_le_bytes());
        w.extend_from_slice(self.prev_block.as_bytes());
        w.extend_from_slice(self.merkle_root.as_bytes());
        w.extend_from_slice(self.witness_root.as_bytes());
        w.extend_from_slice(self.tree_root.as_bytes());
        w.extend_from_slice(self.reserved_root.as_bytes());
        w.extend_from_slice(&self.extra_nonce);
        w.extend_from_slice(&self.time.to_le_bytes());
        w.extend_from_slice(&self.bits.to_le_bytes());
        w.extend_from_slice(&self.nonce.to_le_bytes());
        w.extend_from_slice(&self.mask);
    }
}

impl Decodable for BlockHeader {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            version: r.read_u32()?,
            prev_block: r.read_hash()?,
            merkle_root: r.read_hash()?,
            witness_root: r.read_hash()?,
            tree_root: r.read_hash()?,
            reserved_root: r.read_hash()?,
            extra_nonce: r.read_array::<24>()?,
            time: r.read_u64()?,
            bits: r.read_u32()?,
            nonce: r.read_u32()?,
            mask: r.read_array::<32>()?,
        })
    }
}

/// A full block: header plus ordered transactions.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The header hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Merkle root over the block's txids.
    pub fn merkle_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.transactions.iter().map(Transaction::txid).collect();
        merkle_root(&leaves)
    }

    /// Merkle root over the block's wtxids.
    pub fn witness_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.transactions.iter().map(Transaction::wtxid).collect();
        merkle_root(&leaves)
    }
}

impl Encodable for Block {
    fn encoded_size(&self) -> usize {
        let mut size = BLOCK_HEADER_SIZE;
        size += crate::encoding::varint_size(self.transactions.len() as u64);
        for tx in &self.transactions {
            size += tx.encoded_size();
        }
        size
    }

    fn write(&self, w: &mut Vec<u8>) {
        self.header.write(w);
        write_varint(w, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.write(w);
        }
    }
}

impl Decodable for Block {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let header = BlockHeader::read(r)?;
        let count_offset = r.offset();
        let n_txs = r.read_varint()?;
        if n_txs > u32::MAX as u64 {
            return Err(DecodeError {
                kind: DecodeKind::Oversized,
                offset: count_offset,
            });
        }
        let mut transactions = Vec::with_capacity(n_txs.min(1024) as usize);
        for _ in 0..n_txs {
            transactions.push(Transaction::read(r)?);
        }
        Ok(Self {
            header,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_block: blake2b256(b"prev"),
            merkle_root: blake2b256(b"merkle"),
            witness_root: blake2b256(b"witness"),
            tree_root: blake2b256(b"tree"),
            reserved_root: Hash::ZERO,
            extra_nonce: [3u8; 24],
            time: 1_700_000_000,
            bits: 0x1d00ffff,
            nonce: 42,
            mask: [0u8; 32],
        }
    }

    #[test]
    fn header_is_exactly_236_bytes() {
        assert_eq!(BLOCK_HEADER_SIZE, 236);
        assert_eq!(sample_header().encode().len(), 236);
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header();
        assert_eq!(BlockHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn block_roundtrip() {
        let block = Block {
            header: sample_header(),
            transactions: Vec::new(),
        };
        let bytes = block.encode();
        assert_eq!(bytes.len(), block.encoded_size());
        assert_eq!(Block::decode(&bytes).unwrap(), block);
    }
}
