// Path: crates/chain/src/undo.rs
//! Per-block undo records.
//!
//! Connecting a block produces exactly the data needed to reverse it:
//! the coins it removed, the coins it added, every name state it touched
//! (with the prior value), the chain-state tuple, and the tree position.
//! Disconnect replays the record; the result is byte-identical pre-block
//! state, tree root included.

use crate::chain::ChainStateTuple;
use nomen_types::encoding::{
    varint_size, write_varint, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};
use nomen_types::namestate::NameState;
use nomen_types::primitives::{Coin, Outpoint};
use nomen_types::Hash;

/// Everything required to disconnect one block.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UndoBlock {
    /// Hash of the block this record reverses.
    pub block_hash: Hash,
    /// Hash of its parent; the tip after disconnecting.
    pub prev_block: Hash,
    /// Coins the block spent, with their prior state, in spend order.
    pub spent: Vec<(Outpoint, Coin)>,
    /// Coins the block created (net of intra-block chains).
    pub created: Vec<(Outpoint, Coin)>,
    /// Name states the block touched: prior value, `None` if the name had
    /// no state before. Sorted by hash for a canonical encoding.
    pub names: Vec<(Hash, Option<NameState>)>,
    /// The tree's staged overlay as of just before this block.
    pub staged: Vec<(Hash, Option<Vec<u8>>)>,
    /// Committed tree root before this block connected.
    pub tree_root: Hash,
    /// Whether connecting this block committed the tree.
    pub tree_committed: bool,
    /// Chain-state tuple before this block connected.
    pub chain_state: ChainStateTuple,
}

fn write_opt_bytes(w: &mut Vec<u8>, value: &Option<Vec<u8>>) {
    match value {
        None => w.push(0),
        Some(bytes) => {
            w.push(1);
            write_varint(w, bytes.len() as u64);
            w.extend_from_slice(bytes);
        }
    }
}

fn opt_bytes_size(value: &Option<Vec<u8>>) -> usize {
    match value {
        None => 1,
        Some(bytes) => 1 + varint_size(bytes.len() as u64) + bytes.len(),
    }
}

fn read_opt_bytes(r: &mut SliceReader<'_>, max: usize) -> Result<Option<Vec<u8>>, DecodeError> {
    let tag_offset = r.offset();
    match r.read_u8()? {
        0 => Ok(None),
        1 => Ok(Some(r.read_var_bytes(max)?)),
        _ => Err(DecodeError {
            kind: DecodeKind::BadTag,
            offset: tag_offset,
        }),
    }
}

impl Encodable for UndoBlock {
    fn encoded_size(&self) -> usize {
        let mut size = 32 + 32;
        size += varint_size(self.spent.len() as u64);
        for (outpoint, coin) in &self.spent {
            size += outpoint.encoded_size() + coin.encoded_size();
        }
        size += varint_size(self.created.len() as u64);
        for (outpoint, coin) in &self.created {
            size += outpoint.encoded_size() + coin.encoded_size();
        }
        size += varint_size(self.names.len() as u64);
        for (_, prior) in &self.names {
            size += 32 + opt_bytes_size(&prior.as_ref().map(|ns| ns.encode()));
        }
        size += varint_size(self.staged.len() as u64);
        for (_, value) in &self.staged {
            size += 32 + opt_bytes_size(value);
        }
        size += 32 + 1 + self.chain_state.encoded_size();
        size
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.extend_from_slice(self.block_hash.as_bytes());
        w.extend_from_slice(self.prev_block.as_bytes());
        write_varint(w, self.spent.len() as u64);
        for (outpoint, coin) in &self.spent {
            outpoint.write(w);
            coin.write(w);
        }
        write_varint(w, self.created.len() as u64);
        for (outpoint, coin) in &self.created {
            outpoint.write(w);
            coin.write(w);
        }
        write_varint(w, self.names.len() as u64);
        for (hash, prior) in &self.names {
            w.extend_from_slice(hash.as_bytes());
            write_opt_bytes(w, &prior.as_ref().map(|ns| ns.encode()));
        }
        write_varint(w, self.staged.len() as u64);
        for (hash, value) in &self.staged {
            w.extend_from_slice(hash.as_bytes());
            write_opt_bytes(w, value);
        }
        w.extend_from_slice(self.tree_root.as_bytes());
        w.push(self.tree_committed as u8);
        self.chain_state.write(w);
    }
}

impl Decodable for UndoBlock {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        const MAX_ENTRIES: u64 = 1 << 24;

        let block_hash = r.read_hash()?;
        let prev_block = r.read_hash()?;

        let mut read_count = |r: &mut SliceReader<'_>| -> Result<u64, DecodeError> {
            let offset = r.offset();
            let count = r.read_varint()?;
            if count > MAX_ENTRIES {
                return Err(DecodeError {
                    kind: DecodeKind::Oversized,
                    offset,
                });
            }
            Ok(count)
        };

        let n_spent = read_count(r)?;
        let mut spent = Vec::with_capacity(n_spent.min(1024) as usize);
        for _ in 0..n_spent {
            spent.push((Outpoint::read(r)?, Coin::read(r)?));
        }

        let n_created = read_count(r)?;
        let mut created = Vec::with_capacity(n_created.min(1024) as usize);
        for _ in 0..n_created {
            created.push((Outpoint::read(r)?, Coin::read(r)?));
        }

        let n_names = read_count(r)?;
        let mut names = Vec::with_capacity(n_names.min(1024) as usize);
        for _ in 0..n_names {
            let hash = r.read_hash()?;
            let prior = match read_opt_bytes(r, nomen_state::MAX_VALUE_SIZE)? {
                None => None,
                Some(bytes) => {
                    let offset = r.offset();
                    Some(NameState::decode(&bytes).map_err(|e| DecodeError {
                        kind: e.kind,
                        offset,
                    })?)
                }
            };
            names.push((hash, prior));
        }

        let n_staged = read_count(r)?;
        let mut staged = Vec::with_capacity(n_staged.min(1024) as usize);
        for _ in 0..n_staged {
            let hash = r.read_hash()?;
            staged.push((hash, read_opt_bytes(r, nomen_state::MAX_VALUE_SIZE)?));
        }

        let tree_root = r.read_hash()?;
        let flag_offset = r.offset();
        let tree_committed = match r.read_u8()? {
            0 => false,
            1 => true,
            _ => {
                return Err(DecodeError {
                    kind: DecodeKind::BadTag,
                    offset: flag_offset,
                })
            }
        };
        let chain_state = ChainStateTuple::read(r)?;

        Ok(Self {
            block_hash,
            prev_block,
            spent,
            created,
            names,
            staged,
            tree_root,
            tree_committed,
            chain_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_types::hash::{blake2b256, sha3_256};
    use nomen_types::primitives::{Address, Output};

    #[test]
    fn roundtrip() {
        let coin = Coin::new(Output::plain(9, Address::new(0, vec![7u8; 20])), 4, false);
        let undo = UndoBlock {
            block_hash: blake2b256(b"block"),
            prev_block: blake2b256(b"parent"),
            spent: vec![(Outpoint::new(blake2b256(b"a"), 1), coin.clone())],
            created: vec![(Outpoint::new(blake2b256(b"b"), 0), coin)],
            names: vec![
                (sha3_256(b"gone"), None),
                (
                    sha3_256(b"alpha"),
                    Some(NameState::open(b"alpha".to_vec(), sha3_256(b"alpha"), 3)),
                ),
            ],
            staged: vec![(sha3_256(b"alpha"), Some(vec![1, 2, 3])), (sha3_256(b"x"), None)],
            tree_root: blake2b256(b"root"),
            tree_committed: true,
            chain_state: ChainStateTuple {
                total_tx: 10,
                total_coin: 4,
                total_value: 99,
                total_burned: 5,
            },
        };
        let bytes = undo.encode();
        assert_eq!(bytes.len(), undo.encoded_size());
        assert_eq!(UndoBlock::decode(&bytes).unwrap(), undo);
    }
}
