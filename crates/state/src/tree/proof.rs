// Path: crates/state/src/tree/proof.rs
//! Per-key proofs against a tree root.
//!
//! A proof is the internal-node path from the root toward the key plus a
//! terminal: the key's own leaf, an empty slot, or the foreign leaf that
//! occupies the key's path. Verification recomputes hashes bottom-up and
//! is independent of the trie implementation; consumers need only the
//! published root. Internal steps are compressed with a presence bitmap so
//! empty children cost two bytes per level, not thirty-two each.

use super::nibble::{nibble, MAX_DEPTH};
use super::node::{internal_hash, leaf_hash, FANOUT, MAX_VALUE_SIZE};
use nomen_types::encoding::{
    varint_size, write_varint, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};
use nomen_types::error::TreeError;
use nomen_types::hash::{blake2b256, Hash, HASH_SIZE};

/// What the proven path terminates in.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ProofTerminal {
    /// The key's slot is empty: absence.
    Empty,
    /// The key's own leaf, carrying its value: membership.
    Found { value: Vec<u8> },
    /// A different key's leaf occupies the path position: absence.
    Collision { key: Hash, value_hash: Hash },
}

/// A membership or absence proof for one key against one root.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TreeProof {
    /// Child-hash arrays of the internal nodes on the path, root first.
    pub(crate) steps: Vec<[Hash; FANOUT]>,
    /// What hangs below the deepest step.
    pub(crate) terminal: ProofTerminal,
}

impl TreeProof {
    /// Verify against `root` for `key`. Returns the proven value for a
    /// membership proof, `None` for a proven absence.
    pub fn verify(&self, root: &Hash, key: &Hash) -> Result<Option<Vec<u8>>, TreeError> {
        if self.steps.len() > MAX_DEPTH {
            return Err(TreeError::BadProof("path deeper than the key space"));
        }

        let (mut expect, result) = match &self.terminal {
            ProofTerminal::Empty => (Hash::ZERO, None),
            ProofTerminal::Found { value } => {
                if value.len() > MAX_VALUE_SIZE {
                    return Err(TreeError::BadProof("oversized value"));
                }
                (leaf_hash(key, &blake2b256(value)), Some(value.clone()))
            }
            ProofTerminal::Collision {
                key: other,
                value_hash,
            } => {
                if other == key {
                    return Err(TreeError::BadProof("collision leaf carries the key"));
                }
                (leaf_hash(other, value_hash), None)
            }
        };

        // Climb from the deepest internal back to the root.
        for (depth, children) in self.steps.iter().enumerate().rev() {
            if children[nibble(key, depth)] != expect {
                return Err(TreeError::ProofDidNotAnchor);
            }
            expect = internal_hash(children);
        }

        if expect != *root {
            return Err(TreeError::ProofDidNotAnchor);
        }
        Ok(result)
    }
}

const TERMINAL_EMPTY: u8 = 0;
const TERMINAL_FOUND: u8 = 1;
const TERMINAL_COLLISION: u8 = 2;

impl Encodable for TreeProof {
    fn encoded_size(&self) -> usize {
        let mut size = varint_size(self.steps.len() as u64);
        for children in &self.steps {
            size += 2;
            size += children.iter().filter(|c| !c.is_zero()).count() * HASH_SIZE;
        }
        size += 1;
        size += match &self.terminal {
            ProofTerminal::Empty => 0,
            ProofTerminal::Found { value } => varint_size(value.len() as u64) + value.len(),
            ProofTerminal::Collision { .. } => HASH_SIZE * 2,
        };
        size
    }

    fn write(&self, w: &mut Vec<u8>) {
        write_varint(w, self.steps.len() as u64);
        for children in &self.steps {
            let mut bitmap: u16 = 0;
            for (index, child) in children.iter().enumerate() {
                if !child.is_zero() {
                    bitmap |= 1 << index;
                }
            }
            w.extend_from_slice(&bitmap.to_le_bytes());
            for child in children {
                if !child.is_zero() {
                    w.extend_from_slice(child.as_bytes());
                }
            }
        }
        match &self.terminal {
            ProofTerminal::Empty => w.push(TERMINAL_EMPTY),
            ProofTerminal::Found { value } => {
                w.push(TERMINAL_FOUND);
                write_varint(w, value.len() as u64);
                w.extend_from_slice(value);
            }
            ProofTerminal::Collision { key, value_hash } => {
                w.push(TERMINAL_COLLISION);
                w.extend_from_slice(key.as_bytes());
                w.extend_from_slice(value_hash.as_bytes());
            }
        }
    }
}

impl Decodable for TreeProof {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let count_offset = r.offset();
        let n_steps = r.read_varint()?;
        if n_steps > MAX_DEPTH as u64 {
            return Err(DecodeError {
                kind: DecodeKind::Oversized,
                offset: count_offset,
            });
        }
        let mut steps = Vec::with_capacity(n_steps as usize);
        for _ in 0..n_steps {
            let bitmap = r.read_u16()?;
            let mut children = [Hash::ZERO; FANOUT];
            for (index, child) in children.iter_mut().enumerate() {
                if bitmap & (1 << index) != 0 {
                    let hash_offset = r.offset();
                    let hash = r.read_hash()?;
                    // A zero hash under a set bit would break bijectivity.
                    if hash.is_zero() {
                        return Err(DecodeError {
                            kind: DecodeKind::ValueOutOfRange,
                            offset: hash_offset,
                        });
                    }
                    *child = hash;
                }
            }
            steps.push(children);
        }
        let tag_offset = r.offset();
        let terminal = match r.read_u8()? {
            TERMINAL_EMPTY => ProofTerminal::Empty,
            TERMINAL_FOUND => ProofTerminal::Found {
                value: r.read_var_bytes(MAX_VALUE_SIZE)?,
            },
            TERMINAL_COLLISION => ProofTerminal::Collision {
                key: r.read_hash()?,
                value_hash: r.read_hash()?,
            },
            _ => {
                return Err(DecodeError {
                    kind: DecodeKind::BadTag,
                    offset: tag_offset,
                })
            }
        };
        Ok(Self { steps, terminal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_types::hash::sha3_256;

    #[test]
    fn proof_roundtrip() {
        let mut children = [Hash::ZERO; FANOUT];
        children[2] = sha3_256(b"a");
        children[9] = sha3_256(b"b");
        let proof = TreeProof {
            steps: vec![children],
            terminal: ProofTerminal::Found {
                value: b"value".to_vec(),
            },
        };
        let bytes = proof.encode();
        assert_eq!(bytes.len(), proof.encoded_size());
        assert_eq!(TreeProof::decode(&bytes).unwrap(), proof);
    }

    #[test]
    fn collision_with_own_key_is_malformed() {
        let key = sha3_256(b"k");
        let proof = TreeProof {
            steps: Vec::new(),
            terminal: ProofTerminal::Collision {
                key,
                value_hash: Hash::ZERO,
            },
        };
        assert!(matches!(
            proof.verify(&Hash::ZERO, &key),
            Err(TreeError::BadProof(_))
        ));
    }

    #[test]
    fn empty_tree_absence() {
        let proof = TreeProof {
            steps: Vec::new(),
            terminal: ProofTerminal::Empty,
        };
        assert_eq!(proof.verify(&Hash::ZERO, &sha3_256(b"k")).unwrap(), None);
        // Wrong root fails.
        assert!(proof.verify(&sha3_256(b"root"), &sha3_256(b"k")).is_err());
    }
}
