// Path: crates/state/src/tree/node.rs

use nomen_types::encoding::{
    var_bytes_size, write_var_bytes, DecodeError, DecodeKind, SliceReader,
};
use nomen_types::error::TreeError;
use nomen_types::hash::{blake2b256, Hash, HASH_SIZE};

/// Largest value a leaf may carry. Sized well above an encoded name state.
pub const MAX_VALUE_SIZE: usize = 4_096;

/// Width of an internal node.
pub(crate) const FANOUT: usize = 16;

const LEAF_TAG: u8 = 0x00;
const INTERNAL_TAG: u8 = 0x01;

/// A trie node. Children are referenced by hash; the all-zero hash stands
/// for an empty child, an empty subtree and the empty tree's root alike.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum Node {
    /// A key's value, stored at the shallowest depth that distinguishes the
    /// key from every other key in the tree.
    Leaf { key: Hash, value: Vec<u8> },
    /// Sixteen children indexed by the key nibble at this node's depth.
    Internal { children: [Hash; FANOUT] },
}

impl Node {
    pub(crate) fn leaf(key: Hash, value: Vec<u8>) -> Self {
        Self::Leaf { key, value }
    }

    pub(crate) fn empty_internal() -> Self {
        Self::Internal {
            children: [Hash::ZERO; FANOUT],
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Canonical hash. Leaf and internal preimages carry distinct domain
    /// tags so one can never be presented as the other in a proof.
    pub(crate) fn hash(&self) -> Hash {
        match self {
            Self::Leaf { key, value } => leaf_hash(key, &blake2b256(value)),
            Self::Internal { children } => internal_hash(children),
        }
    }

    /// Persistence encoding, distinct from the hash preimage: leaves store
    /// their full value so reads and proofs can return it.
    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            Self::Leaf { key, value } => {
                let mut w = Vec::with_capacity(1 + HASH_SIZE + var_bytes_size(value));
                w.push(LEAF_TAG);
                w.extend_from_slice(key.as_bytes());
                write_var_bytes(&mut w, value);
                w
            }
            Self::Internal { children } => {
                let mut w = Vec::with_capacity(1 + FANOUT * HASH_SIZE);
                w.push(INTERNAL_TAG);
                for child in children {
                    w.extend_from_slice(child.as_bytes());
                }
                w
            }
        }
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, TreeError> {
        let mut r = SliceReader::new(bytes);
        let tag = r.read_u8()?;
        let node = match tag {
            LEAF_TAG => {
                let key = r.read_hash()?;
                let value = r.read_var_bytes(MAX_VALUE_SIZE)?;
                Self::Leaf { key, value }
            }
            INTERNAL_TAG => {
                let mut children = [Hash::ZERO; FANOUT];
                for child in &mut children {
                    *child = r.read_hash()?;
                }
                Self::Internal { children }
            }
            _ => {
                return Err(TreeError::Decode(DecodeError {
                    kind: DecodeKind::BadTag,
                    offset: 0,
                }))
            }
        };
        r.expect_end()?;
        Ok(node)
    }
}

/// Hash of a leaf given the digest of its value. Proof verification uses
/// this directly so a proof need not carry the full value of foreign leaves.
pub fn leaf_hash(key: &Hash, value_hash: &Hash) -> Hash {
    let mut preimage = Vec::with_capacity(1 + HASH_SIZE * 2);
    preimage.push(LEAF_TAG);
    preimage.extend_from_slice(key.as_bytes());
    preimage.extend_from_slice(value_hash.as_bytes());
    blake2b256(&preimage)
}

/// Hash of an internal node from its child hashes.
pub fn internal_hash(children: &[Hash; FANOUT]) -> Hash {
    let mut preimage = Vec::with_capacity(1 + FANOUT * HASH_SIZE);
    preimage.push(INTERNAL_TAG);
    for child in children {
        preimage.extend_from_slice(child.as_bytes());
    }
    blake2b256(&preimage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_types::hash::sha3_256;

    #[test]
    fn leaf_and_internal_hashes_are_domain_separated() {
        // A leaf whose encoded fields mimic an internal node must not
        // collide with it; the tag byte guarantees that.
        let leaf = Node::leaf(sha3_256(b"k"), vec![1, 2, 3]);
        let internal = Node::empty_internal();
        assert_ne!(leaf.hash(), internal.hash());
    }

    #[test]
    fn hash_tracks_value() {
        let key = sha3_256(b"k");
        let a = Node::leaf(key, vec![1]);
        let b = Node::leaf(key, vec![2]);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), leaf_hash(&key, &blake2b256(&[1])));
    }

    #[test]
    fn roundtrip() {
        let leaf = Node::leaf(sha3_256(b"k"), b"value".to_vec());
        assert_eq!(Node::decode(&leaf.encode()).unwrap(), leaf);

        let mut children = [Hash::ZERO; FANOUT];
        children[3] = sha3_256(b"c");
        let internal = Node::Internal { children };
        assert_eq!(Node::decode(&internal.encode()).unwrap(), internal);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        assert!(matches!(
            Node::decode(&[0x02, 0, 0]),
            Err(TreeError::Decode(_))
        ));
    }
}
