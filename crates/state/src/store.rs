// Path: crates/state/src/store.rs
//! Node persistence behind the tree.
//!
//! Nodes are content-addressed: the key is the node hash, the value its
//! persistence encoding. A commit hands the store one `WriteBatch` so the
//! new root and every node reachable from it land atomically; the tree
//! never issues point writes.

use ahash::AHashMap;
use nomen_types::error::TreeError;
use nomen_types::Hash;

/// All writes produced by one tree commit.
#[derive(Debug, Default)]
pub struct WriteBatch {
    /// The root the batch commits.
    pub root: Hash,
    /// New nodes, content-addressed by hash.
    pub nodes: Vec<(Hash, Vec<u8>)>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Backing storage for tree nodes.
pub trait TreeStore {
    /// Fetch a node's encoding by hash.
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, TreeError>;

    /// Atomically persist a commit's nodes and its root.
    fn put_batch(&mut self, batch: WriteBatch) -> Result<(), TreeError>;

    /// The most recently committed root, if any.
    fn latest_root(&self) -> Result<Option<Hash>, TreeError>;
}

impl<S: TreeStore + ?Sized> TreeStore for &mut S {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, TreeError> {
        (**self).get_node(hash)
    }

    fn put_batch(&mut self, batch: WriteBatch) -> Result<(), TreeError> {
        (**self).put_batch(batch)
    }

    fn latest_root(&self) -> Result<Option<Hash>, TreeError> {
        (**self).latest_root()
    }
}

/// In-memory store. Retains every node ever written, which is exactly what
/// historical proofs across the retention window need.
#[derive(Debug, Default)]
pub struct MemoryTreeStore {
    nodes: AHashMap<Hash, Vec<u8>>,
    roots: Vec<Hash>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes, for tests and introspection.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl TreeStore for MemoryTreeStore {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, TreeError> {
        Ok(self.nodes.get(hash).cloned())
    }

    fn put_batch(&mut self, batch: WriteBatch) -> Result<(), TreeError> {
        for (hash, bytes) in batch.nodes {
            // Content-addressed: re-inserting an identical node is a no-op.
            self.nodes.entry(hash).or_insert(bytes);
        }
        self.roots.push(batch.root);
        Ok(())
    }

    fn latest_root(&self) -> Result<Option<Hash>, TreeError> {
        Ok(self.roots.last().copied())
    }
}
