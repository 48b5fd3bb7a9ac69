// Path: crates/state/src/tree/mod.rs
//! The authenticated name tree.
//!
//! A base-16 radix Merkle trie keyed by the 32-byte name hash. The
//! committed trie only ever changes through [`NameTree::commit`], which
//! folds the pending overlay in and persists one atomic write batch; the
//! block connector stages into the overlay as it validates and calls
//! `commit` at interval boundaries. Reads during the interval go
//! overlay-then-committed, and a block disconnect inside the interval just
//! drops the overlay.
//!
//! Nodes are lazy-loaded from the store through an in-memory cache, so the
//! working set stays proportional to the touched paths, not the key count.

mod nibble;
mod node;
mod proof;

pub use node::MAX_VALUE_SIZE;
pub use proof::{ProofTerminal, TreeProof};

use crate::store::{TreeStore, WriteBatch};
use ahash::AHashMap;
use nibble::{divergence, nibble};
use node::{Node, FANOUT};
use nomen_types::error::TreeError;
use nomen_types::Hash;
use std::collections::{BTreeMap, VecDeque};

/// The authenticated name_hash → state map with staging and history.
#[derive(Debug)]
pub struct NameTree<S: TreeStore> {
    store: S,
    /// Root of the committed trie. Zero for the empty tree.
    root: Hash,
    /// Staged writes, merged at the next commit. `None` stages a removal.
    overlay: BTreeMap<Hash, Option<Vec<u8>>>,
    /// Decoded nodes, committed and freshly built alike.
    cache: AHashMap<Hash, Node>,
    /// Recently committed roots, oldest first. Proofs and reorg rollbacks
    /// may target any of these.
    history: VecDeque<Hash>,
    retention: usize,
}

impl<S: TreeStore> NameTree<S> {
    /// Open the tree at the store's latest committed root.
    pub fn open(store: S, retention: usize) -> Result<Self, TreeError> {
        let root = store.latest_root()?.unwrap_or(Hash::ZERO);
        let mut history = VecDeque::with_capacity(retention + 1);
        history.push_back(root);
        Ok(Self {
            store,
            root,
            overlay: BTreeMap::new(),
            cache: AHashMap::new(),
            history,
            retention: retention.max(1),
        })
    }

    /// The committed root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Whether `root` can still serve proofs and rollbacks.
    pub fn is_retained(&self, root: &Hash) -> bool {
        self.history.contains(root)
    }

    /// Number of staged, uncommitted writes.
    pub fn staged(&self) -> usize {
        self.overlay.len()
    }

    /// Snapshot of the staged overlay, key-ordered. The connector stashes
    /// this in the undo record so a disconnect can restore mid-interval
    /// staging exactly.
    pub fn staging(&self) -> Vec<(Hash, Option<Vec<u8>>)> {
        self.overlay
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Replace the staged overlay wholesale with a snapshot taken by
    /// [`NameTree::staging`].
    pub fn restore_staging(&mut self, snapshot: Vec<(Hash, Option<Vec<u8>>)>) {
        self.overlay = snapshot.into_iter().collect();
    }

    /// Read from the committed snapshot only.
    pub fn get(&mut self, key: &Hash) -> Result<Option<Vec<u8>>, TreeError> {
        self.get_at(self.root, key)
    }

    /// Read through the overlay first, then the committed snapshot. This is
    /// the view the validator sees mid-interval.
    pub fn get_pending(&mut self, key: &Hash) -> Result<Option<Vec<u8>>, TreeError> {
        if let Some(staged) = self.overlay.get(key) {
            return Ok(staged.clone());
        }
        self.get(key)
    }

    /// Stage an insert for the next commit.
    pub fn stage_insert(&mut self, key: Hash, value: Vec<u8>) -> Result<(), TreeError> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(TreeError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        self.overlay.insert(key, Some(value));
        Ok(())
    }

    /// Stage a removal for the next commit.
    pub fn stage_remove(&mut self, key: Hash) {
        self.overlay.insert(key, None);
    }

    /// Drop every staged write. Used when a block fails mid-validation or
    /// is disconnected inside a commit interval.
    pub fn clear_staging(&mut self) {
        self.overlay.clear();
    }

    /// Fold the overlay into the committed trie and persist it. Returns the
    /// new root. A no-op (empty or content-neutral overlay) returns the
    /// current root without touching the store.
    pub fn commit(&mut self) -> Result<Hash, TreeError> {
        if self.overlay.is_empty() {
            return Ok(self.root);
        }
        let ops = std::mem::take(&mut self.overlay);
        let staged = ops.len();
        let mut batch = Vec::new();
        let mut root = self.root;
        for (key, op) in ops {
            root = match op {
                Some(value) => self.insert_at(root, 0, key, value, &mut batch)?,
                None => self.remove_at(root, 0, &key, &mut batch)?.0,
            };
        }
        if root == self.root {
            return Ok(root);
        }
        self.store.put_batch(WriteBatch {
            root,
            nodes: batch,
        })?;
        self.root = root;
        self.history.push_back(root);
        while self.history.len() > self.retention {
            self.history.pop_front();
        }
        tracing::debug!(root = %root, staged, "committed name tree");
        Ok(root)
    }

    /// Repoint the committed tree at a retained historical root. Used when
    /// a reorg crosses a commit boundary. Drops any staged writes.
    pub fn inject(&mut self, root: Hash) -> Result<(), TreeError> {
        if root != self.root && !self.history.contains(&root) {
            return Err(TreeError::UnknownRoot(root));
        }
        self.overlay.clear();
        self.root = root;
        tracing::debug!(root = %root, "name tree rolled back to historical root");
        Ok(())
    }

    /// Build a membership/absence proof for `key` against `at_root`, which
    /// must be the current root or a retained historical one.
    pub fn prove(&mut self, key: &Hash, at_root: &Hash) -> Result<TreeProof, TreeError> {
        if *at_root != self.root && !self.history.contains(at_root) {
            return Err(TreeError::UnknownRoot(*at_root));
        }
        let mut steps = Vec::new();
        let mut cursor = *at_root;
        let mut depth = 0usize;
        loop {
            if depth >= nibble::MAX_DEPTH {
                return Err(TreeError::Backend("trie deeper than the key space".into()));
            }
            let Some(current) = self.load(&cursor)? else {
                return Ok(TreeProof {
                    steps,
                    terminal: ProofTerminal::Empty,
                });
            };
            match current {
                Node::Leaf { key: found, value } => {
                    let terminal = if found == *key {
                        ProofTerminal::Found { value }
                    } else {
                        ProofTerminal::Collision {
                            key: found,
                            value_hash: nomen_types::hash::blake2b256(&value),
                        }
                    };
                    return Ok(TreeProof { steps, terminal });
                }
                Node::Internal { children } => {
                    cursor = children[nibble(key, depth)];
                    steps.push(children);
                    depth += 1;
                }
            }
        }
    }

    /// Load a node by hash, consulting the cache before the store. The zero
    /// hash is the empty subtree.
    fn load(&mut self, hash: &Hash) -> Result<Option<Node>, TreeError> {
        if hash.is_zero() {
            return Ok(None);
        }
        if let Some(found) = self.cache.get(hash) {
            return Ok(Some(found.clone()));
        }
        let Some(bytes) = self.store.get_node(hash)? else {
            return Err(TreeError::MissingNode(*hash));
        };
        let decoded = Node::decode(&bytes)?;
        self.cache.insert(*hash, decoded.clone());
        Ok(Some(decoded))
    }

    /// Hash a fresh node, queue it for persistence and cache it.
    fn save(&mut self, fresh: Node, batch: &mut Vec<(Hash, Vec<u8>)>) -> Hash {
        let hash = fresh.hash();
        batch.push((hash, fresh.encode()));
        self.cache.insert(hash, fresh);
        hash
    }

    fn get_at(&mut self, root: Hash, key: &Hash) -> Result<Option<Vec<u8>>, TreeError> {
        let mut cursor = root;
        let mut depth = 0usize;
        loop {
            if depth >= nibble::MAX_DEPTH {
                return Err(TreeError::Backend("trie deeper than the key space".into()));
            }
            let Some(current) = self.load(&cursor)? else {
                return Ok(None);
            };
            match current {
                Node::Leaf { key: found, value } => {
                    return Ok((found == *key).then_some(value));
                }
                Node::Internal { children } => {
                    cursor = children[nibble(key, depth)];
                    depth += 1;
                }
            }
        }
    }

    /// Insert `key → value` under the subtree at `node_hash`, returning the
    /// replacement subtree's hash. Existing nodes are never mutated; every
    /// changed node along the path is rebuilt.
    fn insert_at(
        &mut self,
        node_hash: Hash,
        depth: usize,
        key: Hash,
        value: Vec<u8>,
        batch: &mut Vec<(Hash, Vec<u8>)>,
    ) -> Result<Hash, TreeError> {
        let Some(current) = self.load(&node_hash)? else {
            return Ok(self.save(Node::leaf(key, value), batch));
        };
        match current {
            Node::Leaf { key: found, .. } if found == key => {
                Ok(self.save(Node::leaf(key, value), batch))
            }
            Node::Leaf { key: found, .. } => {
                // Split: the two leaves share nibbles down to their
                // divergence depth; build the internal there and chain
                // single-child internals back up to this depth.
                let split = divergence(&found, &key);
                debug_assert!(split >= depth);
                let fresh = self.save(Node::leaf(key, value), batch);
                let mut children = [Hash::ZERO; FANOUT];
                children[nibble(&key, split)] = fresh;
                children[nibble(&found, split)] = node_hash;
                let mut cursor = self.save(Node::Internal { children }, batch);
                for d in (depth..split).rev() {
                    let mut chain = [Hash::ZERO; FANOUT];
                    chain[nibble(&key, d)] = cursor;
                    cursor = self.save(Node::Internal { children: chain }, batch);
                }
                Ok(cursor)
            }
            Node::Internal { mut children } => {
                let slot = nibble(&key, depth);
                children[slot] = self.insert_at(children[slot], depth + 1, key, value, batch)?;
                Ok(self.save(Node::Internal { children }, batch))
            }
        }
    }

    /// Remove `key` from the subtree at `node_hash`. Returns the
    /// replacement hash and whether anything changed. Internal nodes left
    /// holding a single leaf collapse upward so the trie stays in its
    /// canonical minimal shape.
    fn remove_at(
        &mut self,
        node_hash: Hash,
        depth: usize,
        key: &Hash,
        batch: &mut Vec<(Hash, Vec<u8>)>,
    ) -> Result<(Hash, bool), TreeError> {
        let Some(current) = self.load(&node_hash)? else {
            return Ok((Hash::ZERO, false));
        };
        match current {
            Node::Leaf { key: found, .. } => {
                if found == *key {
                    Ok((Hash::ZERO, true))
                } else {
                    Ok((node_hash, false))
                }
            }
            Node::Internal { mut children } => {
                let slot = nibble(key, depth);
                let (replacement, changed) =
                    self.remove_at(children[slot], depth + 1, key, batch)?;
                if !changed {
                    return Ok((node_hash, false));
                }
                children[slot] = replacement;
                let live: Vec<Hash> = children.iter().copied().filter(|c| !c.is_zero()).collect();
                match live.as_slice() {
                    [] => Ok((Hash::ZERO, true)),
                    [only] => {
                        // A lone leaf rises; a lone internal stays put, its
                        // depth still encodes divergence below.
                        let lone = *only;
                        if self.load(&lone)?.is_some_and(|n| n.is_leaf()) {
                            Ok((lone, true))
                        } else {
                            Ok((self.save(Node::Internal { children }, batch), true))
                        }
                    }
                    _ => Ok((self.save(Node::Internal { children }, batch), true)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
