// Path: crates/state/src/lib.rs
//! Authenticated name-state tree for the nomen chain.
//!
//! The chain commits the name → state mapping into a radix-16 Merkle trie
//! every `tree_interval` blocks; this crate owns that trie, its staging
//! overlay, per-key proofs, and the historical-root window that keeps
//! proofs serviceable across reorgs.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod store;
pub mod tree;

pub use store::{MemoryTreeStore, TreeStore, WriteBatch};
pub use tree::{NameTree, ProofTerminal, TreeProof, MAX_VALUE_SIZE};
