// Path: crates/types/src/primitives/mod.rs
//! Ledger primitives: outpoints, addresses, covenants, transactions, blocks.

mod address;
mod block;
mod covenant;
mod merkle;
mod outpoint;
mod transaction;

pub use address::{Address, MAX_ADDRESS_HASH_SIZE, MAX_ADDRESS_VERSION, MIN_ADDRESS_HASH_SIZE};
pub use block::{Block, BlockHeader, BLOCK_HEADER_SIZE};
pub use covenant::{
    Covenant, CovenantShapeError, CovenantType, ItemRule, MAX_COVENANT_ITEMS,
    MAX_COVENANT_ITEM_SIZE,
};
pub use merkle::merkle_root;
pub use outpoint::Outpoint;
pub use transaction::{Coin, Input, Output, Transaction, MAX_WITNESS_ITEMS, MAX_WITNESS_ITEM_SIZE};
