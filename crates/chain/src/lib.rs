// Path: crates/chain/src/lib.rs
//! Consensus core of the nomen chain: the coin view, the covenant state
//! machine, contextual validation and the block connector.
//!
//! The crate exposes a single writer, [`Chain`], which owns every
//! consensus store. Hosts feed it decoded blocks; it feeds back typed
//! events and name-tree proofs. Script interpretation, claim proofs and
//! airdrop proofs are consumed through the traits in [`verify`].

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod chain;
pub mod coinview;
pub mod events;
pub mod undo;
pub mod verify;

mod contextual;
mod rules;
mod session;

pub use chain::{Chain, ChainStateTuple, RecentBlocks};
pub use coinview::{CoinStore, CoinView, MemoryCoinStore};
pub use events::{ChainEvent, EventDispatcher};
pub use rules::BlockCounters;
pub use undo::UndoBlock;
pub use verify::{AirdropData, AirdropVerifier, ClaimData, ReservedRegistry, ScriptVerifier};
