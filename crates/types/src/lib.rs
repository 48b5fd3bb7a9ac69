// Path: crates/types/src/lib.rs
//! Core data structures and error types for the nomen chain.
//!
//! Everything consensus-critical bottoms out here: the wire codec, the
//! ledger primitives, the name grammar, the per-name auction state, the
//! network parameters, and the error taxonomy. This crate has no knowledge
//! of storage, networking or validation order; those live upstream.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod encoding;
pub mod error;
pub mod hash;
pub mod name;
pub mod namestate;
pub mod params;
pub mod primitives;

pub use encoding::{Decodable, DecodeError, Encodable};
pub use error::{ChainError, ErrorCode};
pub use hash::Hash;
