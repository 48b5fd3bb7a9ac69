// Path: crates/types/src/name.rs
//! Name grammar, canonicalization and hashing.
//!
//! A top-level name is a single label of 1–63 bytes. The allowed alphabet
//! is `[0-9a-z]` anywhere, with `-`, `_` and a single `.` permitted only in
//! the interior. ASCII uppercase folds to lowercase before validation and
//! hashing, so `Alpha` and `alpha` are the same name on-chain.

use crate::hash::{sha3_256, Hash};
use crate::params::NetworkParams;
use thiserror::Error;

/// Longest acceptable label.
pub const MAX_NAME_SIZE: usize = 63;

/// Number of rollout buckets a name hash can land in. Names become
/// openable one bucket per `rollout_interval` blocks after genesis.
pub const ROLLOUT_BUCKETS: u32 = 52;

/// Why a label was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name exceeds {MAX_NAME_SIZE} bytes")]
    TooLong,
    #[error("invalid character at position {position}")]
    BadCharacter { position: usize },
    #[error("separator at name edge")]
    EdgeSeparator,
    #[error("adjacent dots")]
    AdjacentDots,
    #[error("more than one dot")]
    MultipleDots,
}

/// Fold ASCII uppercase and validate, returning the canonical label bytes.
pub fn canonicalize(name: &[u8]) -> Result<Vec<u8>, NameError> {
    let lowered: Vec<u8> = name.iter().map(|b| b.to_ascii_lowercase()).collect();
    validate(&lowered)?;
    Ok(lowered)
}

/// Check an already-lowercased label against the grammar.
pub fn validate(label: &[u8]) -> Result<(), NameError> {
    if label.is_empty() {
        return Err(NameError::Empty);
    }
    if label.len() > MAX_NAME_SIZE {
        return Err(NameError::TooLong);
    }
    let last = label.len() - 1;
    let mut dots = 0usize;
    let mut prev_dot = false;
    for (position, &byte) in label.iter().enumerate() {
        match byte {
            b'0'..=b'9' | b'a'..=b'z' => {
                prev_dot = false;
            }
            b'-' | b'_' => {
                if position == 0 || position == last {
                    return Err(NameError::EdgeSeparator);
                }
                prev_dot = false;
            }
            b'.' => {
                if position == 0 || position == last {
                    return Err(NameError::EdgeSeparator);
                }
                if prev_dot {
                    return Err(NameError::AdjacentDots);
                }
                dots += 1;
                if dots > 1 {
                    return Err(NameError::MultipleDots);
                }
                prev_dot = true;
            }
            _ => return Err(NameError::BadCharacter { position }),
        }
    }
    Ok(())
}

/// The 32-byte key a name occupies in the tree and rule table:
/// SHA3-256 of the canonical label.
pub fn name_hash(name: &[u8]) -> Result<Hash, NameError> {
    let canonical = canonicalize(name)?;
    Ok(sha3_256(&canonical))
}

/// Height at which a name becomes openable. Availability is staggered
/// across [`ROLLOUT_BUCKETS`] buckets keyed by the hash's first byte; a
/// zero `rollout_interval` disables the gate.
pub fn rollout_height(name_hash: &Hash, params: &NetworkParams) -> u32 {
    let bucket = (name_hash.as_bytes()[0] as u32) % ROLLOUT_BUCKETS;
    bucket * params.rollout_interval
}
