// Path: crates/chain/src/verify.rs
//! Collaborator seams consumed by validation.
//!
//! Script interpretation, airdrop proofs and the reserved-name registry
//! live outside this core. Validation talks to them through these traits;
//! the `testing` module provides the permissive doubles the test suites
//! and local harnesses run against.
//!
//! Script checks are pure over `(tx, input, coin)` and are the one region
//! the connector may fan out across a worker pool: each check returns only
//! its own verdict and never touches shared state.

use nomen_types::error::{CovenantError, ScriptError};
use nomen_types::primitives::{Coin, Transaction};
use nomen_types::Hash;

/// Witness/script validation for one input.
pub trait ScriptVerifier: Sync {
    /// Verify the witness of `tx.inputs[input]` against the coin it spends.
    fn verify(&self, tx: &Transaction, input: usize, coin: &Coin) -> Result<(), ScriptError>;

    /// Signature operations this input contributes to the block budget.
    fn sigops(&self, tx: &Transaction, input: usize, coin: &Coin) -> usize;
}

/// What the reserved-name registry attests for a valid claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimData {
    /// Canonical label being claimed.
    pub name: Vec<u8>,
    /// Value the claim mints.
    pub value: u64,
    /// The ownership proof was not DNSSEC-anchored.
    pub weak: bool,
}

/// The reserved-name registry.
pub trait ReservedRegistry {
    /// Verify an ownership proof for `name_hash`. `commit_height` is the
    /// height the proof commits to; binding proofs to a height prevents
    /// replaying them across reorgs.
    fn verify_claim(
        &self,
        name_hash: &Hash,
        proof: &[u8],
        commit_height: u32,
    ) -> Result<ClaimData, CovenantError>;
}

/// What an airdrop proof redeems to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AirdropData {
    /// Value the proof mints.
    pub value: u64,
    /// Required witness program of the redeeming output.
    pub address_version: u8,
    pub address_hash: Vec<u8>,
    /// Portion of `value` released to the miner as fee.
    pub fee: u64,
}

/// The airdrop proof verifier.
pub trait AirdropVerifier {
    fn verify_airdrop(&self, proof: &[u8]) -> Result<AirdropData, CovenantError>;
}

/// Test doubles for the collaborator seams.
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Accepts every witness and charges one sigop per input.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct AcceptAllScripts;

    impl ScriptVerifier for AcceptAllScripts {
        fn verify(&self, _tx: &Transaction, _input: usize, _coin: &Coin) -> Result<(), ScriptError> {
            Ok(())
        }

        fn sigops(&self, _tx: &Transaction, _input: usize, _coin: &Coin) -> usize {
            1
        }
    }

    /// Rejects every witness; for exercising the failure path.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RejectAllScripts;

    impl ScriptVerifier for RejectAllScripts {
        fn verify(&self, _tx: &Transaction, input: usize, _coin: &Coin) -> Result<(), ScriptError> {
            Err(ScriptError {
                input,
                reason: "rejected by test double".into(),
            })
        }

        fn sigops(&self, _tx: &Transaction, _input: usize, _coin: &Coin) -> usize {
            0
        }
    }

    /// A registry seeded with explicit claims, keyed by name hash.
    #[derive(Debug, Default, Clone)]
    pub struct FixedRegistry {
        claims: HashMap<Hash, ClaimData>,
    }

    impl FixedRegistry {
        pub fn with_claim(mut self, name_hash: Hash, data: ClaimData) -> Self {
            self.claims.insert(name_hash, data);
            self
        }
    }

    impl ReservedRegistry for FixedRegistry {
        fn verify_claim(
            &self,
            name_hash: &Hash,
            _proof: &[u8],
            _commit_height: u32,
        ) -> Result<ClaimData, CovenantError> {
            self.claims
                .get(name_hash)
                .cloned()
                .ok_or_else(|| CovenantError::ClaimInvalid("name is not reserved".into()))
        }
    }

    /// An airdrop verifier that rejects everything; airdrops are opt-in
    /// for the scenarios that need them.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NoAirdrops;

    impl AirdropVerifier for NoAirdrops {
        fn verify_airdrop(&self, _proof: &[u8]) -> Result<AirdropData, CovenantError> {
            Err(CovenantError::ClaimInvalid("airdrops disabled".into()))
        }
    }
}
