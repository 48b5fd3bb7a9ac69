// Path: crates/types/src/error.rs
//! Error taxonomy for the consensus core.
//!
//! One enum per validation layer, unified at the top by [`ChainError`].
//! Validation errors never unwind partial state; the block connector keeps
//! all mutations in a staging session and discards it on the first error.

use crate::encoding::DecodeError;
use crate::hash::Hash;
use crate::name::NameError;
use crate::namestate::NamePhase;
use crate::primitives::{CovenantShapeError, CovenantType, Outpoint};
use thiserror::Error;

/// A stable, machine-readable string code for an error variant. Hosts key
/// peer policy and RPC output off these codes, never off `Display` text.
pub trait ErrorCode {
    /// The unique, stable identifier for this error variant.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DecodeError {
    fn code(&self) -> &'static str {
        use crate::encoding::DecodeKind::*;
        match self.kind {
            UnexpectedEnd => "DECODE_UNEXPECTED_END",
            NonCanonicalVarint => "DECODE_NON_CANONICAL_VARINT",
            ValueOutOfRange => "DECODE_VALUE_OUT_OF_RANGE",
            Oversized => "DECODE_OVERSIZED",
            BadTag => "DECODE_BAD_TAG",
            TrailingBytes => "DECODE_TRAILING_BYTES",
        }
    }
}

/// Context-free transaction failures (structure, sizes, shapes).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("transaction base size {size} exceeds {max}")]
    OversizedTx { size: usize, max: usize },
    #[error("transaction weight {weight} exceeds {max}")]
    OverweightTx { weight: usize, max: usize },
    #[error("output value {value} out of range")]
    OutputOutOfRange { value: u64 },
    #[error("total output value out of range")]
    TotalOutOfRange,
    #[error("duplicate input {0}")]
    DuplicateInput(Outpoint),
    #[error("invalid coinbase shape: {0}")]
    BadCoinbaseShape(&'static str),
    #[error("header commitment mismatch: {0}")]
    CommitmentMismatch(&'static str),
    #[error("non-coinbase transaction carries a null prevout")]
    NullPrevout,
    #[error("invalid address on output {index}")]
    BadAddress { index: usize },
    #[error(transparent)]
    CovenantShape(#[from] CovenantShapeError),
}

impl ErrorCode for StructuralError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoInputs => "STRUCT_NO_INPUTS",
            Self::NoOutputs => "STRUCT_NO_OUTPUTS",
            Self::OversizedTx { .. } => "STRUCT_OVERSIZED_TX",
            Self::OverweightTx { .. } => "STRUCT_OVERWEIGHT_TX",
            Self::OutputOutOfRange { .. } => "STRUCT_OUTPUT_OUT_OF_RANGE",
            Self::TotalOutOfRange => "STRUCT_TOTAL_OUT_OF_RANGE",
            Self::DuplicateInput(_) => "STRUCT_DUPLICATE_INPUT",
            Self::BadCoinbaseShape(_) => "STRUCT_BAD_COINBASE",
            Self::CommitmentMismatch(_) => "STRUCT_COMMITMENT_MISMATCH",
            Self::NullPrevout => "STRUCT_NULL_PREVOUT",
            Self::BadAddress { .. } => "STRUCT_BAD_ADDRESS",
            Self::CovenantShape(CovenantShapeError::ItemCount { .. }) => {
                "STRUCT_COVENANT_ITEM_COUNT"
            }
            Self::CovenantShape(CovenantShapeError::ItemSize { .. }) => "STRUCT_COVENANT_ITEM_SIZE",
        }
    }
}

/// Which per-block aggregate cap was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapKind {
    Opens,
    Updates,
    Renewals,
}

/// Covenant state-machine failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CovenantError {
    #[error("{action:?} not allowed in phase {phase:?}")]
    BadPhase { action: CovenantType, phase: NamePhase },
    #[error("{action:?} covenant items malformed")]
    BadItems { action: CovenantType },
    #[error("reveal does not match bid blind")]
    BadBlind,
    #[error("input coin does not own the name")]
    BadOwner,
    #[error("{action:?} output value {found}, expected {expected}")]
    BadValue {
        action: CovenantType,
        expected: u64,
        found: u64,
    },
    #[error("covenant name does not match its hash")]
    BadName,
    #[error("{from:?} coin cannot continue as {to:?}")]
    BadTransition {
        from: CovenantType,
        to: Option<CovenantType>,
    },
    #[error("{action:?} names a nonexistent state")]
    NameAbsent { action: CovenantType },
    #[error("finalize output does not pay the recorded transfer target")]
    BadTarget,
    #[error("name already has a live auction or owner")]
    DuplicateOpen,
    #[error("reserved-name claim rejected: {0}")]
    ClaimInvalid(String),
    #[error("transfer matures at height {matures_at}")]
    TransferNotReady { matures_at: u32 },
    #[error("name is revoked")]
    Revoked,
    #[error("coin carrying a {action:?} covenant can never be spent")]
    Unspendable { action: CovenantType },
    #[error("{action:?} covenant not allowed in this transaction context")]
    BadContext { action: CovenantType },
    #[error("name is not available until height {available_at}")]
    Rollout { available_at: u32 },
    #[error("block exceeds {kind:?} cap of {max}")]
    CapExceeded { kind: CapKind, max: usize },
}

impl ErrorCode for CovenantError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadPhase { .. } => "COVENANT_BAD_PHASE",
            Self::BadItems { .. } => "COVENANT_BAD_ITEMS",
            Self::BadBlind => "COVENANT_BAD_BLIND",
            Self::BadOwner => "COVENANT_BAD_OWNER",
            Self::BadValue { .. } => "COVENANT_BAD_VALUE",
            Self::BadName => "COVENANT_BAD_NAME",
            Self::BadTransition { .. } => "COVENANT_BAD_TRANSITION",
            Self::NameAbsent { .. } => "COVENANT_NAME_ABSENT",
            Self::BadTarget => "COVENANT_BAD_TARGET",
            Self::DuplicateOpen => "COVENANT_DUPLICATE_OPEN",
            Self::ClaimInvalid(_) => "COVENANT_CLAIM_INVALID",
            Self::TransferNotReady { .. } => "COVENANT_TRANSFER_NOT_READY",
            Self::Revoked => "COVENANT_REVOKED",
            Self::Unspendable { .. } => "COVENANT_UNSPENDABLE",
            Self::BadContext { .. } => "COVENANT_BAD_CONTEXT",
            Self::Rollout { .. } => "COVENANT_ROLLOUT",
            Self::CapExceeded { .. } => "COVENANT_CAP_EXCEEDED",
        }
    }
}

/// Contextual (state-dependent) transaction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextualError {
    #[error("missing prevout {0}")]
    MissingPrevout(Outpoint),
    #[error("double spend of {0}")]
    DoubleSpend(Outpoint),
    #[error("coinbase spent {age} blocks after creation, requires {required}")]
    ImmatureCoinbaseSpend { age: u32, required: u32 },
    #[error("outputs {outputs} exceed inputs {inputs}")]
    ValueConservation { inputs: u64, outputs: u64 },
    #[error("fee out of range")]
    FeeOutOfRange,
    #[error("sigops {count} exceed block limit {max}")]
    SigopsExceeded { count: usize, max: usize },
    #[error(transparent)]
    Covenant(#[from] CovenantError),
}

impl ErrorCode for ContextualError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingPrevout(_) => "CONTEXT_MISSING_PREVOUT",
            Self::DoubleSpend(_) => "CONTEXT_DOUBLE_SPEND",
            Self::ImmatureCoinbaseSpend { .. } => "CONTEXT_IMMATURE_COINBASE",
            Self::ValueConservation { .. } => "CONTEXT_VALUE_CONSERVATION",
            Self::FeeOutOfRange => "CONTEXT_FEE_OUT_OF_RANGE",
            Self::SigopsExceeded { .. } => "CONTEXT_SIGOPS_EXCEEDED",
            Self::Covenant(inner) => inner.code(),
        }
    }
}

/// Cross-transaction conflicts detected at block scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateConflict {
    #[error("name opened twice within one block")]
    DuplicateOpen { name_hash: Hash },
    #[error("name mutated twice within one block")]
    DoubleUpdate { name_hash: Hash },
}

impl ErrorCode for StateConflict {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateOpen { .. } => "STATE_DUPLICATE_OPEN",
            Self::DoubleUpdate { .. } => "STATE_DOUBLE_UPDATE",
        }
    }
}

/// Failure from the script collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("script verification failed on input {input}: {reason}")]
pub struct ScriptError {
    pub input: usize,
    pub reason: String,
}

impl ErrorCode for ScriptError {
    fn code(&self) -> &'static str {
        "SCRIPT_VERIFY_FAILED"
    }
}

/// Failures from the authenticated name tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("missing tree node {0}")]
    MissingNode(Hash),
    #[error("root {0} is not retained")]
    UnknownRoot(Hash),
    #[error("proof did not anchor to the requested root")]
    ProofDidNotAnchor,
    #[error("proof is malformed: {0}")]
    BadProof(&'static str),
    #[error("tree value of {size} bytes exceeds {max}")]
    ValueTooLarge { size: usize, max: usize },
    #[error("tree backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ErrorCode for TreeError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingNode(_) => "TREE_MISSING_NODE",
            Self::UnknownRoot(_) => "TREE_UNKNOWN_ROOT",
            Self::ProofDidNotAnchor => "TREE_PROOF_NO_ANCHOR",
            Self::BadProof(_) => "TREE_BAD_PROOF",
            Self::ValueTooLarge { .. } => "TREE_VALUE_TOO_LARGE",
            Self::Backend(_) => "TREE_BACKEND",
            Self::Decode(inner) => inner.code(),
        }
    }
}

/// Top-level validation error. Carries everything a host needs to log the
/// reject and adjust peer standing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Contextual(#[from] ContextualError),
    #[error(transparent)]
    Conflict(#[from] StateConflict),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("block coinbase claims {claimed}, allowed {allowed}")]
    BadCoinbaseValue { claimed: u64, allowed: u64 },
    #[error("header commits to tree root {header}, computed {computed}")]
    BadTreeRoot { header: Hash, computed: Hash },
    #[error("block connects to {found}, tip is {expected}")]
    Orphan { expected: Hash, found: Hash },
    #[error("invariant violated: {0}")]
    Internal(String),
}

impl From<CovenantError> for ChainError {
    fn from(err: CovenantError) -> Self {
        Self::Contextual(ContextualError::Covenant(err))
    }
}

impl ErrorCode for ChainError {
    fn code(&self) -> &'static str {
        match self {
            Self::Decode(inner) => inner.code(),
            Self::Structural(inner) => inner.code(),
            Self::Contextual(inner) => inner.code(),
            Self::Conflict(inner) => inner.code(),
            Self::Script(inner) => inner.code(),
            Self::Tree(inner) => inner.code(),
            Self::Name(_) => "NAME_INVALID",
            Self::BadCoinbaseValue { .. } => "BLOCK_BAD_COINBASE_VALUE",
            Self::BadTreeRoot { .. } => "BLOCK_BAD_TREE_ROOT",
            Self::Orphan { .. } => "BLOCK_ORPHAN",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl ChainError {
    /// Peer penalty for relaying whatever caused this error. The host acts
    /// on the score; the core only assigns it.
    pub fn ban_score(&self) -> u32 {
        match self {
            // Consensus-fatal: the bytes themselves prove misbehavior.
            Self::Decode(_)
            | Self::Structural(_)
            | Self::Contextual(_)
            | Self::Conflict(_)
            | Self::Script(_)
            | Self::BadCoinbaseValue { .. }
            | Self::BadTreeRoot { .. }
            | Self::Name(_) => 100,
            // An orphan may be an honest race.
            Self::Orphan { .. } => 10,
            // Our problem, not the peer's.
            Self::Tree(_) | Self::Internal(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::DecodeKind;

    #[test]
    fn codes_are_stable() {
        let err = ChainError::from(ContextualError::Covenant(CovenantError::BadBlind));
        assert_eq!(err.code(), "COVENANT_BAD_BLIND");
        let err = ChainError::from(DecodeError {
            kind: DecodeKind::UnexpectedEnd,
            offset: 3,
        });
        assert_eq!(err.code(), "DECODE_UNEXPECTED_END");
    }

    #[test]
    fn ban_scores() {
        assert_eq!(ChainError::from(StructuralError::NoInputs).ban_score(), 100);
        assert_eq!(ChainError::Internal("bug".into()).ban_score(), 0);
        assert_eq!(
            ChainError::Orphan {
                expected: Hash::ZERO,
                found: Hash::ZERO,
            }
            .ban_score(),
            10
        );
    }
}
