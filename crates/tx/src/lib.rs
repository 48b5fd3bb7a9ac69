// Path: crates/tx/src/lib.rs
//! Context-free transaction and block checks.
//!
//! Everything here is decidable from the bytes alone: structure, sizes,
//! value ranges, duplicate inputs, coinbase shape and covenant item
//! tables. Nothing consults the UTXO set or the name state; those checks
//! live in the contextual pass.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

use nomen_types::error::StructuralError;
use nomen_types::params::NetworkParams;
use nomen_types::primitives::{Block, Transaction, MAX_WITNESS_ITEM_SIZE};
use std::collections::HashSet;

/// Run the full context-free pass over one transaction.
pub fn check_sanity(tx: &Transaction, params: &NetworkParams) -> Result<(), StructuralError> {
    check_structure(tx)?;
    check_limits(tx, params)?;
    check_values(tx, params)?;
    check_inputs(tx)?;
    check_covenants(tx)?;
    Ok(())
}

fn check_structure(tx: &Transaction) -> Result<(), StructuralError> {
    if tx.inputs.is_empty() {
        return Err(StructuralError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(StructuralError::NoOutputs);
    }
    Ok(())
}

fn check_limits(tx: &Transaction, params: &NetworkParams) -> Result<(), StructuralError> {
    let size = tx.base_size();
    if size > params.max_tx_size {
        return Err(StructuralError::OversizedTx {
            size,
            max: params.max_tx_size,
        });
    }
    let weight = tx.weight(params.witness_scale_factor);
    if weight > params.max_tx_weight {
        return Err(StructuralError::OverweightTx {
            weight,
            max: params.max_tx_weight,
        });
    }
    Ok(())
}

fn check_values(tx: &Transaction, params: &NetworkParams) -> Result<(), StructuralError> {
    let mut total: u64 = 0;
    for (index, output) in tx.outputs.iter().enumerate() {
        if output.value > params.max_money {
            return Err(StructuralError::OutputOutOfRange {
                value: output.value,
            });
        }
        total = total
            .checked_add(output.value)
            .ok_or(StructuralError::TotalOutOfRange)?;
        if total > params.max_money {
            return Err(StructuralError::TotalOutOfRange);
        }
        if !output.address.is_valid() {
            return Err(StructuralError::BadAddress { index });
        }
    }
    Ok(())
}

fn check_inputs(tx: &Transaction) -> Result<(), StructuralError> {
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !input.prevout.is_null() && !seen.insert(input.prevout) {
            return Err(StructuralError::DuplicateInput(input.prevout));
        }
    }

    if tx.is_coinbase() {
        return check_coinbase_shape(tx);
    }

    for input in &tx.inputs {
        if input.prevout.is_null() {
            return Err(StructuralError::NullPrevout);
        }
    }
    Ok(())
}

/// A coinbase spends nothing: every input is a null outpoint. Inputs past
/// the first exist only to carry claim and airdrop envelopes, one witness
/// item each.
fn check_coinbase_shape(tx: &Transaction) -> Result<(), StructuralError> {
    for (index, input) in tx.inputs.iter().enumerate() {
        if !input.prevout.is_null() {
            return Err(StructuralError::BadCoinbaseShape(
                "coinbase input spends a real outpoint",
            ));
        }
        if index == 0 {
            continue;
        }
        if input.witness.len() != 1 {
            return Err(StructuralError::BadCoinbaseShape(
                "claim input must carry exactly one witness item",
            ));
        }
        if input.witness[0].len() > MAX_WITNESS_ITEM_SIZE {
            return Err(StructuralError::BadCoinbaseShape(
                "claim envelope exceeds the witness item limit",
            ));
        }
    }
    Ok(())
}

fn check_covenants(tx: &Transaction) -> Result<(), StructuralError> {
    for output in &tx.outputs {
        output.covenant.check_sanity()?;
    }
    Ok(())
}

/// Context-free checks for a whole block: shape, weight, and that the
/// header's merkle commitments match the transactions carried.
pub fn check_block_sanity(block: &Block, params: &NetworkParams) -> Result<(), StructuralError> {
    if block.transactions.is_empty() {
        return Err(StructuralError::BadCoinbaseShape("block has no coinbase"));
    }
    if !block.transactions[0].is_coinbase() {
        return Err(StructuralError::BadCoinbaseShape(
            "first transaction is not a coinbase",
        ));
    }
    for tx in &block.transactions[1..] {
        if tx.is_coinbase() {
            return Err(StructuralError::BadCoinbaseShape(
                "block carries more than one coinbase",
            ));
        }
    }

    let weight: usize = block
        .transactions
        .iter()
        .map(|tx| tx.weight(params.witness_scale_factor))
        .sum();
    if weight > params.max_block_weight {
        return Err(StructuralError::OverweightTx {
            weight,
            max: params.max_block_weight,
        });
    }

    if block.merkle_root() != block.header.merkle_root {
        return Err(StructuralError::CommitmentMismatch(
            "merkle root does not cover the transactions",
        ));
    }
    if block.witness_root() != block.header.witness_root {
        return Err(StructuralError::CommitmentMismatch(
            "witness root does not cover the transactions",
        ));
    }

    for tx in &block.transactions {
        check_sanity(tx, params)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_types::hash::{blake2b256, sha3_256};
    use nomen_types::primitives::{
        Address, Covenant, CovenantType, Input, Outpoint, Output,
    };

    fn params() -> NetworkParams {
        NetworkParams::regtest()
    }

    fn plain_tx() -> Transaction {
        Transaction {
            version: 0,
            inputs: vec![Input::new(Outpoint::new(blake2b256(b"prev"), 0))],
            outputs: vec![Output::plain(1_000, Address::new(0, vec![1u8; 20]))],
            locktime: 0,
        }
    }

    fn coinbase_tx() -> Transaction {
        Transaction {
            version: 0,
            inputs: vec![Input::new(Outpoint::NULL)],
            outputs: vec![Output::plain(1_000, Address::new(0, vec![1u8; 20]))],
            locktime: 0,
        }
    }

    #[test]
    fn accepts_plain_and_coinbase() {
        assert_eq!(check_sanity(&plain_tx(), &params()), Ok(()));
        assert_eq!(check_sanity(&coinbase_tx(), &params()), Ok(()));
    }

    #[test]
    fn rejects_empty_sides() {
        let mut tx = plain_tx();
        tx.inputs.clear();
        assert_eq!(check_sanity(&tx, &params()), Err(StructuralError::NoInputs));
        let mut tx = plain_tx();
        tx.outputs.clear();
        assert_eq!(check_sanity(&tx, &params()), Err(StructuralError::NoOutputs));
    }

    #[test]
    fn rejects_duplicate_inputs() {
        let mut tx = plain_tx();
        tx.inputs.push(tx.inputs[0].clone());
        assert!(matches!(
            check_sanity(&tx, &params()),
            Err(StructuralError::DuplicateInput(_))
        ));
    }

    #[test]
    fn rejects_null_prevout_outside_coinbase() {
        let mut tx = plain_tx();
        tx.inputs.push(Input::new(Outpoint::NULL));
        assert_eq!(
            check_sanity(&tx, &params()),
            Err(StructuralError::NullPrevout)
        );
    }

    #[test]
    fn rejects_value_overflow() {
        let p = params();
        let mut tx = plain_tx();
        tx.outputs[0].value = p.max_money + 1;
        assert!(matches!(
            check_sanity(&tx, &p),
            Err(StructuralError::OutputOutOfRange { .. })
        ));

        let mut tx = plain_tx();
        tx.outputs[0].value = p.max_money;
        tx.outputs.push(Output::plain(1, Address::new(0, vec![2u8; 20])));
        assert_eq!(
            check_sanity(&tx, &p),
            Err(StructuralError::TotalOutOfRange)
        );
    }

    #[test]
    fn coinbase_claim_inputs_carry_one_envelope() {
        let mut tx = coinbase_tx();
        let mut claim_input = Input::new(Outpoint::NULL);
        claim_input.witness = vec![vec![0u8; 100]];
        tx.inputs.push(claim_input);
        assert_eq!(check_sanity(&tx, &params()), Ok(()));

        // Two witness items is not an envelope.
        tx.inputs[1].witness.push(vec![1]);
        assert!(matches!(
            check_sanity(&tx, &params()),
            Err(StructuralError::BadCoinbaseShape(_))
        ));

        // Neither is spending a real outpoint.
        let mut tx = coinbase_tx();
        tx.inputs.push(Input::new(Outpoint::new(blake2b256(b"x"), 0)));
        assert!(matches!(
            check_sanity(&tx, &params()),
            Err(StructuralError::BadCoinbaseShape(_))
        ));
    }

    #[test]
    fn rejects_malformed_covenant() {
        let mut tx = plain_tx();
        tx.outputs[0].covenant = Covenant::new(
            CovenantType::Open,
            vec![sha3_256(b"alpha").as_bytes().to_vec()],
        );
        assert!(matches!(
            check_sanity(&tx, &params()),
            Err(StructuralError::CovenantShape(_))
        ));
    }

    #[test]
    fn block_sanity_checks_roots_and_coinbase() {
        use nomen_types::primitives::{Block, BlockHeader};

        let coinbase = coinbase_tx();
        let mut header = BlockHeader {
            version: 0,
            prev_block: blake2b256(b"prev"),
            merkle_root: nomen_types::Hash::ZERO,
            witness_root: nomen_types::Hash::ZERO,
            tree_root: nomen_types::Hash::ZERO,
            reserved_root: nomen_types::Hash::ZERO,
            extra_nonce: [0u8; 24],
            time: 0,
            bits: 0,
            nonce: 0,
            mask: [0u8; 32],
        };
        let mut block = Block {
            header,
            transactions: vec![coinbase],
        };
        // Wrong roots fail.
        assert!(check_block_sanity(&block, &params()).is_err());

        header.merkle_root = block.merkle_root();
        header.witness_root = block.witness_root();
        block.header = header;
        assert_eq!(check_block_sanity(&block, &params()), Ok(()));

        // A second coinbase fails.
        block.transactions.push(coinbase_tx());
        block.header.merkle_root = block.merkle_root();
        block.header.witness_root = block.witness_root();
        assert!(matches!(
            check_block_sanity(&block, &params()),
            Err(StructuralError::BadCoinbaseShape(_))
        ));
    }
}
