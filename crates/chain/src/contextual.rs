// Path: crates/chain/src/contextual.rs
//! Contextual transaction checks.
//!
//! Runs with the coin view pre-positioned at the tip and the block's name
//! session open. Two phases per transaction: read-and-spend validation
//! (maturity, conservation, sigops), then covenant dispatch, which stages
//! name mutations into the session. Script witnesses are *not* checked
//! here — the connector batches them across the whole block and fans them
//! out on the worker pool.

use crate::coinview::{CoinStore, CoinView};
use crate::rules::{self, BlockCounters, Flows, RuleContext};
use crate::session::NameSession;
use crate::verify::ScriptVerifier;
use nomen_types::error::{ChainError, ContextualError};
use nomen_types::primitives::{Coin, Transaction};

/// Value flows of one validated transaction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TxFlows {
    /// Miner fee: input value minus output value minus burns.
    pub fee: u64,
    /// Value minted by claims/airdrops; credits chain state, not fees.
    pub conjured: u64,
    /// Value destroyed by covenant rules.
    pub burned: u64,
}

/// Validate one non-coinbase transaction against the session state, spend
/// its inputs, stage its name effects, and insert its outputs. Returns the
/// flows and the spent coins (for the script batch).
pub(crate) fn check_transaction<S: CoinStore>(
    tx: &Transaction,
    view: &mut CoinView<'_, S>,
    session: &mut NameSession<'_>,
    counters: &mut BlockCounters,
    scripts: &dyn ScriptVerifier,
    ctx: &RuleContext<'_>,
) -> Result<(TxFlows, Vec<Coin>), ChainError> {
    let mut input_value: u64 = 0;
    let mut coins = Vec::with_capacity(tx.inputs.len());

    for input in &tx.inputs {
        let coin = view.spend(&input.prevout)?;

        // Maturity: a coinbase may only be spent once
        // `height - coin.height >= coinbase_maturity`.
        if coin.coinbase {
            let age = coin.age(ctx.height);
            if age < ctx.params.coinbase_maturity {
                return Err(ContextualError::ImmatureCoinbaseSpend {
                    age,
                    required: ctx.params.coinbase_maturity,
                }
                .into());
            }
        }

        input_value = input_value
            .checked_add(coin.output.value)
            .ok_or(ContextualError::FeeOutOfRange)?;
        coins.push(coin);
    }

    // Sigops accrue against the block budget as we go.
    for (index, coin) in coins.iter().enumerate() {
        counters.sigops += scripts.sigops(tx, index, coin);
    }
    if counters.sigops > ctx.params.max_block_sigops {
        return Err(ContextualError::SigopsExceeded {
            count: counters.sigops,
            max: ctx.params.max_block_sigops,
        }
        .into());
    }

    let output_value = tx.output_value();
    if output_value > input_value {
        return Err(ContextualError::ValueConservation {
            inputs: input_value,
            outputs: output_value,
        }
        .into());
    }

    let flows = rules::process_transaction(tx, &coins, session, counters, ctx)?;

    // Burns are value reductions inside covenant pairs; they are part of
    // input-minus-output but are not a fee the miner may claim.
    let gross = input_value - output_value;
    let fee = gross.checked_sub(flows.burned).ok_or_else(|| {
        ChainError::Internal("covenant burn exceeds the transaction's value gap".into())
    })?;
    if fee > ctx.params.max_money {
        return Err(ContextualError::FeeOutOfRange.into());
    }

    view.add_tx(tx, ctx.height);

    Ok((
        TxFlows {
            fee,
            conjured: flows.conjured,
            burned: flows.burned,
        },
        coins,
    ))
}

/// Validate the coinbase's claim/airdrop envelopes and insert its outputs.
/// The subsidy ceiling is checked by the connector once every fee is known.
/// `conjured` already contains the claim-fee portion, so the coinbase
/// contributes no separate fee of its own.
pub(crate) fn check_coinbase<S: CoinStore>(
    tx: &Transaction,
    view: &mut CoinView<'_, S>,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<TxFlows, ChainError> {
    let flows: Flows = rules::process_coinbase(tx, session, ctx)?;
    view.add_tx(tx, ctx.height);
    Ok(TxFlows {
        fee: 0,
        conjured: flows.conjured,
        burned: flows.burned,
    })
}
