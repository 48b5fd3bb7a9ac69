// Path: crates/chain/src/rules.rs
//! The covenant state machine.
//!
//! Covenants pair positionally: the coin spent by input `i` and the output
//! at index `i` form one transition. Creation covenants (OPEN, BID, CLAIM)
//! need no name coin behind them; every other name covenant must continue
//! the coin at its index, on the same name, along a legal edge:
//!
//! ```text
//! BID      -> REVEAL
//! REVEAL   -> REDEEM | REGISTER
//! CLAIM    -> UPDATE | RENEW | TRANSFER | REVOKE
//! REGISTER | UPDATE | RENEW | FINALIZE
//!          -> UPDATE | RENEW | TRANSFER | REVOKE
//! TRANSFER -> UPDATE (cancel) | FINALIZE | REVOKE
//! REVOKE   -> (nothing; the coin is dead)
//! ```
//!
//! Every arm owns its item decoding and its rule. State mutations land in
//! the block session; the caller throws the session away on any error, so
//! a rule can mutate as it validates without partial-apply hazards.

use crate::chain::RecentBlocks;
use crate::session::NameSession;
use crate::verify::{AirdropVerifier, ReservedRegistry};
use nomen_types::error::{CapKind, ChainError, CovenantError, StateConflict};
use nomen_types::hash::{blake2b256, sha3_256, Hash};
use nomen_types::name;
use nomen_types::namestate::{NamePhase, NameState};
use nomen_types::params::NetworkParams;
use nomen_types::primitives::{Address, Coin, CovenantType, Outpoint, Output, Transaction};

/// Per-block running totals checked against the aggregate caps.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCounters {
    pub opens: usize,
    pub updates: usize,
    pub renewals: usize,
    pub sigops: usize,
}

/// Value flows a transaction's covenants produce beyond plain fees.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flows {
    /// Value destroyed: reveal surplus, register surplus, revoked locks.
    pub burned: u64,
    /// Value minted by claims and airdrops, the fee portion included; it
    /// raises the coinbase allowance rather than the fee total.
    pub conjured: u64,
}

/// Read-only context threaded through every rule.
pub(crate) struct RuleContext<'a> {
    pub height: u32,
    pub params: &'a NetworkParams,
    pub registry: &'a dyn ReservedRegistry,
    pub airdrops: &'a dyn AirdropVerifier,
    pub recent: &'a RecentBlocks,
}

impl std::fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleContext")
            .field("height", &self.height)
            .finish()
    }
}

/// Legal output covenants for a spent name coin.
fn successors(from: CovenantType) -> &'static [CovenantType] {
    use CovenantType::*;
    match from {
        Bid => &[Reveal],
        Reveal => &[Redeem, Register],
        Claim => &[Update, Renew, Transfer, Revoke],
        Register | Update | Renew | Finalize => &[Update, Renew, Transfer, Revoke],
        Transfer => &[Update, Finalize, Revoke],
        // Plain coins constrain nothing; REVOKE is handled before this.
        None | Redeem | Open | Revoke => &[],
    }
}

/// Whether this covenant type must be continued when its coin is spent.
fn requires_continuation(covenant_type: CovenantType) -> bool {
    use CovenantType::*;
    matches!(
        covenant_type,
        Bid | Reveal | Claim | Register | Update | Renew | Transfer | Finalize
    )
}

/// Validate and apply the covenants of one non-coinbase transaction.
/// `coins[i]` is the coin spent by input `i`, already loaded by the
/// contextual pass.
pub(crate) fn process_transaction(
    tx: &Transaction,
    coins: &[Coin],
    session: &mut NameSession<'_>,
    counters: &mut BlockCounters,
    ctx: &RuleContext<'_>,
) -> Result<Flows, ChainError> {
    debug_assert_eq!(coins.len(), tx.inputs.len());
    let txid = tx.txid();
    let wtxid = tx.wtxid();
    let mut flows = Flows::default();

    let width = tx.inputs.len().max(tx.outputs.len());
    for index in 0..width {
        let coin = coins.get(index);
        let output = tx.outputs.get(index);

        // Input side: a name coin must be continued along a legal edge.
        if let Some(coin) = coin {
            let from = coin.output.covenant.covenant_type;
            if from == CovenantType::Revoke {
                return Err(CovenantError::Unspendable { action: from }.into());
            }
            if requires_continuation(from) {
                let Some(output) = output else {
                    return Err(CovenantError::BadTransition { from, to: None }.into());
                };
                let to = output.covenant.covenant_type;
                if !successors(from).contains(&to) {
                    return Err(CovenantError::BadTransition { from, to: Some(to) }.into());
                }
                if output.covenant.name_hash() != coin.output.covenant.name_hash() {
                    return Err(CovenantError::BadName.into());
                }
            }
        }

        // Output side: dispatch on the action.
        let Some(output) = output else { continue };
        let new_outpoint = Outpoint::new(txid, index as u32);
        match output.covenant.covenant_type {
            CovenantType::None => {}
            CovenantType::Claim => {
                return Err(CovenantError::BadContext {
                    action: CovenantType::Claim,
                }
                .into());
            }
            CovenantType::Open => {
                check_open(output, session, counters, ctx)?;
            }
            CovenantType::Bid => {
                check_bid(output, session, ctx)?;
            }
            CovenantType::Reveal => {
                let coin = continued_coin(coin, CovenantType::Reveal)?;
                flows.burned += check_reveal(coin, output, new_outpoint, wtxid, session, ctx)?;
            }
            CovenantType::Redeem => {
                let coin = continued_coin(coin, CovenantType::Redeem)?;
                check_redeem(coin, tx.inputs[index].prevout, session)?;
            }
            CovenantType::Register => {
                let coin = continued_coin(coin, CovenantType::Register)?;
                flows.burned += check_register(
                    coin,
                    output,
                    tx.inputs[index].prevout,
                    new_outpoint,
                    session,
                    ctx,
                )?;
            }
            CovenantType::Update => {
                let coin = continued_coin(coin, CovenantType::Update)?;
                check_update(
                    coin,
                    output,
                    tx.inputs[index].prevout,
                    new_outpoint,
                    session,
                    counters,
                    ctx,
                )?;
            }
            CovenantType::Renew => {
                let coin = continued_coin(coin, CovenantType::Renew)?;
                check_renew(
                    coin,
                    output,
                    tx.inputs[index].prevout,
                    new_outpoint,
                    session,
                    counters,
                    ctx,
                )?;
            }
            CovenantType::Transfer => {
                let coin = continued_coin(coin, CovenantType::Transfer)?;
                check_transfer(
                    coin,
                    output,
                    tx.inputs[index].prevout,
                    new_outpoint,
                    session,
                    ctx,
                )?;
            }
            CovenantType::Finalize => {
                let coin = continued_coin(coin, CovenantType::Finalize)?;
                check_finalize(
                    coin,
                    output,
                    tx.inputs[index].prevout,
                    new_outpoint,
                    session,
                    ctx,
                )?;
            }
            CovenantType::Revoke => {
                let coin = continued_coin(coin, CovenantType::Revoke)?;
                flows.burned +=
                    check_revoke(coin, output, tx.inputs[index].prevout, session, ctx)?;
            }
        }
    }

    Ok(flows)
}

/// Validate and apply the claim/airdrop envelopes of a coinbase.
pub(crate) fn process_coinbase(
    tx: &Transaction,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<Flows, ChainError> {
    let txid = tx.txid();
    let mut flows = Flows::default();

    for (index, output) in tx.outputs.iter().enumerate() {
        let envelope = if index > 0 && index < tx.inputs.len() {
            tx.inputs[index].witness.first().map(Vec::as_slice)
        } else {
            Option::None
        };

        match (output.covenant.covenant_type, envelope) {
            (CovenantType::None, Option::None) => {}
            (CovenantType::None, Some(proof)) => {
                flows = flows.merge(check_airdrop(output, proof, ctx)?);
            }
            (CovenantType::Claim, Some(proof)) => {
                let outpoint = Outpoint::new(txid, index as u32);
                flows = flows.merge(check_claim(output, proof, outpoint, session, ctx)?);
            }
            (action, _) => {
                // Claims without an envelope and every other name covenant
                // have no business in a coinbase.
                return Err(CovenantError::BadContext { action }.into());
            }
        }
    }

    // Envelope inputs past the outputs would mint nothing; reject rather
    // than silently ignore them.
    if tx.inputs.len() > 1 && tx.inputs.len() > tx.outputs.len() {
        return Err(CovenantError::BadContext {
            action: CovenantType::Claim,
        }
        .into());
    }

    Ok(flows)
}

impl Flows {
    fn merge(mut self, other: Flows) -> Flows {
        self.burned += other.burned;
        self.conjured += other.conjured;
        self
    }
}

/// The continuation coin for an output covenant; absence is an illegal
/// transition from nothing.
fn continued_coin(coin: Option<&Coin>, to: CovenantType) -> Result<&Coin, ChainError> {
    coin.ok_or_else(|| {
        CovenantError::BadTransition {
            from: CovenantType::None,
            to: Some(to),
        }
        .into()
    })
}

fn state_for(
    session: &NameSession<'_>,
    name_hash: &Hash,
    action: CovenantType,
) -> Result<NameState, ChainError> {
    session
        .get(name_hash)
        .cloned()
        .ok_or_else(|| CovenantError::NameAbsent { action }.into())
}

fn expect_phase(
    ns: &NameState,
    action: CovenantType,
    wanted: NamePhase,
    ctx: &RuleContext<'_>,
) -> Result<(), CovenantError> {
    let phase = ns.phase(ctx.height, ctx.params);
    if phase != wanted {
        return Err(CovenantError::BadPhase { action, phase });
    }
    Ok(())
}

fn expect_owner(
    ns: &NameState,
    prevout: Outpoint,
) -> Result<(), CovenantError> {
    if ns.owner != prevout {
        return Err(CovenantError::BadOwner);
    }
    Ok(())
}

fn expect_value(action: CovenantType, expected: u64, found: u64) -> Result<(), CovenantError> {
    if found != expected {
        return Err(CovenantError::BadValue {
            action,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_open(
    output: &Output,
    session: &mut NameSession<'_>,
    counters: &mut BlockCounters,
    ctx: &RuleContext<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Open;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    expect_value(action, 0, output.value)?;
    if covenant.item_u32(1) != Some(0) {
        return Err(CovenantError::BadItems { action }.into());
    }

    let raw_name = covenant
        .items
        .get(2)
        .ok_or(CovenantError::BadItems { action })?;
    name::validate(raw_name)?;
    if sha3_256(raw_name) != name_hash {
        return Err(CovenantError::BadName.into());
    }

    let available_at = name::rollout_height(&name_hash, ctx.params);
    if ctx.height < available_at {
        return Err(CovenantError::Rollout { available_at }.into());
    }

    if let Some(existing) = session.get(&name_hash) {
        // An auction opened by an earlier transaction of this very block
        // is a block-local conflict, not a covenant failure.
        if existing.height == ctx.height && !existing.is_claimed() {
            return Err(StateConflict::DuplicateOpen { name_hash }.into());
        }
        if !existing.can_reopen(ctx.height, ctx.params) {
            return Err(CovenantError::DuplicateOpen.into());
        }
    }

    counters.opens += 1;
    if counters.opens > ctx.params.max_block_opens {
        return Err(CovenantError::CapExceeded {
            kind: CapKind::Opens,
            max: ctx.params.max_block_opens,
        }
        .into());
    }

    session.update(NameState::open(raw_name.clone(), name_hash, ctx.height));
    Ok(())
}

fn check_bid(
    output: &Output,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Bid;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let ns = state_for(session, &name_hash, action)?;
    expect_phase(&ns, action, NamePhase::Bidding, ctx)?;
    // The bid binds to this auction cycle via the open height.
    if covenant.item_u32(1) != Some(ns.height) {
        return Err(CovenantError::BadItems { action }.into());
    }
    Ok(())
}

fn check_reveal(
    coin: &Coin,
    output: &Output,
    new_outpoint: Outpoint,
    wtxid: Hash,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<u64, ChainError> {
    let action = CovenantType::Reveal;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_phase(&ns, action, NamePhase::Reveal, ctx)?;

    // A bid from a previous auction cycle cannot reveal into this one.
    if coin.output.covenant.item_u32(1) != Some(ns.height) {
        return Err(CovenantError::BadItems { action }.into());
    }

    // The lockup must cover the revealed value; the remainder burns.
    if output.value > coin.output.value {
        return Err(CovenantError::BadValue {
            action,
            expected: coin.output.value,
            found: output.value,
        }
        .into());
    }

    let blind = coin
        .output
        .covenant
        .item_hash(2)
        .ok_or(CovenantError::BadItems { action: CovenantType::Bid })?;
    let nonce = covenant
        .items
        .get(1)
        .ok_or(CovenantError::BadItems { action })?;
    let mut preimage = Vec::with_capacity(nonce.len() + 8);
    preimage.extend_from_slice(nonce);
    preimage.extend_from_slice(&output.value.to_le_bytes());
    if sha3_256(&preimage) != blind {
        return Err(CovenantError::BadBlind.into());
    }

    let burned = coin.output.value - output.value;
    ns.apply_reveal(output.value, new_outpoint, wtxid);
    session.update(ns);
    Ok(burned)
}

fn check_redeem(
    coin: &Coin,
    prevout: Outpoint,
    session: &mut NameSession<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Redeem;
    let name_hash = coin
        .output
        .covenant
        .name_hash()
        .ok_or(CovenantError::BadItems { action })?;
    let ns = state_for(session, &name_hash, action)?;
    // Only losing reveals redeem; the winner's path is REGISTER.
    if ns.owner == prevout {
        return Err(CovenantError::BadOwner.into());
    }
    Ok(())
}

fn check_register(
    coin: &Coin,
    output: &Output,
    prevout: Outpoint,
    new_outpoint: Outpoint,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<u64, ChainError> {
    let action = CovenantType::Register;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_owner(&ns, prevout)?;
    expect_phase(&ns, action, NamePhase::Closed, ctx)?;
    expect_value(action, ns.value, output.value)?;

    let data = covenant
        .items
        .get(1)
        .ok_or(CovenantError::BadItems { action })?;
    if data.len() > ctx.params.max_resource_size {
        return Err(CovenantError::BadItems { action }.into());
    }

    // The winning lockup pays the second price; the rest burns.
    let burned = coin
        .output
        .value
        .checked_sub(ns.value)
        .ok_or(CovenantError::BadValue {
            action,
            expected: ns.value,
            found: coin.output.value,
        })?;

    ns.data = data.clone();
    ns.owner = new_outpoint;
    ns.renewal = ctx.height;
    session.update(ns);
    Ok(burned)
}

fn check_update(
    coin: &Coin,
    output: &Output,
    prevout: Outpoint,
    new_outpoint: Outpoint,
    session: &mut NameSession<'_>,
    counters: &mut BlockCounters,
    ctx: &RuleContext<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Update;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_owner(&ns, prevout)?;
    expect_phase(&ns, action, NamePhase::Closed, ctx)?;
    expect_value(action, coin.output.value, output.value)?;

    let data = covenant
        .items
        .get(1)
        .ok_or(CovenantError::BadItems { action })?;
    if data.len() > ctx.params.max_resource_size {
        return Err(CovenantError::BadItems { action }.into());
    }

    counters.updates += 1;
    if counters.updates > ctx.params.max_block_updates {
        return Err(CovenantError::CapExceeded {
            kind: CapKind::Updates,
            max: ctx.params.max_block_updates,
        }
        .into());
    }

    // Spending a pending TRANSFER into an UPDATE cancels the transfer.
    ns.transfer = 0;
    ns.transfer_version = 0;
    ns.transfer_hash = Vec::new();
    ns.data = data.clone();
    ns.owner = new_outpoint;
    session.update(ns);
    Ok(())
}

fn check_renew(
    coin: &Coin,
    output: &Output,
    prevout: Outpoint,
    new_outpoint: Outpoint,
    session: &mut NameSession<'_>,
    counters: &mut BlockCounters,
    ctx: &RuleContext<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Renew;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_owner(&ns, prevout)?;
    expect_phase(&ns, action, NamePhase::Closed, ctx)?;
    expect_value(action, coin.output.value, output.value)?;

    // Freshness: the referenced block must be main-chain and recent.
    let reference = covenant
        .item_hash(1)
        .ok_or(CovenantError::BadItems { action })?;
    if !ctx.recent.contains(&reference, ctx.params.renewal_maturity) {
        return Err(CovenantError::BadItems { action }.into());
    }

    counters.renewals += 1;
    if counters.renewals > ctx.params.max_block_renewals {
        return Err(CovenantError::CapExceeded {
            kind: CapKind::Renewals,
            max: ctx.params.max_block_renewals,
        }
        .into());
    }

    ns.renewal = ctx.height;
    ns.owner = new_outpoint;
    session.update(ns);
    Ok(())
}

fn check_transfer(
    coin: &Coin,
    output: &Output,
    prevout: Outpoint,
    new_outpoint: Outpoint,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Transfer;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_owner(&ns, prevout)?;
    expect_phase(&ns, action, NamePhase::Closed, ctx)?;
    expect_value(action, coin.output.value, output.value)?;

    let version = *covenant
        .items
        .get(1)
        .and_then(|item| item.first())
        .ok_or(CovenantError::BadItems { action })?;
    let target_hash = covenant
        .items
        .get(2)
        .ok_or(CovenantError::BadItems { action })?
        .clone();
    if !Address::new(version, target_hash.clone()).is_valid() {
        return Err(CovenantError::BadItems { action }.into());
    }

    ns.transfer = ctx.height;
    ns.transfer_version = version;
    ns.transfer_hash = target_hash;
    ns.owner = new_outpoint;
    session.update(ns);
    Ok(())
}

fn check_finalize(
    coin: &Coin,
    output: &Output,
    prevout: Outpoint,
    new_outpoint: Outpoint,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<(), ChainError> {
    let action = CovenantType::Finalize;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_owner(&ns, prevout)?;
    expect_phase(&ns, action, NamePhase::Closed, ctx)?;
    expect_value(action, coin.output.value, output.value)?;

    if !ns.in_transfer() {
        return Err(CovenantError::BadOwner.into());
    }
    let matures_at = ns.transfer + ctx.params.transfer_lockup;
    if ctx.height < matures_at {
        return Err(CovenantError::TransferNotReady { matures_at }.into());
    }

    if covenant.items.get(1) != Some(&ns.name) {
        return Err(CovenantError::BadName.into());
    }
    let target = Address::new(ns.transfer_version, ns.transfer_hash.clone());
    if output.address != target {
        return Err(CovenantError::BadTarget.into());
    }

    ns.transfer = 0;
    ns.transfer_version = 0;
    ns.transfer_hash = Vec::new();
    ns.owner = new_outpoint;
    ns.renewal = ctx.height;
    session.update(ns);
    Ok(())
}

fn check_revoke(
    coin: &Coin,
    output: &Output,
    prevout: Outpoint,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<u64, ChainError> {
    let action = CovenantType::Revoke;
    let name_hash = output
        .covenant
        .name_hash()
        .ok_or(CovenantError::BadItems { action })?;

    let mut ns = state_for(session, &name_hash, action)?;
    expect_owner(&ns, prevout)?;
    if ns.is_revoked() {
        return Err(CovenantError::Revoked.into());
    }
    expect_value(action, coin.output.value, output.value)?;

    // The revoke output can never be spent again; its value is destroyed.
    let burned = output.value;
    ns.revoked = ctx.height;
    ns.transfer = 0;
    ns.transfer_version = 0;
    ns.transfer_hash = Vec::new();
    ns.data = Vec::new();
    ns.owner = Outpoint::NULL;
    session.update(ns);
    Ok(burned)
}

fn check_claim(
    output: &Output,
    proof: &[u8],
    outpoint: Outpoint,
    session: &mut NameSession<'_>,
    ctx: &RuleContext<'_>,
) -> Result<Flows, ChainError> {
    let action = CovenantType::Claim;
    let covenant = &output.covenant;
    let name_hash = covenant.name_hash().ok_or(CovenantError::BadItems { action })?;

    // The covenant commits to the exact proof bytes; a proof swapped in
    // transit changes the commitment and invalidates the coinbase.
    let commitment = covenant
        .item_hash(1)
        .ok_or(CovenantError::BadItems { action })?;
    if blake2b256(proof) != commitment {
        return Err(CovenantError::ClaimInvalid("proof commitment mismatch".into()).into());
    }

    let commit_height = covenant
        .item_u32(2)
        .ok_or(CovenantError::BadItems { action })?;
    if commit_height > ctx.height {
        return Err(CovenantError::ClaimInvalid("proof commits to the future".into()).into());
    }

    let data = ctx.registry.verify_claim(&name_hash, proof, commit_height)?;
    if sha3_256(&data.name) != name_hash {
        return Err(CovenantError::ClaimInvalid("attested name does not hash to key".into()).into());
    }

    let fee = covenant
        .item_u64(3)
        .ok_or(CovenantError::BadItems { action })?;
    if fee > data.value {
        return Err(CovenantError::ClaimInvalid("fee exceeds attested value".into()).into());
    }
    expect_value(action, data.value - fee, output.value)?;

    if let Some(existing) = session.get(&name_hash) {
        if !existing.can_reopen(ctx.height, ctx.params) {
            return Err(CovenantError::DuplicateOpen.into());
        }
    }

    let mut ns = NameState::claim(data.name, name_hash, ctx.height, data.weak);
    ns.owner = outpoint;
    ns.value = output.value;
    ns.highest = output.value;
    session.update(ns);

    Ok(Flows {
        burned: 0,
        conjured: data.value,
    })
}

fn check_airdrop(
    output: &Output,
    proof: &[u8],
    ctx: &RuleContext<'_>,
) -> Result<Flows, ChainError> {
    let data = ctx.airdrops.verify_airdrop(proof)?;
    expect_value(CovenantType::None, data.value - data.fee, output.value)?;
    let target = Address::new(data.address_version, data.address_hash.clone());
    if output.address != target {
        return Err(
            CovenantError::ClaimInvalid("airdrop pays the wrong address".into()).into(),
        );
    }
    Ok(Flows {
        burned: 0,
        conjured: data.value,
    })
}
