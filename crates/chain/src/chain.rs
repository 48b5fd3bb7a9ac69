// Path: crates/chain/src/chain.rs
//! The block connector.
//!
//! Single-writer: the `Chain` owns the coin store, the name-state map and
//! the name tree, and only `connect`/`disconnect_tip`/`reorganize` mutate
//! them. A block is validated entirely into session state (coin view, name
//! session, counters); nothing persistent changes until every check has
//! passed, and the atomic flush at the end either lands completely or not
//! at all. The one parallel region is script verification, which is pure
//! per input and joins before the flush.

use crate::contextual;
use crate::coinview::{CoinStore, CoinView};
use crate::events::{ChainEvent, EventDispatcher};
use crate::rules::{BlockCounters, RuleContext};
use crate::session::NameSession;
use crate::undo::UndoBlock;
use crate::verify::{AirdropVerifier, ReservedRegistry, ScriptVerifier};
use ahash::AHashMap;
use nomen_state::{NameTree, TreeProof, TreeStore};
use nomen_types::encoding::{Decodable, DecodeError, Encodable, SliceReader};
use nomen_types::error::ChainError;
use nomen_types::namestate::{NameState, NameStats};
use nomen_types::params::NetworkParams;
use nomen_types::primitives::{Block, Outpoint};
use nomen_types::Hash;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

/// Aggregate ledger counters, updated transactionally with every block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainStateTuple {
    /// Transactions ever connected.
    pub total_tx: u64,
    /// Live coins in the unspent set.
    pub total_coin: u64,
    /// Total value of the unspent set.
    pub total_value: u64,
    /// Value destroyed by covenant rules.
    pub total_burned: u64,
}

impl Encodable for ChainStateTuple {
    fn encoded_size(&self) -> usize {
        8 * 4
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.extend_from_slice(&self.total_tx.to_le_bytes());
        w.extend_from_slice(&self.total_coin.to_le_bytes());
        w.extend_from_slice(&self.total_value.to_le_bytes());
        w.extend_from_slice(&self.total_burned.to_le_bytes());
    }
}

impl Decodable for ChainStateTuple {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            total_tx: r.read_u64()?,
            total_coin: r.read_u64()?,
            total_value: r.read_u64()?,
            total_burned: r.read_u64()?,
        })
    }
}

/// Sliding window of recent main-chain block hashes, newest last. RENEW
/// covenants prove freshness by referencing a block inside this window.
#[derive(Debug, Default)]
pub struct RecentBlocks {
    hashes: VecDeque<Hash>,
    capacity: usize,
}

impl RecentBlocks {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, hash: Hash) {
        self.hashes.push_back(hash);
        while self.hashes.len() > self.capacity {
            self.hashes.pop_front();
        }
    }

    fn pop(&mut self) {
        self.hashes.pop_back();
    }

    /// Whether `hash` is a main-chain block within `max_depth` of the tip
    /// (the tip itself is depth 1).
    pub fn contains(&self, hash: &Hash, max_depth: u32) -> bool {
        self.hashes
            .iter()
            .rev()
            .take(max_depth as usize)
            .any(|h| h == hash)
    }
}

/// The consensus state machine at the chain tip.
pub struct Chain<C: CoinStore, T: TreeStore> {
    params: NetworkParams,
    coins: C,
    tree: NameTree<T>,
    names: AHashMap<Hash, NameState>,
    state: ChainStateTuple,
    /// Number of connected blocks; the next block's height.
    block_count: u32,
    tip_hash: Hash,
    undo_stack: Vec<UndoBlock>,
    recent: RecentBlocks,
    events: EventDispatcher,
    scripts: Box<dyn ScriptVerifier + Send + Sync>,
    registry: Box<dyn ReservedRegistry + Send + Sync>,
    airdrops: Box<dyn AirdropVerifier + Send + Sync>,
}

impl<C: CoinStore, T: TreeStore> std::fmt::Debug for Chain<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("height", &self.height())
            .field("tip", &self.tip_hash)
            .field("names", &self.names.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<C: CoinStore, T: TreeStore> Chain<C, T> {
    pub fn new(
        params: NetworkParams,
        coins: C,
        tree_store: T,
        scripts: Box<dyn ScriptVerifier + Send + Sync>,
        registry: Box<dyn ReservedRegistry + Send + Sync>,
        airdrops: Box<dyn AirdropVerifier + Send + Sync>,
    ) -> Result<Self, ChainError> {
        let tree = NameTree::open(tree_store, params.root_retention)?;
        let recent_capacity = params.renewal_maturity as usize + 16;
        Ok(Self {
            params,
            coins,
            tree,
            names: AHashMap::new(),
            state: ChainStateTuple::default(),
            block_count: 0,
            tip_hash: Hash::ZERO,
            undo_stack: Vec::new(),
            recent: RecentBlocks::new(recent_capacity),
            events: EventDispatcher::new(),
            scripts,
            registry,
            airdrops,
        })
    }

    /// Height of the tip; `None` before the first block.
    pub fn height(&self) -> Option<u32> {
        self.block_count.checked_sub(1)
    }

    pub fn tip(&self) -> Hash {
        self.tip_hash
    }

    pub fn chain_state(&self) -> ChainStateTuple {
        self.state
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// The last committed tree root.
    pub fn tree_root(&self) -> Hash {
        self.tree.root()
    }

    /// Current state of a name, post any connected block.
    pub fn name(&self, name_hash: &Hash) -> Option<&NameState> {
        self.names.get(name_hash)
    }

    /// Derived clock facts for a name at the next block height.
    pub fn name_stats(&self, name_hash: &Hash) -> Option<NameStats> {
        self.names
            .get(name_hash)
            .map(|ns| ns.stats(self.block_count, &self.params))
    }

    /// Membership/absence proof against the current or a retained root.
    /// This is the surface the DNS server serves from.
    pub fn tree_proof(&mut self, name_hash: &Hash, at_root: &Hash) -> Result<TreeProof, ChainError> {
        Ok(self.tree.prove(name_hash, at_root)?)
    }

    /// Wallet-facing address lookup, when the store maintains the index.
    pub fn coins_by_address(&self, address_hash: &[u8]) -> Option<Vec<Outpoint>> {
        self.coins.by_address(address_hash)
    }

    /// Attach an event subscriber.
    pub fn subscribe(&mut self) -> Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Validate `block` against the tip and advance. On any error all
    /// session state is discarded and the persistent stores are untouched.
    pub fn connect(&mut self, block: &Block) -> Result<(), ChainError> {
        let height = self.block_count;
        let block_hash = block.hash();

        if block.header.prev_block != self.tip_hash {
            return Err(ChainError::Orphan {
                expected: self.tip_hash,
                found: block.header.prev_block,
            });
        }

        nomen_tx::check_block_sanity(block, &self.params)?;

        // Undo snapshot, taken before anything can change.
        let prior_state = self.state;
        let prior_root = self.tree.root();
        let staged_before = self.tree.staging();

        // Session state: all mutations land here until the flush.
        let mut view = CoinView::new(&self.coins);
        let mut session = NameSession::new(&self.names);
        let mut counters = BlockCounters::default();
        let ctx = RuleContext {
            height,
            params: &self.params,
            registry: self.registry.as_ref(),
            airdrops: self.airdrops.as_ref(),
            recent: &self.recent,
        };

        let coinbase = &block.transactions[0];
        let mut fees: u64 = 0;
        let mut conjured: u64 = 0;
        let mut burned: u64 = 0;

        let cb_flows = contextual::check_coinbase(coinbase, &mut view, &mut session, &ctx)?;
        conjured += cb_flows.conjured;
        burned += cb_flows.burned;

        // Declared order matters: outputs of earlier transactions are
        // spendable by later ones within the block.
        let mut script_jobs = Vec::with_capacity(block.transactions.len().saturating_sub(1));
        for (tx_index, tx) in block.transactions.iter().enumerate().skip(1) {
            let (flows, coins) = contextual::check_transaction(
                tx,
                &mut view,
                &mut session,
                &mut counters,
                self.scripts.as_ref(),
                &ctx,
            )?;
            fees = fees
                .checked_add(flows.fee)
                .ok_or(ChainError::Internal("fee overflow".into()))?;
            conjured += flows.conjured;
            burned += flows.burned;
            script_jobs.push((tx_index, coins));
        }

        // The miner may claim subsidy, fees, and the value minted by
        // claim/airdrop envelopes, nothing more.
        let allowed = self
            .params
            .subsidy(height)
            .checked_add(fees)
            .and_then(|v| v.checked_add(conjured))
            .ok_or(ChainError::Internal("coinbase allowance overflow".into()))?;
        let claimed = coinbase.output_value();
        if claimed > allowed {
            return Err(ChainError::BadCoinbaseValue { claimed, allowed });
        }

        // Parallel region: pure per-input script checks, joined here.
        script_jobs
            .par_iter()
            .try_for_each(|(tx_index, coins)| {
                let tx = &block.transactions[*tx_index];
                coins
                    .iter()
                    .enumerate()
                    .try_for_each(|(input, coin)| self.scripts.verify(tx, input, coin))
            })
            .map_err(ChainError::from)?;

        // Stage the block's name effects into the tree overlay.
        let (changed, priors) = session.into_parts();
        let stage_result: Result<(), ChainError> = (|| {
            for (hash, ns) in &changed {
                self.tree.stage_insert(*hash, ns.encode())?;
            }
            Ok(())
        })();

        // Commit the tree on interval boundaries; the header commits to
        // the root that covers this height either way.
        let mut committed = false;
        let tree_result: Result<(), ChainError> = stage_result.and_then(|()| {
            if height % self.params.tree_interval == 0 {
                self.tree.commit()?;
                committed = true;
            }
            let expected = self.tree.root();
            if block.header.tree_root != expected {
                return Err(ChainError::BadTreeRoot {
                    header: block.header.tree_root,
                    computed: expected,
                });
            }
            Ok(())
        });
        if let Err(err) = tree_result {
            // Roll the tree back to its pre-block position; everything
            // else was still session-local.
            if committed {
                self.tree.inject(prior_root)?;
            }
            self.tree.restore_staging(staged_before);
            return Err(err);
        }

        // Atomic flush: coins, names, undo, counters, tip.
        let (spent, created) = view.into_deltas();
        self.coins.apply(&spent, &created)?;
        for (hash, ns) in &changed {
            self.names.insert(*hash, ns.clone());
        }

        let spent_value: u64 = spent.iter().map(|(_, c)| c.output.value).sum();
        let created_value: u64 = created.iter().map(|(_, c)| c.output.value).sum();
        self.state.total_tx += block.transactions.len() as u64;
        self.state.total_coin =
            self.state.total_coin + created.len() as u64 - spent.len() as u64;
        self.state.total_value = self.state.total_value + created_value - spent_value;
        self.state.total_burned += burned;

        self.undo_stack.push(UndoBlock {
            block_hash,
            prev_block: block.header.prev_block,
            spent,
            created,
            names: priors,
            staged: staged_before,
            tree_root: prior_root,
            tree_committed: committed,
            chain_state: prior_state,
        });

        self.recent.push(block_hash);
        self.block_count += 1;
        self.tip_hash = block_hash;

        tracing::info!(
            height,
            hash = %block_hash,
            txs = block.transactions.len(),
            fees,
            burned,
            "connected block"
        );
        if committed {
            self.events.emit(ChainEvent::TreeCommit {
                height,
                root: self.tree.root(),
            });
        }
        self.events.emit(ChainEvent::Connect {
            height,
            hash: block_hash,
            tx_count: block.transactions.len(),
        });

        Ok(())
    }

    /// Reverse the tip block from its undo record. Restores coin set,
    /// name states, tree position and chain counters byte-exactly.
    pub fn disconnect_tip(&mut self) -> Result<Hash, ChainError> {
        let undo = self
            .undo_stack
            .pop()
            .ok_or_else(|| ChainError::Internal("no undo data for tip".into()))?;
        let height = self.block_count - 1;

        // Mirror of the connect flush: drop what it created, reinstate
        // what it spent.
        self.coins.apply(&undo.created, &undo.spent)?;

        for (hash, prior) in &undo.names {
            match prior {
                Some(ns) => {
                    self.names.insert(*hash, ns.clone());
                }
                None => {
                    self.names.remove(hash);
                }
            }
        }

        if undo.tree_committed {
            self.tree.inject(undo.tree_root)?;
        }
        self.tree.restore_staging(undo.staged);

        self.state = undo.chain_state;
        self.block_count = height;
        self.tip_hash = undo.prev_block;
        self.recent.pop();

        tracing::info!(height, hash = %undo.block_hash, "disconnected block");
        self.events.emit(ChainEvent::Disconnect {
            height,
            hash: undo.block_hash,
        });
        Ok(undo.block_hash)
    }

    /// Switch to a competing branch. Disconnects back to the fork point,
    /// then connects `branch` in order. Emits every disconnect before any
    /// connect, then one reorg summary.
    ///
    /// A branch that fails to connect leaves the chain at the point of
    /// failure; the host decides whether to replay the losing side.
    pub fn reorganize(&mut self, branch: &[Block]) -> Result<(), ChainError> {
        let Some(first) = branch.first() else {
            return Ok(());
        };
        let old_tip = self.tip_hash;
        let fork_point = first.header.prev_block;

        while self.tip_hash != fork_point {
            if self.undo_stack.is_empty() {
                return Err(ChainError::Orphan {
                    expected: fork_point,
                    found: self.tip_hash,
                });
            }
            self.disconnect_tip()?;
        }

        for block in branch {
            self.connect(block)?;
        }

        tracing::info!(old_tip = %old_tip, new_tip = %self.tip_hash, "reorganized");
        self.events.emit(ChainEvent::Reorg {
            old_tip,
            new_tip: self.tip_hash,
        });
        Ok(())
    }
}
