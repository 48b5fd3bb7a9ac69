// Path: crates/chain/src/coinview.rs
//! The coin view: a session-scoped cache over the persistent coin set.
//!
//! Each block gets a fresh view. Spends and insertions accumulate in the
//! session; nothing reaches the backing store until the connector flushes
//! the whole block atomically. Throwing the view away is the error path —
//! the store never sees a partial block.

use ahash::AHashMap;
use nomen_types::error::{ChainError, ContextualError};
use nomen_types::primitives::{Coin, Outpoint, Transaction};
use std::collections::BTreeSet;

/// Persistent storage for the coin set.
pub trait CoinStore {
    fn get_coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, ChainError>;

    /// Atomically remove `spent` and insert `created`.
    fn apply(
        &mut self,
        spent: &[(Outpoint, Coin)],
        created: &[(Outpoint, Coin)],
    ) -> Result<(), ChainError>;

    /// Outpoints paying an address hash, if the index is maintained.
    fn by_address(&self, address_hash: &[u8]) -> Option<Vec<Outpoint>>;
}

/// In-memory coin set with an optional address index.
#[derive(Debug, Default)]
pub struct MemoryCoinStore {
    coins: AHashMap<Outpoint, Coin>,
    address_index: Option<AHashMap<Vec<u8>, BTreeSet<Outpoint>>>,
}

impl MemoryCoinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the wallet-facing address index.
    pub fn with_address_index() -> Self {
        Self {
            coins: AHashMap::new(),
            address_index: Some(AHashMap::new()),
        }
    }

    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }

    /// Total value of the unspent set; the chain-state audit hook.
    pub fn total_value(&self) -> u64 {
        self.coins.values().map(|c| c.output.value).sum()
    }

    fn index_insert(&mut self, outpoint: Outpoint, coin: &Coin) {
        if let Some(index) = self.address_index.as_mut() {
            index
                .entry(coin.output.address.hash.clone())
                .or_default()
                .insert(outpoint);
        }
    }

    fn index_remove(&mut self, outpoint: &Outpoint, coin: &Coin) {
        if let Some(index) = self.address_index.as_mut() {
            if let Some(set) = index.get_mut(&coin.output.address.hash) {
                set.remove(outpoint);
                if set.is_empty() {
                    index.remove(&coin.output.address.hash);
                }
            }
        }
    }
}

impl CoinStore for MemoryCoinStore {
    fn get_coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, ChainError> {
        Ok(self.coins.get(outpoint).cloned())
    }

    fn apply(
        &mut self,
        spent: &[(Outpoint, Coin)],
        created: &[(Outpoint, Coin)],
    ) -> Result<(), ChainError> {
        for (outpoint, coin) in spent {
            self.coins.remove(outpoint);
            self.index_remove(outpoint, coin);
        }
        for (outpoint, coin) in created {
            self.coins.insert(*outpoint, coin.clone());
            self.index_insert(*outpoint, coin);
        }
        Ok(())
    }

    fn by_address(&self, address_hash: &[u8]) -> Option<Vec<Outpoint>> {
        self.address_index
            .as_ref()
            .map(|index| {
                index
                    .get(address_hash)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default()
            })
    }
}

/// One block's working view over a [`CoinStore`].
#[derive(Debug)]
pub struct CoinView<'a, S: CoinStore> {
    store: &'a S,
    /// Session knowledge: `Some` = live coin, `None` = spent here.
    cache: AHashMap<Outpoint, Option<Coin>>,
    /// Coins spent this session, in spend order, with their prior state.
    spent: Vec<(Outpoint, Coin)>,
    /// Coins created this session, in creation order.
    created: Vec<(Outpoint, Coin)>,
}

impl<'a, S: CoinStore> CoinView<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            cache: AHashMap::new(),
            spent: Vec::new(),
            created: Vec::new(),
        }
    }

    /// Fetch a coin, session first, store on miss.
    pub fn get(&mut self, outpoint: &Outpoint) -> Result<Option<Coin>, ChainError> {
        if let Some(known) = self.cache.get(outpoint) {
            return Ok(known.clone());
        }
        let fetched = self.store.get_coin(outpoint)?;
        self.cache.insert(*outpoint, fetched.clone());
        Ok(fetched)
    }

    /// Spend a coin: returns it and records the undo entry. Spending a
    /// missing coin and spending twice are distinct failures.
    pub fn spend(&mut self, outpoint: &Outpoint) -> Result<Coin, ChainError> {
        let known = match self.cache.get(outpoint) {
            Some(Some(coin)) => Some(coin.clone()),
            Some(None) => {
                return Err(ContextualError::DoubleSpend(*outpoint).into());
            }
            None => self.store.get_coin(outpoint)?,
        };
        let coin = known.ok_or(ContextualError::MissingPrevout(*outpoint))?;
        self.cache.insert(*outpoint, None);
        self.spent.push((*outpoint, coin.clone()));
        Ok(coin)
    }

    /// Insert a transaction's outputs at `height`. Unspendable (nulldata)
    /// outputs are pruned and never enter the set.
    pub fn add_tx(&mut self, tx: &Transaction, height: u32) {
        let txid = tx.txid();
        let coinbase = tx.is_coinbase();
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.is_unspendable() {
                continue;
            }
            let outpoint = Outpoint::new(txid, index as u32);
            let coin = Coin::new(output.clone(), height as i32, coinbase);
            self.cache.insert(outpoint, Some(coin.clone()));
            self.created.push((outpoint, coin));
        }
    }

    /// Coins spent this session, in spend order.
    pub fn spent(&self) -> &[(Outpoint, Coin)] {
        &self.spent
    }

    /// Tear the session into its deltas for the atomic flush. Coins both
    /// created and spent within the session (intra-block chains) cancel
    /// out of both lists: they were never persisted and must not appear in
    /// the undo record either.
    pub fn into_deltas(self) -> (Vec<(Outpoint, Coin)>, Vec<(Outpoint, Coin)>) {
        let session_spent: std::collections::HashSet<Outpoint> =
            self.spent.iter().map(|(op, _)| *op).collect();
        let session_created: std::collections::HashSet<Outpoint> =
            self.created.iter().map(|(op, _)| *op).collect();
        let created: Vec<(Outpoint, Coin)> = self
            .created
            .into_iter()
            .filter(|(op, _)| !session_spent.contains(op))
            .collect();
        let spent: Vec<(Outpoint, Coin)> = self
            .spent
            .into_iter()
            .filter(|(op, _)| !session_created.contains(op))
            .collect();
        (spent, created)
    }
}
