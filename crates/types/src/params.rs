// Path: crates/types/src/params.rs
//! Network parameters.
//!
//! Every consensus knob is carried explicitly in a `NetworkParams` value and
//! passed into the validators; nothing reads ambient global state. The
//! serde derives exist for operator-facing config files only — parameters
//! never travel on the consensus wire.

use serde::{Deserialize, Serialize};

/// Which chain these parameters describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Testnet,
    Regtest,
}

/// Consensus parameters for one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Which chain this is.
    pub network: Network,

    // Name-auction clocks, in blocks.
    /// Cadence of authenticated-tree commits; also the OPEN phase length.
    #[serde(default = "default_tree_interval")]
    pub tree_interval: u32,
    /// Length of the sealed-bid window.
    #[serde(default = "default_bidding_period")]
    pub bidding_period: u32,
    /// Length of the reveal window.
    #[serde(default = "default_reveal_period")]
    pub reveal_period: u32,
    /// Blocks a registered name stays alive without a RENEW.
    #[serde(default = "default_renewal_window")]
    pub renewal_window: u32,
    /// Confirmations a TRANSFER must age before FINALIZE.
    #[serde(default = "default_transfer_lockup")]
    pub transfer_lockup: u32,
    /// Blocks after expiry/revocation before a name can be re-opened.
    #[serde(default = "default_auction_maturity")]
    pub auction_maturity: u32,
    /// Blocks per name-availability rollout bucket; zero disables rollout.
    #[serde(default = "default_rollout_interval")]
    pub rollout_interval: u32,
    /// Blocks a claimed reserved name stays locked before acting as closed.
    #[serde(default = "default_lockup_period")]
    pub lockup_period: u32,
    /// Maximum depth of the main-chain block a RENEW may reference.
    #[serde(default = "default_renewal_maturity")]
    pub renewal_maturity: u32,

    // Per-block aggregate caps.
    #[serde(default = "default_max_block_opens")]
    pub max_block_opens: usize,
    #[serde(default = "default_max_block_updates")]
    pub max_block_updates: usize,
    #[serde(default = "default_max_block_renewals")]
    pub max_block_renewals: usize,

    // Ledger limits.
    /// Blocks a coinbase output must age before it can be spent.
    #[serde(default = "default_coinbase_maturity")]
    pub coinbase_maturity: u32,
    #[serde(default = "default_max_tx_size")]
    pub max_tx_size: usize,
    #[serde(default = "default_max_tx_weight")]
    pub max_tx_weight: usize,
    #[serde(default = "default_max_block_weight")]
    pub max_block_weight: usize,
    #[serde(default = "default_max_block_sigops")]
    pub max_block_sigops: usize,
    /// Largest representable amount, in base units.
    #[serde(default = "default_max_money")]
    pub max_money: u64,
    /// Coinbase subsidy before halvings.
    #[serde(default = "default_base_reward")]
    pub base_reward: u64,
    /// Blocks between subsidy halvings.
    #[serde(default = "default_halving_interval")]
    pub halving_interval: u32,
    /// Weight units charged per non-witness byte.
    #[serde(default = "default_witness_scale_factor")]
    pub witness_scale_factor: usize,
    /// Largest resource record a REGISTER/UPDATE may carry.
    #[serde(default = "default_max_resource_size")]
    pub max_resource_size: usize,
    /// Committed tree roots retained for historical proofs and reorgs.
    #[serde(default = "default_root_retention")]
    pub root_retention: usize,
}

impl NetworkParams {
    /// Mainnet parameters.
    pub fn mainnet() -> Self {
        Self {
            network: Network::Main,
            tree_interval: default_tree_interval(),
            bidding_period: default_bidding_period(),
            reveal_period: default_reveal_period(),
            renewal_window: default_renewal_window(),
            transfer_lockup: default_transfer_lockup(),
            auction_maturity: default_auction_maturity(),
            rollout_interval: default_rollout_interval(),
            lockup_period: default_lockup_period(),
            renewal_maturity: default_renewal_maturity(),
            max_block_opens: default_max_block_opens(),
            max_block_updates: default_max_block_updates(),
            max_block_renewals: default_max_block_renewals(),
            coinbase_maturity: default_coinbase_maturity(),
            max_tx_size: default_max_tx_size(),
            max_tx_weight: default_max_tx_weight(),
            max_block_weight: default_max_block_weight(),
            max_block_sigops: default_max_block_sigops(),
            max_money: default_max_money(),
            base_reward: default_base_reward(),
            halving_interval: default_halving_interval(),
            witness_scale_factor: default_witness_scale_factor(),
            max_resource_size: default_max_resource_size(),
            root_retention: default_root_retention(),
        }
    }

    /// Short-clock parameters for tests and local development.
    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            tree_interval: 5,
            bidding_period: 5,
            reveal_period: 10,
            renewal_window: 200,
            transfer_lockup: 10,
            auction_maturity: 20,
            rollout_interval: 0,
            lockup_period: 30,
            renewal_maturity: 20,
            coinbase_maturity: 2,
            ..Self::mainnet()
        }
    }

    /// Coinbase subsidy at `height`: `base_reward` halved every
    /// `halving_interval` blocks, zero once shifted away.
    pub fn subsidy(&self, height: u32) -> u64 {
        let halvings = height / self.halving_interval;
        if halvings >= 64 {
            return 0;
        }
        self.base_reward >> halvings
    }
}

fn default_tree_interval() -> u32 {
    36
}
fn default_bidding_period() -> u32 {
    720
}
fn default_reveal_period() -> u32 {
    1_440
}
fn default_renewal_window() -> u32 {
    105_120
}
fn default_transfer_lockup() -> u32 {
    288
}
fn default_auction_maturity() -> u32 {
    2_196
}
fn default_rollout_interval() -> u32 {
    1_008
}
fn default_lockup_period() -> u32 {
    4_320
}
fn default_renewal_maturity() -> u32 {
    4_320
}
fn default_max_block_opens() -> usize {
    600
}
fn default_max_block_updates() -> usize {
    600
}
fn default_max_block_renewals() -> usize {
    600
}
fn default_coinbase_maturity() -> u32 {
    100
}
fn default_max_tx_size() -> usize {
    1_000_000
}
fn default_max_tx_weight() -> usize {
    400_000
}
fn default_max_block_weight() -> usize {
    4_000_000
}
fn default_max_block_sigops() -> usize {
    80_000
}
fn default_max_money() -> u64 {
    2_040_000_000_000_000
}
fn default_base_reward() -> u64 {
    2_000_000_000
}
fn default_halving_interval() -> u32 {
    170_000
}
fn default_witness_scale_factor() -> usize {
    4
}
fn default_max_resource_size() -> usize {
    512
}
fn default_root_retention() -> usize {
    96
}
