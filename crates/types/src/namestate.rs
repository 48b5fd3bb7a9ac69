// Path: crates/types/src/namestate.rs
//! Per-name auction state.
//!
//! One `NameState` exists per name hash. It records the auction clock (open
//! height), the Vickrey outcome (`highest` observed reveal and the `value`
//! actually owed), the owning outpoint, the current resource data, and the
//! transfer/revocation/claim markers. The phase of a name is never stored;
//! it is derived from the open height and the querying height, so state
//! snapshots stay valid across blocks.

use crate::encoding::{
    var_bytes_size, write_var_bytes, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};
use crate::hash::Hash;
use crate::name::MAX_NAME_SIZE;
use crate::params::NetworkParams;
use crate::primitives::{Covenant, Outpoint};

/// Logical stage of a name's lifecycle at some height.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NamePhase {
    /// Auction announced; bids not yet accepted.
    Opening,
    /// Sealed bids accepted.
    Bidding,
    /// Bids being revealed.
    Reveal,
    /// Auction settled; the name is owned and serviceable.
    Closed,
    /// Reserved-name claim maturing; no transfers yet.
    Locked,
    /// Revoked by its owner. Sticky until re-opened.
    Revoked,
    /// Renewal lapsed or auction ended without a winner; re-openable.
    Expired,
}

/// Derived clock facts handed to the RPC/DNS surface.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NameStats {
    pub phase: NamePhase,
    pub open_period_end: u32,
    pub bidding_period_end: u32,
    pub reveal_period_end: u32,
    pub renewal_expiry: u32,
    /// Blocks until the renewal window closes; zero once expired.
    pub blocks_until_expire: u32,
}

/// The consensus record for one name.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NameState {
    /// Canonical label bytes.
    pub name: Vec<u8>,
    /// SHA3-256 of `name`; the tree key.
    pub name_hash: Hash,
    /// Height of the first OPEN for the current auction cycle.
    pub height: u32,
    /// Height of the last renewal event (REGISTER, RENEW, claim).
    pub renewal: u32,
    /// Outpoint of the coin that owns this name; null while unowned.
    pub owner: Outpoint,
    /// Amount owed under Vickrey pricing: the second-highest reveal, or the
    /// only reveal's value when there was exactly one.
    pub value: u64,
    /// Highest revealed value observed.
    pub highest: u64,
    /// Current resource record bytes served by DNS.
    pub data: Vec<u8>,
    /// Height a TRANSFER was initiated, zero if none pending.
    pub transfer: u32,
    /// Witness program version of the pending transfer target.
    pub transfer_version: u8,
    /// Witness program hash of the pending transfer target; empty if none.
    pub transfer_hash: Vec<u8>,
    /// Height of revocation, zero if never revoked.
    pub revoked: u32,
    /// Height a reserved-name claim landed, zero for auctioned names.
    pub claimed: u32,
    /// Claim carried a non-DNSSEC ownership proof.
    pub weak: bool,
    /// Witness txid of the tx holding the winning reveal; breaks reveal
    /// ties deterministically. Zero until the first reveal.
    pub tiebreak: Hash,
}

impl NameState {
    /// Fresh state for an auction opened at `height`.
    pub fn open(name: Vec<u8>, name_hash: Hash, height: u32) -> Self {
        Self {
            name,
            name_hash,
            height,
            renewal: height,
            owner: Outpoint::NULL,
            value: 0,
            highest: 0,
            data: Vec::new(),
            transfer: 0,
            transfer_version: 0,
            transfer_hash: Vec::new(),
            revoked: 0,
            claimed: 0,
            weak: false,
            tiebreak: Hash::ZERO,
        }
    }

    /// Fresh state for a reserved name claimed at `height`.
    pub fn claim(name: Vec<u8>, name_hash: Hash, height: u32, weak: bool) -> Self {
        Self {
            claimed: height,
            weak,
            ..Self::open(name, name_hash, height)
        }
    }

    pub fn open_period_end(&self, params: &NetworkParams) -> u32 {
        self.height + params.tree_interval
    }

    pub fn bidding_period_end(&self, params: &NetworkParams) -> u32 {
        self.open_period_end(params) + params.bidding_period
    }

    pub fn reveal_period_end(&self, params: &NetworkParams) -> u32 {
        self.bidding_period_end(params) + params.reveal_period
    }

    /// Height at which the renewal window shuts.
    pub fn renewal_expiry(&self, params: &NetworkParams) -> u32 {
        self.renewal + params.renewal_window
    }

    /// Whether some coin owns this name.
    pub fn is_owned(&self) -> bool {
        !self.owner.is_null()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked > 0
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed > 0
    }

    /// Whether a transfer is pending.
    pub fn in_transfer(&self) -> bool {
        self.transfer > 0
    }

    /// Whether the name has lapsed at `height`: the renewal window ran out,
    /// or the auction ended with no winner. Revoked names are not expired;
    /// revocation is its own sticky phase.
    pub fn is_expired(&self, height: u32, params: &NetworkParams) -> bool {
        if self.is_revoked() {
            return false;
        }
        if self.is_claimed() {
            return height > self.renewal_expiry(params);
        }
        if !self.is_owned() {
            // Nobody revealed; the cycle dies when the reveal window shuts.
            return height >= self.reveal_period_end(params);
        }
        height > self.renewal_expiry(params)
    }

    /// Derive the phase at `height`.
    pub fn phase(&self, height: u32, params: &NetworkParams) -> NamePhase {
        if self.is_revoked() {
            return NamePhase::Revoked;
        }
        if self.is_claimed() {
            if height < self.claimed + params.lockup_period {
                return NamePhase::Locked;
            }
            return if self.is_expired(height, params) {
                NamePhase::Expired
            } else {
                NamePhase::Closed
            };
        }
        if height < self.open_period_end(params) {
            return NamePhase::Opening;
        }
        if height < self.bidding_period_end(params) {
            return NamePhase::Bidding;
        }
        if height < self.reveal_period_end(params) {
            return NamePhase::Reveal;
        }
        if self.is_expired(height, params) {
            return NamePhase::Expired;
        }
        NamePhase::Closed
    }

    /// Whether a fresh OPEN may replace this state at `height`.
    ///
    /// Expired names re-open immediately; revoked names only after
    /// `auction_maturity` blocks have passed since revocation.
    pub fn can_reopen(&self, height: u32, params: &NetworkParams) -> bool {
        if self.is_revoked() {
            return height >= self.revoked + params.auction_maturity;
        }
        self.is_expired(height, params)
    }

    /// Fold one reveal into the Vickrey outcome. Returns `true` when the
    /// reveal takes (or keeps) the lead.
    ///
    /// `wtxid` is the witness txid of the revealing transaction; on a value
    /// tie the smaller `(wtxid, output index)` wins.
    pub fn apply_reveal(&mut self, value: u64, outpoint: Outpoint, wtxid: Hash) -> bool {
        if !self.is_owned() {
            // First reveal: first-price fallback until a second arrives.
            self.highest = value;
            self.value = value;
            self.owner = outpoint;
            self.tiebreak = wtxid;
            return true;
        }
        if value > self.highest {
            // New leader; the old leader's amount becomes the price.
            self.value = self.highest;
            self.highest = value;
            self.owner = outpoint;
            self.tiebreak = wtxid;
            return true;
        }
        if value == self.highest {
            // Price is pinned at the tied value either way.
            self.value = value;
            let challenger = (wtxid, outpoint.index);
            let incumbent = (self.tiebreak, self.owner.index);
            if challenger < incumbent {
                self.owner = outpoint;
                self.tiebreak = wtxid;
                return true;
            }
            return false;
        }
        // A losing reveal can still raise the second price. While only one
        // reveal has landed, `value` is the first-price placeholder and is
        // replaced outright.
        if self.value == self.highest {
            self.value = value;
        } else {
            self.value = self.value.max(value);
        }
        false
    }

    /// Derived clock facts at `height`.
    pub fn stats(&self, height: u32, params: &NetworkParams) -> NameStats {
        let expiry = self.renewal_expiry(params);
        NameStats {
            phase: self.phase(height, params),
            open_period_end: self.open_period_end(params),
            bidding_period_end: self.bidding_period_end(params),
            reveal_period_end: self.reveal_period_end(params),
            renewal_expiry: expiry,
            blocks_until_expire: expiry.saturating_sub(height),
        }
    }

    /// Invariant: any coin covenant linked to this name must carry our
    /// name hash in item 0.
    pub fn links(&self, covenant: &Covenant) -> bool {
        covenant.name_hash() == Some(self.name_hash)
    }
}

impl Encodable for NameState {
    fn encoded_size(&self) -> usize {
        var_bytes_size(&self.name)
            + 32
            + 4
            + 4
            + self.owner.encoded_size()
            + 8
            + 8
            + var_bytes_size(&self.data)
            + 4
            + 1
            + var_bytes_size(&self.transfer_hash)
            + 4
            + 4
            + 1
            + 32
    }

    fn write(&self, w: &mut Vec<u8>) {
        write_var_bytes(w, &self.name);
        w.extend_from_slice(self.name_hash.as_bytes());
        w.extend_from_slice(&self.height.to_le_bytes());
        w.extend_from_slice(&self.renewal.to_le_bytes());
        self.owner.write(w);
        w.extend_from_slice(&self.value.to_le_bytes());
        w.extend_from_slice(&self.highest.to_le_bytes());
        write_var_bytes(w, &self.data);
        w.extend_from_slice(&self.transfer.to_le_bytes());
        w.push(self.transfer_version);
        write_var_bytes(w, &self.transfer_hash);
        w.extend_from_slice(&self.revoked.to_le_bytes());
        w.extend_from_slice(&self.claimed.to_le_bytes());
        w.push(self.weak as u8);
        w.extend_from_slice(self.tiebreak.as_bytes());
    }
}

impl Decodable for NameState {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let name = r.read_var_bytes(MAX_NAME_SIZE)?;
        let name_hash = r.read_hash()?;
        let height = r.read_u32()?;
        let renewal = r.read_u32()?;
        let owner = Outpoint::read(r)?;
        let value = r.read_u64()?;
        let highest = r.read_u64()?;
        let data = r.read_var_bytes(crate::primitives::MAX_COVENANT_ITEM_SIZE)?;
        let transfer = r.read_u32()?;
        let transfer_version = r.read_u8()?;
        let transfer_hash = r.read_var_bytes(crate::primitives::MAX_ADDRESS_HASH_SIZE)?;
        let revoked = r.read_u32()?;
        let claimed = r.read_u32()?;
        let flag_offset = r.offset();
        let weak = match r.read_u8()? {
            0 => false,
            1 => true,
            _ => {
                return Err(DecodeError {
                    kind: DecodeKind::ValueOutOfRange,
                    offset: flag_offset,
                })
            }
        };
        let tiebreak = r.read_hash()?;
        Ok(Self {
            name,
            name_hash,
            height,
            renewal,
            owner,
            value,
            highest,
            data,
            transfer,
            transfer_version,
            transfer_hash,
            revoked,
            claimed,
            weak,
            tiebreak,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{blake2b256, sha3_256};

    fn state() -> NameState {
        NameState::open(b"alpha".to_vec(), sha3_256(b"alpha"), 100)
    }

    fn params() -> NetworkParams {
        NetworkParams::regtest()
    }

    fn reveal_at(tag: &[u8], index: u32) -> (Outpoint, Hash) {
        (Outpoint::new(blake2b256(tag), index), blake2b256(tag))
    }

    #[test]
    fn phases_follow_the_clock() {
        let params = params();
        let ns = state();
        // regtest: open 5, bidding 5, reveal 10
        assert_eq!(ns.phase(100, &params), NamePhase::Opening);
        assert_eq!(ns.phase(104, &params), NamePhase::Opening);
        assert_eq!(ns.phase(105, &params), NamePhase::Bidding);
        assert_eq!(ns.phase(109, &params), NamePhase::Bidding);
        assert_eq!(ns.phase(110, &params), NamePhase::Reveal);
        assert_eq!(ns.phase(119, &params), NamePhase::Reveal);
        // Nobody revealed, so the cycle expires when the window shuts.
        assert_eq!(ns.phase(120, &params), NamePhase::Expired);
    }

    #[test]
    fn owned_name_closes_then_expires() {
        let params = params();
        let mut ns = state();
        let (op, wtxid) = reveal_at(b"r1", 0);
        assert!(ns.apply_reveal(1_000, op, wtxid));
        ns.renewal = 120;
        assert_eq!(ns.phase(120, &params), NamePhase::Closed);
        assert_eq!(ns.phase(120 + params.renewal_window, &params), NamePhase::Closed);
        assert_eq!(
            ns.phase(121 + params.renewal_window, &params),
            NamePhase::Expired
        );
    }

    #[test]
    fn revoked_is_sticky_and_gated() {
        let params = params();
        let mut ns = state();
        ns.revoked = 130;
        assert_eq!(ns.phase(10_000, &params), NamePhase::Revoked);
        assert!(!ns.can_reopen(130 + params.auction_maturity - 1, &params));
        assert!(ns.can_reopen(130 + params.auction_maturity, &params));
    }

    #[test]
    fn vickrey_single_reveal_pays_first_price() {
        let mut ns = state();
        let (op, wtxid) = reveal_at(b"only", 0);
        assert!(ns.apply_reveal(1_000, op, wtxid));
        assert_eq!(ns.value, 1_000);
        assert_eq!(ns.highest, 1_000);
        assert_eq!(ns.owner, op);
    }

    #[test]
    fn vickrey_two_reveals_pay_second_price() {
        for order in [[1_000u64, 1_200u64], [1_200, 1_000]] {
            let mut ns = state();
            let (lo_op, lo_w) = reveal_at(b"lo", 0);
            let (hi_op, hi_w) = reveal_at(b"hi", 0);
            for &v in &order {
                let (op, w) = if v == 1_200 {
                    (hi_op, hi_w)
                } else {
                    (lo_op, lo_w)
                };
                ns.apply_reveal(v, op, w);
            }
            assert_eq!(ns.owner, hi_op, "order {order:?}");
            assert_eq!(ns.highest, 1_200);
            assert_eq!(ns.value, 1_000);
        }
    }

    #[test]
    fn losing_reveal_raises_second_price() {
        let mut ns = state();
        let (a, aw) = reveal_at(b"a", 0);
        let (b, bw) = reveal_at(b"b", 0);
        let (c, cw) = reveal_at(b"c", 0);
        ns.apply_reveal(1_200, a, aw);
        ns.apply_reveal(800, b, bw);
        assert_eq!(ns.value, 800);
        ns.apply_reveal(1_000, c, cw);
        assert_eq!(ns.value, 1_000);
        assert_eq!(ns.highest, 1_200);
        assert_eq!(ns.owner, a);
    }

    #[test]
    fn tie_prefers_smaller_wtxid_then_index() {
        let (a, a_w) = reveal_at(b"tie-a", 0);
        let (b, b_w) = reveal_at(b"tie-b", 0);
        let ((lo, lo_w), (hi, hi_w)) = if a_w < b_w {
            ((a, a_w), (b, b_w))
        } else {
            ((b, b_w), (a, a_w))
        };
        let mut ns = state();
        ns.apply_reveal(1_000, hi, hi_w);
        assert!(ns.apply_reveal(1_000, lo, lo_w));
        assert_eq!(ns.owner, lo);
        assert_eq!(ns.value, 1_000);

        // Arrival order must not matter.
        let mut ns = state();
        ns.apply_reveal(1_000, lo, lo_w);
        assert!(!ns.apply_reveal(1_000, hi, hi_w));
        assert_eq!(ns.owner, lo);

        // Same tx, two tied reveals: the smaller index wins.
        let mut ns = state();
        let w = blake2b256(b"tx");
        assert!(ns.apply_reveal(500, Outpoint::new(blake2b256(b"tx"), 1), w));
        assert!(ns.apply_reveal(500, Outpoint::new(blake2b256(b"tx"), 0), w));
        assert_eq!(ns.owner.index, 0);
    }

    #[test]
    fn roundtrip() {
        let mut ns = state();
        let (op, w) = reveal_at(b"r", 3);
        ns.apply_reveal(42, op, w);
        ns.data = vec![0xde, 0xad];
        ns.transfer = 7;
        let bytes = ns.encode();
        assert_eq!(bytes.len(), ns.encoded_size());
        assert_eq!(NameState::decode(&bytes).unwrap(), ns);
    }
}
