// Path: crates/types/src/primitives/covenant.rs
//! Output covenants: the tagged constraints that couple a coin's
//! spendability to a name-state transition.
//!
//! A covenant is a type tag plus an ordered list of opaque byte items. The
//! codec treats items as opaque; per-type item counts and sizes are fixed
//! here in one table so the context-free sanity pass and the state machine
//! agree on the shapes they accept.

use crate::encoding::{
    varint_size, write_varint, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};
use crate::hash::{Hash, HASH_SIZE};
use crate::name::MAX_NAME_SIZE;

/// Upper bound on items in any covenant.
pub const MAX_COVENANT_ITEMS: usize = 8;
/// Upper bound on a single covenant item's size. Sized for resource data.
pub const MAX_COVENANT_ITEM_SIZE: usize = 512;

/// The twelve covenant actions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum CovenantType {
    /// A plain coin with no name linkage.
    None = 0,
    /// Coinbase-only insertion of a reserved name.
    Claim = 1,
    /// Opens an auction for a name.
    Open = 2,
    /// A sealed bid with a locked-up value.
    Bid = 3,
    /// Reveals a bid's true value.
    Reveal = 4,
    /// Refunds a losing reveal.
    Redeem = 5,
    /// First registration by the auction winner.
    Register = 6,
    /// Replaces a registered name's resource data.
    Update = 7,
    /// Pushes the renewal clock forward.
    Renew = 8,
    /// Starts a transfer to a new address.
    Transfer = 9,
    /// Completes a matured transfer.
    Finalize = 10,
    /// Irrevocably gives the name up.
    Revoke = 11,
}

impl CovenantType {
    /// Decode a type tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::None,
            1 => Self::Claim,
            2 => Self::Open,
            3 => Self::Bid,
            4 => Self::Reveal,
            5 => Self::Redeem,
            6 => Self::Register,
            7 => Self::Update,
            8 => Self::Renew,
            9 => Self::Transfer,
            10 => Self::Finalize,
            11 => Self::Revoke,
            _ => return None,
        })
    }

    /// The fixed item shapes for this covenant type, in item order.
    pub fn item_rules(&self) -> &'static [ItemRule] {
        use ItemRule::*;
        match self {
            Self::None => &[],
            // name_hash, commitment to the ownership proof, commit height, fee
            Self::Claim => &[Fixed(HASH_SIZE), Fixed(HASH_SIZE), Fixed(4), Fixed(8)],
            // name_hash, open height (always zero on the wire), raw name
            Self::Open => &[Fixed(HASH_SIZE), Fixed(4), Ranged(1, MAX_NAME_SIZE)],
            // name_hash, auction open height, blind
            Self::Bid => &[Fixed(HASH_SIZE), Fixed(4), Fixed(HASH_SIZE)],
            // name_hash, nonce
            Self::Reveal => &[Fixed(HASH_SIZE), Fixed(HASH_SIZE)],
            // name_hash
            Self::Redeem => &[Fixed(HASH_SIZE)],
            // name_hash, resource data
            Self::Register => &[Fixed(HASH_SIZE), Ranged(0, MAX_COVENANT_ITEM_SIZE)],
            // name_hash, resource data
            Self::Update => &[Fixed(HASH_SIZE), Ranged(0, MAX_COVENANT_ITEM_SIZE)],
            // name_hash, recent main-chain block hash
            Self::Renew => &[Fixed(HASH_SIZE), Fixed(HASH_SIZE)],
            // name_hash, target address version, target address hash
            Self::Transfer => &[Fixed(HASH_SIZE), Fixed(1), Ranged(2, 40)],
            // name_hash, raw name, flags, claim height, renewal count, block hash
            Self::Finalize => &[
                Fixed(HASH_SIZE),
                Ranged(1, MAX_NAME_SIZE),
                Fixed(1),
                Fixed(4),
                Fixed(4),
                Fixed(HASH_SIZE),
            ],
            // name_hash
            Self::Revoke => &[Fixed(HASH_SIZE)],
        }
    }

    /// Whether this covenant links its coin to a name.
    pub fn is_name(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether a coin carrying this covenant makes its holder the name
    /// owner. These are the only covenants an owner outpoint may reference.
    pub fn is_ownership(&self) -> bool {
        matches!(
            self,
            Self::Register | Self::Update | Self::Renew | Self::Transfer | Self::Finalize
        )
    }
}

/// Size constraint for one covenant item.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ItemRule {
    /// Exactly this many bytes.
    Fixed(usize),
    /// An inclusive size range.
    Ranged(usize, usize),
}

impl ItemRule {
    /// Whether `len` satisfies the rule.
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            Self::Fixed(n) => len == n,
            Self::Ranged(lo, hi) => len >= lo && len <= hi,
        }
    }
}

/// A covenant attached to an output.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Covenant {
    /// The action tag.
    pub covenant_type: CovenantType,
    /// Ordered opaque items; item 0 is the name hash for every non-NONE type.
    pub items: Vec<Vec<u8>>,
}

impl Covenant {
    pub fn new(covenant_type: CovenantType, items: Vec<Vec<u8>>) -> Self {
        Self {
            covenant_type,
            items,
        }
    }

    /// The no-op covenant carried by plain coins.
    pub fn none() -> Self {
        Self::new(CovenantType::None, Vec::new())
    }

    /// The name hash in item 0, if this covenant names one and the item has
    /// hash shape. Shape violations are caught by [`Covenant::check_sanity`].
    pub fn name_hash(&self) -> Option<Hash> {
        if !self.covenant_type.is_name() {
            return None;
        }
        Hash::from_slice(self.items.first()?)
    }

    /// Whether this covenant links to a name.
    pub fn is_name(&self) -> bool {
        self.covenant_type.is_name()
    }

    /// Context-free shape check: item count and per-item sizes against the
    /// type's rule table.
    pub fn check_sanity(&self) -> Result<(), CovenantShapeError> {
        let rules = self.covenant_type.item_rules();
        if self.items.len() != rules.len() {
            return Err(CovenantShapeError::ItemCount {
                covenant_type: self.covenant_type,
                expected: rules.len(),
                found: self.items.len(),
            });
        }
        for (index, (item, rule)) in self.items.iter().zip(rules).enumerate() {
            if !rule.accepts(item.len()) {
                return Err(CovenantShapeError::ItemSize {
                    covenant_type: self.covenant_type,
                    index,
                    size: item.len(),
                });
            }
        }
        Ok(())
    }

    /// Decode item `index` as a little-endian u32. Callers check shape first.
    pub fn item_u32(&self, index: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.items.get(index)?.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Decode item `index` as a little-endian u64.
    pub fn item_u64(&self, index: usize) -> Option<u64> {
        let bytes: [u8; 8] = self.items.get(index)?.as_slice().try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    /// Decode item `index` as a hash.
    pub fn item_hash(&self, index: usize) -> Option<Hash> {
        Hash::from_slice(self.items.get(index)?)
    }
}

/// A covenant whose items do not fit its type's table.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CovenantShapeError {
    #[error("{covenant_type:?} covenant carries {found} items, expected {expected}")]
    ItemCount {
        covenant_type: CovenantType,
        expected: usize,
        found: usize,
    },
    #[error("{covenant_type:?} covenant item {index} has invalid size {size}")]
    ItemSize {
        covenant_type: CovenantType,
        index: usize,
        size: usize,
    },
}

impl Encodable for Covenant {
    fn encoded_size(&self) -> usize {
        let mut size = 1 + varint_size(self.items.len() as u64);
        for item in &self.items {
            size += varint_size(item.len() as u64) + item.len();
        }
        size
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.push(self.covenant_type as u8);
        write_varint(w, self.items.len() as u64);
        for item in &self.items {
            write_varint(w, item.len() as u64);
            w.extend_from_slice(item);
        }
    }
}

impl Decodable for Covenant {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let tag_offset = r.offset();
        let tag = r.read_u8()?;
        let covenant_type = CovenantType::from_u8(tag).ok_or(DecodeError {
            kind: DecodeKind::BadTag,
            offset: tag_offset,
        })?;
        let count_offset = r.offset();
        let count = r.read_varint()?;
        if count > MAX_COVENANT_ITEMS as u64 {
            return Err(DecodeError {
                kind: DecodeKind::Oversized,
                offset: count_offset,
            });
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(r.read_var_bytes(MAX_COVENANT_ITEM_SIZE)?);
        }
        Ok(Self {
            covenant_type,
            items,
        })
    }
}
