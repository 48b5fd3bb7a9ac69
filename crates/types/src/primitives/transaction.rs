// Path: crates/types/src/primitives/transaction.rs
//! Transactions and coins.
//!
//! A transaction's identity (`txid`) covers only its non-witness encoding;
//! witness data trails the non-witness portion on the wire so the two can be
//! hashed independently. A `Transaction` value is immutable once built —
//! anything that needs to assemble one incrementally does so with plain
//! field construction and hands out the finished value.

use crate::encoding::{
    varint_size, write_varint, Decodable, DecodeError, DecodeKind, Encodable, SliceReader,
};
use crate::hash::{blake2b256, blake2b256_pair, Hash};
use crate::primitives::{Address, Covenant, Outpoint};

/// Upper bound on a single witness item, sized for claim/airdrop envelopes.
pub const MAX_WITNESS_ITEM_SIZE: usize = 10_000;
/// Upper bound on witness items per input.
pub const MAX_WITNESS_ITEMS: usize = 256;

/// A transaction input: the coin it spends plus its witness stack.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Input {
    /// The output being spent.
    pub prevout: Outpoint,
    /// Witness stack items. Carried out-of-line on the wire.
    pub witness: Vec<Vec<u8>>,
    /// Relative-lock sequence field.
    pub sequence: u32,
}

impl Input {
    pub fn new(prevout: Outpoint) -> Self {
        Self {
            prevout,
            witness: Vec::new(),
            sequence: u32::MAX,
        }
    }
}

/// A transaction output: a value paid to an address under a covenant.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Output {
    /// Amount in base units.
    pub value: u64,
    /// The receiving witness program.
    pub address: Address,
    /// The name constraint attached to this output.
    pub covenant: Covenant,
}

impl Output {
    pub fn new(value: u64, address: Address, covenant: Covenant) -> Self {
        Self {
            value,
            address,
            covenant,
        }
    }

    /// A plain payment with no covenant.
    pub fn plain(value: u64, address: Address) -> Self {
        Self::new(value, address, Covenant::none())
    }

    /// Whether this output can never be spent and is pruned from the view.
    pub fn is_unspendable(&self) -> bool {
        self.address.is_unspendable()
    }
}

impl Encodable for Output {
    fn encoded_size(&self) -> usize {
        8 + self.address.encoded_size() + self.covenant.encoded_size()
    }

    fn write(&self, w: &mut Vec<u8>) {
        w.extend_from_slice(&self.value.to_le_bytes());
        self.address.write(w);
        self.covenant.write(w);
    }
}

impl Decodable for Output {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let value = r.read_u64()?;
        let address = Address::read(r)?;
        let covenant = Covenant::read(r)?;
        Ok(Self {
            value,
            address,
            covenant,
        })
    }
}

/// An unspent output held by the coin view, with its creation context.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Coin {
    /// The output itself.
    pub output: Output,
    /// Height of the block that created it; `-1` while unconfirmed.
    pub height: i32,
    /// Whether it came from a coinbase (maturity applies).
    pub coinbase: bool,
}

impl Coin {
    pub fn new(output: Output, height: i32, coinbase: bool) -> Self {
        Self {
            output,
            height,
            coinbase,
        }
    }

    /// Blocks elapsed since the coin was created, as of `height`. Zero for
    /// unconfirmed coins and for the creating block itself.
    pub fn age(&self, height: u32) -> u32 {
        if self.height < 0 {
            return 0;
        }
        height.saturating_sub(self.height as u32)
    }
}

impl Encodable for Coin {
    fn encoded_size(&self) -> usize {
        self.output.encoded_size() + 4 + 1
    }

    fn write(&self, w: &mut Vec<u8>) {
        self.output.write(w);
        w.extend_from_slice(&self.height.to_le_bytes());
        w.push(self.coinbase as u8);
    }
}

impl Decodable for Coin {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let output = Output::read(r)?;
        let height = r.read_u32()? as i32;
        let flag_offset = r.offset();
        let coinbase = match r.read_u8()? {
            0 => false,
            1 => true,
            _ => {
                return Err(DecodeError {
                    kind: DecodeKind::ValueOutOfRange,
                    offset: flag_offset,
                })
            }
        };
        Ok(Self {
            output,
            height,
            coinbase,
        })
    }
}

/// An immutable transaction.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

impl Transaction {
    /// Whether this is the block-reward transaction. Identified by a null
    /// prevout on the first input.
    pub fn is_coinbase(&self) -> bool {
        self.inputs
            .first()
            .is_some_and(|input| input.prevout.is_null())
    }

    /// Write the non-witness portion: `version || inputs || outputs ||
    /// locktime`. This is the preimage of [`Transaction::txid`].
    pub fn write_base(&self, w: &mut Vec<u8>) {
        w.extend_from_slice(&self.version.to_le_bytes());
        write_varint(w, self.inputs.len() as u64);
        for input in &self.inputs {
            input.prevout.write(w);
            w.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(w, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(w);
        }
        w.extend_from_slice(&self.locktime.to_le_bytes());
    }

    /// Write the trailing witness data: per input, the item list.
    pub fn write_witness(&self, w: &mut Vec<u8>) {
        for input in &self.inputs {
            write_varint(w, input.witness.len() as u64);
            for item in &input.witness {
                write_varint(w, item.len() as u64);
                w.extend_from_slice(item);
            }
        }
    }

    /// Size of the non-witness encoding.
    pub fn base_size(&self) -> usize {
        let mut size = 4 + varint_size(self.inputs.len() as u64);
        size += self.inputs.len() * (36 + 4);
        size += varint_size(self.outputs.len() as u64);
        for output in &self.outputs {
            size += output.encoded_size();
        }
        size + 4
    }

    /// Size of the trailing witness data.
    pub fn witness_size(&self) -> usize {
        let mut size = 0;
        for input in &self.inputs {
            size += varint_size(input.witness.len() as u64);
            for item in &input.witness {
                size += varint_size(item.len() as u64) + item.len();
            }
        }
        size
    }

    /// Full wire size.
    pub fn total_size(&self) -> usize {
        self.base_size() + self.witness_size()
    }

    /// Scaled size: witness bytes cost one unit, base bytes
    /// `witness_scale_factor` units.
    pub fn weight(&self, witness_scale_factor: usize) -> usize {
        self.base_size() * (witness_scale_factor - 1) + self.total_size()
    }

    /// Transaction identity: BLAKE2b-256 of the non-witness encoding.
    pub fn txid(&self) -> Hash {
        let mut w = Vec::with_capacity(self.base_size());
        self.write_base(&mut w);
        blake2b256(&w)
    }

    /// Witness identity: folds the witness digest into the txid.
    pub fn wtxid(&self) -> Hash {
        let mut w = Vec::with_capacity(self.witness_size());
        self.write_witness(&mut w);
        blake2b256_pair(&self.txid(), &blake2b256(&w))
    }

    /// Sum of output values, saturating; range checks live in the
    /// context-free pass.
    pub fn output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.value))
    }
}

impl Encodable for Transaction {
    fn encoded_size(&self) -> usize {
        self.total_size()
    }

    fn write(&self, w: &mut Vec<u8>) {
        self.write_base(w);
        self.write_witness(w);
    }
}

impl Decodable for Transaction {
    fn read(r: &mut SliceReader<'_>) -> Result<Self, DecodeError> {
        let version = r.read_u32()?;

        let count_offset = r.offset();
        let n_inputs = r.read_varint()?;
        if n_inputs > u32::MAX as u64 {
            return Err(DecodeError {
                kind: DecodeKind::Oversized,
                offset: count_offset,
            });
        }
        let mut inputs = Vec::with_capacity(n_inputs.min(1024) as usize);
        for _ in 0..n_inputs {
            let prevout = Outpoint::read(r)?;
            let sequence = r.read_u32()?;
            inputs.push(Input {
                prevout,
                witness: Vec::new(),
                sequence,
            });
        }

        let count_offset = r.offset();
        let n_outputs = r.read_varint()?;
        if n_outputs > u32::MAX as u64 {
            return Err(DecodeError {
                kind: DecodeKind::Oversized,
                offset: count_offset,
            });
        }
        let mut outputs = Vec::with_capacity(n_outputs.min(1024) as usize);
        for _ in 0..n_outputs {
            outputs.push(Output::read(r)?);
        }

        let locktime = r.read_u32()?;

        // Witness data trails the base encoding, one stack per input.
        for input in &mut inputs {
            let count_offset = r.offset();
            let n_items = r.read_varint()?;
            if n_items > MAX_WITNESS_ITEMS as u64 {
                return Err(DecodeError {
                    kind: DecodeKind::Oversized,
                    offset: count_offset,
                });
            }
            let mut witness = Vec::with_capacity(n_items as usize);
            for _ in 0..n_items {
                witness.push(r.read_var_bytes(MAX_WITNESS_ITEM_SIZE)?);
            }
            input.witness = witness;
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            locktime,
        })
    }
}
