// Path: crates/chain/src/session.rs
//! Block-scoped name-state session.
//!
//! All name mutations a block produces are staged here, layered over the
//! committed map. The first touch of any name records its prior state for
//! the undo record. Dropping the session is the failure path; merging it
//! is the last step of a successful connect.

use ahash::AHashMap;
use nomen_types::namestate::NameState;
use nomen_types::Hash;
use std::collections::HashMap;

/// Mutable overlay over the chain's name-state map for one block.
#[derive(Debug)]
pub(crate) struct NameSession<'a> {
    base: &'a AHashMap<Hash, NameState>,
    pending: HashMap<Hash, NameState>,
    /// Prior state per touched name, in first-touch order. `None` means
    /// the name had no state before this block.
    priors: Vec<(Hash, Option<NameState>)>,
}

impl<'a> NameSession<'a> {
    pub(crate) fn new(base: &'a AHashMap<Hash, NameState>) -> Self {
        Self {
            base,
            pending: HashMap::new(),
            priors: Vec::new(),
        }
    }

    /// Current view of a name: this block's mutations first, then the
    /// committed map.
    pub(crate) fn get(&self, name_hash: &Hash) -> Option<&NameState> {
        self.pending
            .get(name_hash)
            .or_else(|| self.base.get(name_hash))
    }

    /// Stage a new state for a name, recording its prior on first touch.
    pub(crate) fn update(&mut self, ns: NameState) {
        let hash = ns.name_hash;
        if !self.pending.contains_key(&hash) {
            self.priors.push((hash, self.base.get(&hash).cloned()));
        }
        self.pending.insert(hash, ns);
    }

    /// Tear into (mutations, priors). Priors keep first-touch order;
    /// mutations are sorted by hash for deterministic downstream encoding.
    pub(crate) fn into_parts(self) -> (Vec<(Hash, NameState)>, Vec<(Hash, Option<NameState>)>) {
        let mut changed: Vec<(Hash, NameState)> = self.pending.into_iter().collect();
        changed.sort_by_key(|(hash, _)| *hash);
        (changed, self.priors)
    }

    pub(crate) fn touched(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomen_types::hash::sha3_256;

    #[test]
    fn prior_is_recorded_once() {
        let mut base = AHashMap::new();
        let hash = sha3_256(b"alpha");
        let original = NameState::open(b"alpha".to_vec(), hash, 5);
        base.insert(hash, original.clone());

        let mut session = NameSession::new(&base);
        let mut first = original.clone();
        first.renewal = 10;
        session.update(first);
        let mut second = session.get(&hash).unwrap().clone();
        second.renewal = 20;
        session.update(second.clone());

        assert_eq!(session.get(&hash), Some(&second));
        let (changed, priors) = session.into_parts();
        assert_eq!(changed.len(), 1);
        assert_eq!(priors, vec![(hash, Some(original))]);
    }

    #[test]
    fn fresh_name_has_no_prior() {
        let base = AHashMap::new();
        let hash = sha3_256(b"beta");
        let mut session = NameSession::new(&base);
        session.update(NameState::open(b"beta".to_vec(), hash, 1));
        let (_, priors) = session.into_parts();
        assert_eq!(priors, vec![(hash, None)]);
    }
}
