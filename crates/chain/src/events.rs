// Path: crates/chain/src/events.rs
//! Typed chain events.
//!
//! Subscribers (DNS, wallet, mempool) attach a channel and receive exactly
//! one event per state advance. During a reorg every disconnect is
//! delivered before any connect, so a consumer that folds events always
//! sees a consistent lineage.

use nomen_types::Hash;
use std::sync::mpsc::{channel, Receiver, Sender};

/// An observable state change at the chain tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    /// A block was connected and the tip advanced.
    Connect {
        height: u32,
        hash: Hash,
        tx_count: usize,
    },
    /// A block was disconnected and the tip moved back.
    Disconnect { height: u32, hash: Hash },
    /// The name tree folded its overlay and published a new root.
    TreeCommit { height: u32, root: Hash },
    /// A reorganization completed.
    Reorg { old_tip: Hash, new_tip: Hash },
}

/// Fan-out of [`ChainEvent`]s to registered subscribers.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    subscribers: Vec<Sender<ChainEvent>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and hand back its receiving end.
    pub fn subscribe(&mut self) -> Receiver<ChainEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver one event to every live subscriber. Subscribers whose
    /// receiver is gone are dropped.
    pub fn emit(&mut self, event: ChainEvent) {
        self.subscribers
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_all_subscribers() {
        let mut dispatcher = EventDispatcher::new();
        let a = dispatcher.subscribe();
        let b = dispatcher.subscribe();
        let event = ChainEvent::Connect {
            height: 1,
            hash: Hash::ZERO,
            tx_count: 2,
        };
        dispatcher.emit(event.clone());
        assert_eq!(a.try_recv().unwrap(), event);
        assert_eq!(b.try_recv().unwrap(), event);
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let mut dispatcher = EventDispatcher::new();
        let rx = dispatcher.subscribe();
        drop(rx);
        dispatcher.emit(ChainEvent::Reorg {
            old_tip: Hash::ZERO,
            new_tip: Hash::ZERO,
        });
        assert_eq!(dispatcher.subscriber_count(), 0);
    }
}
