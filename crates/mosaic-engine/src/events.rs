//! Minimal publish/subscribe base used by the block core.

use std::sync::mpsc::{Receiver, Sender, channel};

/// Multi-subscriber event fan-out.
///
/// Subscribers poll their receiver (`try_recv`) whenever convenient; events
/// are cloned per subscriber. Dropped receivers are pruned on the next emit.
pub struct Emitter<E: Clone> {
    senders: Vec<Sender<E>>,
}

impl<E: Clone> Emitter<E> {
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<E> {
        let (tx, rx) = channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, event: E) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}

impl<E: Clone> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}
