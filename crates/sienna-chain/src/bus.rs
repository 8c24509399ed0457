//! In-process broadcast bus carrying decoded contract events.
//!
//! The source publishes, the projector (and anything else that cares)
//! subscribes. Slow subscribers lag and lose old events rather than block
//! the source; the projector re-reads from its persisted cursor on restart,
//! so a lagged gap heals on the next backfill.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use sienna_types::event::ChainEvent;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChainEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to all subscribers. A bus with no subscribers
    /// drops the event; that is fine, delivery is at-least-once from the
    /// chain, not from this bus.
    pub fn publish(&self, event: ChainEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.sender.subscribe()
    }

    /// Count of events published since startup.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
