//! Engine event fan-out.
//!
//! Composition instead of emitter inheritance: the engine holds an
//! [`EventBus`] with an explicit subscriber list over crossbeam channels.
//! Publishing clones the event to every live subscriber and silently drops
//! the ones that have gone away.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use gp_types::Alert;

/// Events visible to external subscribers (notification service, dashboard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    ServiceInitialized { vpp_count: usize },
    ServiceStopped { reason: String },
    RiskAlert(Alert),
}

/// Explicit observer list.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.write().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, pruning dead ones.
    pub fn publish(&self, event: EngineEvent) {
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
