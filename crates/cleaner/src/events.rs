//! Event Bus - page lifecycle events
//!
//! Design: Type-safe events, one enum, broadcast to whoever listens.
//! No dynamic dispatch overhead - use enums, not trait objects.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// How a same-document navigation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationKind {
    /// `history.pushState`
    Push,
    /// Back / forward
    Pop,
}

/// Page events that can be dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageEvent {
    Started,
    Stopped,
    /// The page finished its initial load; fired once per session
    Idle,
    Navigated { url: String, kind: NavigationKind },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<PageEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: PageEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
