//! Watchdog System - components that react to page events
//!
//! Philosophy:
//! - Composition > Inheritance
//! - No reflection magic
//! - Zero-cost event dispatch

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::events::PageEvent;
use crate::scheduler::SharedDocument;

/// Watchdog trait - watches the page and reacts to events
///
/// **Linus says**: "Good data structures eliminate special cases."
#[async_trait]
pub trait Watchdog: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Handle page event
    ///
    /// This is called for EVERY event. Watchdog decides what to care about.
    async fn on_event(&self, event: &PageEvent);

    /// Optional: Called when watchdog is first attached
    ///
    /// The watchdog receives the shared document and may register a mutation
    /// observer on it. Observers run with the document locked; they must not
    /// lock it again.
    ///
    /// # Example
    /// ```ignore
    /// async fn on_attach(&self, document: SharedDocument) -> Result<()> {
    ///     let seen = self.seen.clone();
    ///     lock(&document).observe(Arc::new(move |record| {
    ///         seen.fetch_add(record.added.len(), Ordering::SeqCst);
    ///     }));
    ///     Ok(())
    /// }
    /// ```
    async fn on_attach(&self, document: SharedDocument) -> Result<()> {
        let _ = document; // Suppress unused warning for default impl
        Ok(())
    }

    /// Optional: Called when watchdog is detached (session stop)
    async fn on_detach(&self) -> Result<()> {
        Ok(())
    }
}

/// Watchdog manager - dispatches events to all watchdogs
pub struct WatchdogManager {
    watchdogs: Vec<Arc<dyn Watchdog>>,
}

impl WatchdogManager {
    pub fn new() -> Self {
        Self {
            watchdogs: Vec::new(),
        }
    }

    /// Add a watchdog
    pub fn register(&mut self, watchdog: Arc<dyn Watchdog>) {
        tracing::debug!("Registered watchdog: {}", watchdog.name());
        self.watchdogs.push(watchdog);
    }

    pub fn len(&self) -> usize {
        self.watchdogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchdogs.is_empty()
    }

    /// Attach all watchdogs
    pub async fn attach_all(&self, document: SharedDocument) -> Result<()> {
        for watchdog in &self.watchdogs {
            watchdog.on_attach(document.clone()).await?;
        }
        Ok(())
    }

    /// Detach all watchdogs
    pub async fn detach_all(&self) -> Result<()> {
        for watchdog in &self.watchdogs {
            watchdog.on_detach().await?;
        }
        Ok(())
    }

    /// Dispatch event to all watchdogs concurrently
    pub async fn dispatch(&self, event: Arc<PageEvent>) {
        use futures_util::future::join_all;

        let tasks: Vec<_> = self
            .watchdogs
            .iter()
            .map(|w| {
                let event = event.clone();
                async move {
                    w.on_event(&event).await;
                }
            })
            .collect();

        join_all(tasks).await;
    }
}

impl Default for WatchdogManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::lock;
    use dom::{Document, Fragment, MutationRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TestWatchdog {
        name: String,
        event_count: Arc<AtomicUsize>,
        added_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Watchdog for TestWatchdog {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_event(&self, _event: &PageEvent) {
            self.event_count.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_attach(&self, document: SharedDocument) -> Result<()> {
            let added = self.added_count.clone();
            lock(&document).observe(Arc::new(move |record: &MutationRecord| {
                added.fetch_add(record.added.len(), Ordering::SeqCst);
            }));
            Ok(())
        }
    }

    fn watchdog(name: &str, events: &Arc<AtomicUsize>, added: &Arc<AtomicUsize>) -> Arc<dyn Watchdog> {
        Arc::new(TestWatchdog {
            name: name.to_string(),
            event_count: events.clone(),
            added_count: added.clone(),
        })
    }

    #[tokio::test]
    async fn test_watchdog_dispatch() {
        let events = Arc::new(AtomicUsize::new(0));
        let added = Arc::new(AtomicUsize::new(0));
        let mut manager = WatchdogManager::new();

        manager.register(watchdog("test1", &events, &added));
        manager.register(watchdog("test2", &events, &added));
        assert_eq!(manager.len(), 2);

        let event = Arc::new(PageEvent::Started);
        manager.dispatch(event).await;

        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attach_registers_observers() {
        let events = Arc::new(AtomicUsize::new(0));
        let added = Arc::new(AtomicUsize::new(0));
        let mut manager = WatchdogManager::new();
        manager.register(watchdog("test", &events, &added));

        let document: SharedDocument = Arc::new(Mutex::new(Document::new("https://rutube.ru/")));
        manager.attach_all(document.clone()).await.unwrap();

        {
            let mut doc = lock(&document);
            let body = doc.body().unwrap();
            doc.append(body, &Fragment::element("div")).unwrap();
        }
        assert_eq!(added.load(Ordering::SeqCst), 1);
        manager.detach_all().await.unwrap();
    }
}
