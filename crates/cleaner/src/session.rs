//! Page Session Management
//!
//! This is the high-level API a host embeds: one session per loaded page.
//! Owns the shared document, the event bus and the watchdogs, and turns page
//! lifecycle hooks (idle, pushState, popstate) into events.

use dom::{Document, Result as DomResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CleanerConfig;
use crate::error::Result;
use crate::events::{EventBus, NavigationKind, PageEvent};
use crate::scheduler::{lock, RescanScheduler, SharedDocument};
use crate::watchdog::{Watchdog, WatchdogManager};

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: String,
    pub url: String,
    pub cleaner: CleanerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            url: "https://rutube.ru/".to_string(),
            cleaner: CleanerConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Page Session - one document and everything watching it
pub struct PageSession {
    pub config: SessionConfig,
    pub event_bus: EventBus,

    document: SharedDocument,
    scheduler: RescanScheduler,

    /// Same-document navigations, in order
    history: Mutex<Vec<String>>,
    ready: AtomicBool,
    attached: AtomicBool,

    watchdog_manager: Arc<RwLock<WatchdogManager>>,
}

impl PageSession {
    /// Build a session around an already loaded document
    ///
    /// Fails only when the cleaner configuration does not compile.
    pub fn new(config: SessionConfig, mut document: Document) -> Result<Self> {
        config.cleaner.validate()?;
        let scheduler = RescanScheduler::new(&config.cleaner)?;
        document.set_url(config.url.clone());

        let mut watchdog_manager = WatchdogManager::new();
        watchdog_manager.register(Arc::new(scheduler.clone()));

        Ok(Self {
            config,
            event_bus: EventBus::new(),
            document: Arc::new(Mutex::new(document)),
            scheduler,
            history: Mutex::new(Vec::new()),
            ready: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            watchdog_manager: Arc::new(RwLock::new(watchdog_manager)),
        })
    }

    /// Add a watchdog next to the scheduler; call before `start`
    pub async fn register(&self, watchdog: Arc<dyn Watchdog>) {
        self.watchdog_manager.write().await.register(watchdog);
    }

    /// Attach the watchdogs, unless the page is not one we clean
    pub async fn start(&self) -> Result<()> {
        if !self.config.cleaner.applies_to(&self.config.url) {
            tracing::info!(
                "[PageSession] {} is not a matched host, cleaner stays off",
                self.config.url
            );
            return Ok(());
        }

        self.watchdog_manager
            .read()
            .await
            .attach_all(self.document.clone())
            .await?;
        self.attached.store(true, Ordering::SeqCst);
        tracing::info!(
            "[PageSession] RUTUBE cleaner active on {} (session {})",
            self.config.url,
            self.config.id
        );

        self.emit(PageEvent::Started).await;
        Ok(())
    }

    /// The page went idle; the first call wins
    pub async fn ready(&self) {
        if self.ready.swap(true, Ordering::SeqCst) {
            return;
        }
        self.emit(PageEvent::Idle).await;
    }

    pub async fn push_state(&self, url: impl Into<String>) {
        self.navigate(url.into(), NavigationKind::Push).await;
    }

    pub async fn pop_state(&self, url: impl Into<String>) {
        self.navigate(url.into(), NavigationKind::Pop).await;
    }

    async fn navigate(&self, url: String, kind: NavigationKind) {
        lock(&self.document).set_url(url.clone());
        lock(&self.history).push(url.clone());
        self.emit(PageEvent::Navigated { url, kind }).await;
    }

    /// Edit the page the way its own scripts would
    ///
    /// Observers fire while `f` runs; the document stays locked until it
    /// returns, so `f` must not call back into the session.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> DomResult<T>) -> Result<T> {
        let mut doc = lock(&self.document);
        Ok(f(&mut *doc)?)
    }

    pub fn document(&self) -> SharedDocument {
        self.document.clone()
    }

    pub fn scheduler(&self) -> &RescanScheduler {
        &self.scheduler
    }

    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn sweep_count(&self) -> usize {
        self.scheduler.sweep_count()
    }

    pub async fn stop(&self) -> Result<()> {
        if self.attached.swap(false, Ordering::SeqCst) {
            self.watchdog_manager.read().await.detach_all().await?;
        }
        self.emit(PageEvent::Stopped).await;
        Ok(())
    }

    // Publish event and dispatch to watchdogs
    async fn emit(&self, event: PageEvent) {
        let event = Arc::new(event);
        self.event_bus.publish((*event).clone());
        if self.is_attached() {
            self.watchdog_manager.read().await.dispatch(event).await;
        }
    }
}
