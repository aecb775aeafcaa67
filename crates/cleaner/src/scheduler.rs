//! Re-scan Scheduler - decides when the sweep runs
//!
//! Three triggers:
//! - startup: a fixed list of delays after the page goes idle
//! - mutations: debounced, a burst of changes yields one sweep
//! - navigation: one sweep after a settle delay
//!
//! Two rules keep it from fighting itself. A sweep never starts while
//! another is running (the `SweepState` flag, released by a drop guard).
//! Changes reported while a sweep runs are the sweep's own edits: they never
//! start an overlapping sweep, they only mark the document dirty, and a dirty
//! sweep queues one debounced follow-up once it has finished. A follow-up
//! that changes nothing reports nothing, so the chain ends there.

use async_trait::async_trait;
use dom::{Document, MutationRecord, ObserverId};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{CleanerConfig, TimingConfig};
use crate::error::Result;
use crate::events::PageEvent;
use crate::sweep::{Cleaner, SweepReport};
use crate::watchdog::Watchdog;

/// The page document, shared between the session, timers and observers
pub type SharedDocument = Arc<Mutex<Document>>;

/// Lock, recovering the data if a previous holder panicked
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Sweeping,
}

// Flips the state back to Idle on every exit path, unwinding included
struct SweepGuard<'a> {
    state: &'a Mutex<SweepState>,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = SweepState::Idle;
    }
}

/// The one debounced sweep that may be waiting
struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    document: Mutex<Option<SharedDocument>>,
    observer: Mutex<Option<ObserverId>>,
    cleaner: Mutex<Cleaner>,
    timing: TimingConfig,
    state: Mutex<SweepState>,
    pending: Mutex<Option<Pending>>,
    generation: AtomicU64,
    /// Startup and navigation timers
    timers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    /// Set by notifications that arrive mid-sweep
    dirty: AtomicBool,
    sweeps: AtomicUsize,
    debounce_requests: AtomicUsize,
    ignored: AtomicUsize,
}

/// Cheap to clone; all clones drive the same scheduler
#[derive(Clone)]
pub struct RescanScheduler {
    inner: Arc<Inner>,
}

impl RescanScheduler {
    pub fn new(config: &CleanerConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                document: Mutex::new(None),
                observer: Mutex::new(None),
                cleaner: Mutex::new(Cleaner::new(config)?),
                timing: config.timing.clone(),
                state: Mutex::new(SweepState::Idle),
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
                timers: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                dirty: AtomicBool::new(false),
                sweeps: AtomicUsize::new(0),
                debounce_requests: AtomicUsize::new(0),
                ignored: AtomicUsize::new(0),
            }),
        })
    }

    /// Start watching `document`; replaces any previous document
    pub fn attach(&self, document: SharedDocument) {
        self.detach();

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = lock(&document).observe(Arc::new(move |record: &MutationRecord| {
            if let Some(inner) = weak.upgrade() {
                inner.on_mutation(record);
            }
        }));
        *lock(&self.inner.observer) = Some(id);
        *lock(&self.inner.document) = Some(document);
    }

    /// Cancel every timer and stop watching the document
    pub fn detach(&self) {
        self.inner.cancel_timers();
        let document = lock(&self.inner.document).take();
        let observer = lock(&self.inner.observer).take();
        if let (Some(document), Some(id)) = (document, observer) {
            lock(&document).disconnect(id);
        }
    }

    /// Run a sweep right now
    ///
    /// `Ok(None)` when no document is attached or a sweep is already running.
    /// Must not be called while holding the document lock, except from
    /// inside a sweep where it returns `Ok(None)` straight away.
    pub fn sweep_now(&self) -> Result<Option<SweepReport>> {
        self.inner.sweep_now()
    }

    /// Sweeps at every configured startup delay; only the first call counts
    pub fn schedule_startup(&self) {
        self.inner.schedule_startup();
    }

    /// One sweep after the navigation settle delay
    pub fn schedule_navigation(&self) {
        self.inner
            .spawn_delayed(self.inner.timing.navigation_settle(), "Navigation");
    }

    /// (Re)start the mutation quiet period
    pub fn schedule_debounced(&self) {
        self.inner.schedule_debounced();
    }

    pub fn state(&self) -> SweepState {
        *lock(&self.inner.state)
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.inner.pending).is_some()
    }

    /// Sweep bodies that ran, successful or not
    pub fn sweep_count(&self) -> usize {
        self.inner.sweeps.load(Ordering::SeqCst)
    }

    pub fn debounce_requests(&self) -> usize {
        self.inner.debounce_requests.load(Ordering::SeqCst)
    }

    /// Notifications raised by the sweep's own edits
    pub fn ignored_notifications(&self) -> usize {
        self.inner.ignored.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn begin_sweep(&self) -> Option<SweepGuard<'_>> {
        let mut state = lock(&self.state);
        if *state == SweepState::Sweeping {
            return None;
        }
        *state = SweepState::Sweeping;
        Some(SweepGuard { state: &self.state })
    }

    fn sweep_now(self: &Arc<Self>) -> Result<Option<SweepReport>> {
        let document = match lock(&self.document).clone() {
            Some(document) => document,
            None => return Ok(None),
        };
        let result = {
            let _guard = match self.begin_sweep() {
                Some(guard) => guard,
                None => {
                    tracing::trace!("[RescanScheduler] Sweep already running, skipping");
                    return Ok(None);
                }
            };
            self.dirty.store(false, Ordering::SeqCst);

            let mut doc = lock(&document);
            let result = lock(&self.cleaner).sweep(&mut *doc);
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            result
        };

        // Guard and document are released; the follow-up starts from a clean slate
        if self.dirty.swap(false, Ordering::SeqCst) {
            tracing::trace!("[RescanScheduler] Sweep edited the page, queueing follow-up");
            self.schedule_debounced();
        }
        result.map(Some)
    }

    // Timer body: errors end here
    fn run_sweep(self: &Arc<Self>, reason: &str) {
        tracing::trace!("[RescanScheduler] {} sweep firing", reason);
        if let Err(e) = self.sweep_now() {
            tracing::warn!("[RescanScheduler] {} sweep failed: {}", reason, e);
        }
    }

    fn on_mutation(self: &Arc<Self>, record: &MutationRecord) {
        if record.added.is_empty() && record.removed.is_empty() {
            return;
        }
        if *lock(&self.state) == SweepState::Sweeping {
            self.ignored.fetch_add(1, Ordering::SeqCst);
            self.dirty.store(true, Ordering::SeqCst);
            return;
        }
        self.schedule_debounced();
    }

    fn schedule_debounced(self: &Arc<Self>) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("[RescanScheduler] No runtime, dropping debounce request");
                return;
            }
        };
        self.debounce_requests.fetch_add(1, Ordering::SeqCst);

        // Held across spawn so the task cannot clear the slot before it is filled
        let mut pending = lock(&self.pending);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(self);
        let delay = self.timing.debounce();
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.clear_pending(generation);
                inner.run_sweep("Debounced");
            }
        });

        if let Some(previous) = pending.replace(Pending {
            generation,
            handle: task,
        }) {
            previous.handle.abort();
        }
    }

    // A newer request may already own the slot
    fn clear_pending(&self, generation: u64) {
        let mut pending = lock(&self.pending);
        if pending.as_ref().map(|p| p.generation) == Some(generation) {
            pending.take();
        }
    }

    fn schedule_startup(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        for delay in self.timing.startup_delays() {
            self.spawn_delayed(delay, "Startup");
        }
    }

    fn spawn_delayed(self: &Arc<Self>, delay: Duration, reason: &'static str) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("[RescanScheduler] No runtime, dropping {} sweep", reason);
                return;
            }
        };
        let weak = Arc::downgrade(self);
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.run_sweep(reason);
            }
        });

        let mut timers = lock(&self.timers);
        timers.retain(|t| !t.is_finished());
        timers.push(task);
    }

    fn cancel_timers(&self) {
        if let Some(pending) = lock(&self.pending).take() {
            pending.handle.abort();
        }
        for task in lock(&self.timers).drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl Watchdog for RescanScheduler {
    fn name(&self) -> &str {
        "RescanScheduler"
    }

    async fn on_event(&self, event: &PageEvent) {
        match event {
            PageEvent::Idle => self.schedule_startup(),
            PageEvent::Navigated { url, kind } => {
                tracing::debug!("[RescanScheduler] {:?} navigation to {}", kind, url);
                self.schedule_navigation();
            }
            PageEvent::Started | PageEvent::Stopped => {}
        }
    }

    async fn on_attach(&self, document: SharedDocument) -> Result<()> {
        self.attach(document);
        Ok(())
    }

    async fn on_detach(&self) -> Result<()> {
        self.detach();
        Ok(())
    }
}
