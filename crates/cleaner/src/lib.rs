//! RUTUBE Page Cleaner
//!
//! Strips subscription upsells, app-store promos, corporate links and the
//! footer from a RUTUBE page, and keeps doing it while the single-page app
//! re-renders underneath.
//!
//! # Architecture Philosophy (Linus-approved)
//!
//! 1. **Data structures first**: rules are data, compiled once; the page is an arena
//! 2. **Zero special cases**: every trigger ends in the same idempotent sweep
//! 3. **Fail open**: a broken rule or a vanished node never breaks the page
//!
//! ```text
//! PageSession ── PageEvent ──▶ WatchdogManager ──▶ RescanScheduler
//!      │                                               │
//!      └──── SharedDocument ◀── mutation feed ─────────┤
//!                   ▲                                  ▼
//!                   └──────────── Cleaner::sweep (rules + classifiers)
//! ```

pub mod block;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod remove;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod sweep;
pub mod watchdog;

pub use classify::Classifier;
pub use config::{CleanerConfig, LayoutPatterns, TimingConfig};
pub use error::{CleanerError, Result};
pub use events::{EventBus, NavigationKind, PageEvent};
pub use rules::{HrefScope, Rule, RuleSet};
pub use scheduler::{RescanScheduler, SharedDocument, SweepState};
pub use session::{PageSession, SessionConfig};
pub use sweep::{Cleaner, SweepReport};
pub use watchdog::{Watchdog, WatchdogManager};
