//! Page DOM Library
//!
//! Arena-backed page tree the cleaner runs against.
//!
//! ## Philosophy (Linus Torvalds Style)
//!
//! - **Good taste**: Data structures first, algorithms follow naturally
//! - **No special cases**: Type system eliminates branches
//! - **Cache friendly**: Arena allocation, sequential access patterns
//!
//! ## Core Design
//!
//! ```text
//! Snapshot JSON → DomService → Document { DomArena, observers }
//!                                   ↓              ↓
//!                             NodeId (u32)   MutationRecord feed
//! ```

pub mod arena;
pub mod document;
pub mod error;
pub mod fragment;
pub mod selector;
pub mod serializer;
pub mod service;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use document::{Document, MutationCallback, MutationRecord, ObserverId};
pub use error::{DomError, Result};
pub use fragment::Fragment;
pub use selector::SelectorList;
pub use serializer::DomSerializer;
pub use service::DomService;
pub use types::*;
