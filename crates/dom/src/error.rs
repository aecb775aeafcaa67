//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    /// Unknown id, or a node whose slot was already freed
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl DomError {
    /// True for errors caused by a node that no longer exists.
    ///
    /// Callers racing the page's own framework treat these as no-ops.
    pub fn is_stale(&self) -> bool {
        matches!(self, DomError::NodeNotFound(_))
    }
}
