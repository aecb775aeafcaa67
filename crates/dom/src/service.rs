//! DOM Service - loads host snapshots into a `Document`
//!
//! The host reports its tree in the shape of CDP's `DOM.getDocument`
//! response (`nodeType`, `nodeName`, flat `attributes` pairs, `children`).
//! This is how fixtures and the demo get a realistic page into the arena.

use crate::arena::DomArena;
use crate::document::Document;
use crate::error::{DomError, Result};
use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;

/// Configuration for DOM service
#[derive(Debug, Clone)]
pub struct DomServiceConfig {
    /// Keep comment nodes from the snapshot
    pub keep_comments: bool,
    /// Refuse snapshots nested deeper than this
    pub max_depth: usize,
}

impl Default for DomServiceConfig {
    fn default() -> Self {
        Self {
            keep_comments: false,
            max_depth: 512,
        }
    }
}

/// Main DOM service
pub struct DomService {
    config: DomServiceConfig,
}

impl DomService {
    /// Create new DOM service with default config
    pub fn new() -> Self {
        Self::with_config(DomServiceConfig::default())
    }

    /// Create DOM service with custom config
    pub fn with_config(config: DomServiceConfig) -> Self {
        Self { config }
    }

    /// Parse a snapshot response and build a document
    ///
    /// Input format:
    /// ```json
    /// {
    ///   "root": {
    ///     "nodeId": 1,
    ///     "backendNodeId": 1,
    ///     "nodeType": 9,
    ///     "nodeName": "#document",
    ///     "children": [...]
    ///   }
    /// }
    /// ```
    pub fn parse_snapshot(&self, response: &Value, url: &str) -> Result<Document> {
        let root = response
            .get("root")
            .ok_or_else(|| DomError::SnapshotError("Missing 'root' in snapshot".to_string()))?;

        let mut arena = DomArena::new();
        let root_id = self
            .parse_node(&mut arena, root, 0)?
            .ok_or_else(|| DomError::SnapshotError("Root node was filtered out".to_string()))?;
        arena.set_root(root_id)?;

        // Prefer the document's own URL when the snapshot carries one
        let url = root["documentURL"].as_str().unwrap_or(url);
        Ok(Document::from_arena(arena, url))
    }

    /// Parse snapshot JSON text
    pub fn parse_snapshot_str(&self, json: &str, url: &str) -> Result<Document> {
        let value: Value = serde_json::from_str(json)?;
        self.parse_snapshot(&value, url)
    }

    /// Recursively parse a snapshot node; `None` for filtered nodes
    fn parse_node(
        &self,
        arena: &mut DomArena,
        raw: &Value,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        if depth > self.config.max_depth {
            return Err(DomError::SnapshotError(format!(
                "Snapshot deeper than {} levels",
                self.config.max_depth
            )));
        }

        let node_type_val = raw["nodeType"]
            .as_u64()
            .ok_or_else(|| DomError::SnapshotError("Missing nodeType".to_string()))?
            as u8;

        let node_type =
            NodeType::from_u8(node_type_val).ok_or_else(|| DomError::InvalidNodeType {
                expected: "valid NodeType".to_string(),
                actual: format!("{}", node_type_val),
            })?;

        if node_type == NodeType::Comment && !self.config.keep_comments {
            return Ok(None);
        }

        let node_name = raw["nodeName"].as_str().unwrap_or("");
        let mut node = match node_type {
            NodeType::Element => DomNode::element(node_name),
            _ => DomNode::new(node_type, node_name),
        };
        node.node_value = raw["nodeValue"].as_str().unwrap_or("").to_string();
        node.backend_node_id = raw["backendNodeId"].as_u64().map(|id| id as u32);

        // Attributes come as a flat [name, value, name, value, ...] list
        let mut attributes = HashMap::new();
        if let Some(attrs) = raw["attributes"].as_array() {
            for pair in attrs.chunks_exact(2) {
                if let (Some(key), Some(value)) = (pair[0].as_str(), pair[1].as_str()) {
                    attributes.insert(key.to_ascii_lowercase(), value.to_string());
                }
            }
        }
        node.attributes = attributes;

        let current_node_id = arena.add_node(node);

        if let Some(children) = raw["children"].as_array() {
            for child in children {
                if let Some(child_id) = self.parse_node(arena, child, depth + 1)? {
                    arena.append_child(current_node_id, child_id)?;
                }
            }
        }

        Ok(Some(current_node_id))
    }
}

impl Default for DomService {
    fn default() -> Self {
        Self::new()
    }
}
