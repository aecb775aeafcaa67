//! Core type definitions for the page tree
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. Use SmallVec for small arrays (avoid heap allocation)
//! 3. Tag names are stored upper-case, the way the host reports them

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Node identifier (index into arena)
/// u32 allows 4 billion nodes, enough for any webpage
pub type NodeId = u32;

/// Node type matching DOM specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CdataSection = 4,
    EntityReference = 5,
    Entity = 6,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
    Notation = 12,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CdataSection),
            5 => Some(NodeType::EntityReference),
            6 => Some(NodeType::Entity),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            12 => Some(NodeType::Notation),
            _ => None,
        }
    }
}

/// The main DOM tree node structure
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    // IDs
    pub node_id: NodeId,
    /// Host-side id, only present for nodes loaded from a snapshot
    pub backend_node_id: Option<u32>,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>, // Most nodes have <4 children

    pub node_name: String,
    pub node_value: String,
    pub attributes: HashMap<String, String>,
}

impl DomNode {
    /// Create a new node with required fields
    pub fn new(node_type: NodeType, node_name: impl Into<String>) -> Self {
        Self {
            node_id: 0,
            backend_node_id: None,
            node_type,
            node_name: node_name.into(),
            node_value: String::new(),
            attributes: HashMap::new(),
            parent_id: None,
            children_ids: SmallVec::new(),
        }
    }

    /// Element node; the tag is normalized to upper case
    pub fn element(tag: &str) -> Self {
        Self::new(NodeType::Element, tag.to_ascii_uppercase())
    }

    /// Text node
    pub fn text(value: impl Into<String>) -> Self {
        let mut node = Self::new(NodeType::Text, "#text");
        node.node_value = value.into();
        node
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.node_name)
        } else {
            None
        }
    }

    /// Case-insensitive tag comparison; false for non-elements
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_name()
            .map_or(false, |name| name.eq_ignore_ascii_case(tag))
    }

    /// Check if node is an element
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Check if node is text
    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// The raw class attribute, empty when absent
    pub fn class_name(&self) -> &str {
        self.attr("class").unwrap_or("")
    }

    /// Check the whitespace-separated class list for an exact entry
    pub fn has_class(&self, class: &str) -> bool {
        self.class_name().split_whitespace().any(|c| c == class)
    }
}

/// Attributes emitted by the serializer in a stable order before the rest
pub const LEADING_ATTRIBUTES: &[&str] = &["id", "class", "href", "src", "alt"];

/// Elements that never have children or a closing tag
pub const VOID_ELEMENTS: &[&str] = &[
    "AREA", "BASE", "BR", "COL", "EMBED", "HR", "IMG", "INPUT", "LINK", "META", "SOURCE", "TRACK",
    "WBR",
];
