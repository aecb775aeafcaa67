//! DOM Serializer - Convert the tree back to HTML
//!
//! Used for snapshots in tests, log excerpts of removed blocks, and the
//! demo output. Attribute order is deterministic so two serializations of
//! the same tree compare equal.

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;
use crate::utils::{escape_attr, escape_text};

/// Serializer configuration
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Indent nested elements, one per line
    pub pretty: bool,
    /// Drop whitespace-only text nodes
    pub skip_blank_text: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            skip_blank_text: true,
        }
    }
}

/// DOM Tree Serializer
pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Serialize the whole tree from its root
    pub fn serialize(&self, arena: &DomArena) -> Result<String> {
        let mut output = String::with_capacity(4096);

        if let Some(root_id) = arena.root_id() {
            self.serialize_node(arena, root_id, 0, &mut output)?;
        }

        Ok(output)
    }

    /// The node itself and its subtree
    pub fn outer_html(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::new();
        self.serialize_node(arena, node_id, 0, &mut output)?;
        Ok(output)
    }

    /// Only the node's children
    pub fn inner_html(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::new();
        for &child_id in &arena.get(node_id)?.children_ids {
            self.serialize_node(arena, child_id, 0, &mut output)?;
        }
        Ok(output)
    }

    /// Serialize a single node recursively
    fn serialize_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        depth: usize,
        output: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;

        let indent = if self.config.pretty {
            "  ".repeat(depth)
        } else {
            String::new()
        };
        let newline = if self.config.pretty { "\n" } else { "" };

        match node.node_type {
            NodeType::Element => {
                let tag = node.node_name.to_ascii_lowercase();
                output.push_str(&indent);
                output.push('<');
                output.push_str(&tag);
                self.write_attributes(node, output);
                output.push('>');
                output.push_str(newline);

                if VOID_ELEMENTS.contains(&node.node_name.as_str()) {
                    return Ok(());
                }

                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth + 1, output)?;
                }

                output.push_str(&indent);
                output.push_str("</");
                output.push_str(&tag);
                output.push('>');
                output.push_str(newline);
            }
            NodeType::Text => {
                let text = if self.config.pretty {
                    node.node_value.trim()
                } else {
                    node.node_value.as_str()
                };
                if !(self.config.skip_blank_text && text.trim().is_empty()) {
                    output.push_str(&indent);
                    output.push_str(&escape_text(text));
                    output.push_str(newline);
                }
            }
            NodeType::Comment => {
                output.push_str(&indent);
                output.push_str("<!--");
                output.push_str(&node.node_value);
                output.push_str("-->");
                output.push_str(newline);
            }
            NodeType::Document | NodeType::DocumentFragment => {
                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth, output)?;
                }
            }
            _ => {
                // Doctype and friends carry nothing the cleaner cares about
            }
        }

        Ok(())
    }

    fn write_attributes(&self, node: &DomNode, output: &mut String) {
        let mut rest: Vec<(&String, &String)> = node
            .attributes
            .iter()
            .filter(|(name, _)| !LEADING_ATTRIBUTES.contains(&name.as_str()))
            .collect();
        rest.sort();

        let leading = LEADING_ATTRIBUTES
            .iter()
            .filter_map(|name| node.attributes.get_key_value(*name));

        for (name, value) in leading.chain(rest) {
            output.push(' ');
            output.push_str(name);
            output.push_str("=\"");
            output.push_str(&escape_attr(value));
            output.push('"');
        }
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}
