//! Arena-based DOM tree storage
//!
//! ## Linus Philosophy Applied
//!
//! "Bad programmers worry about the code. Good programmers worry about
//! data structures and their relationships."
//!
//! ## Memory Layout
//!
//! ```text
//! Arena: Vec<Option<DomNode>>
//!        [Node0][Node1][None][Node3]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```
//!
//! Slots are never reused. A freed node leaves `None` behind, so a stale
//! `NodeId` can only ever resolve to `NodeNotFound`, never to a different node.

use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};
use ahash::AHashMap;

/// Arena allocator for DOM nodes
///
/// Design:
/// - Single Vec for sequential allocation
/// - HashMap for backend_node_id → NodeId lookup (snapshot ids)
/// - No Rc/Arc: use indices everywhere
#[derive(Debug)]
pub struct DomArena {
    nodes: Vec<Option<DomNode>>,

    /// Backend node ID → NodeId lookup
    backend_id_map: AHashMap<u32, NodeId>,

    root_id: Option<NodeId>,

    live: usize,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            backend_id_map: AHashMap::with_capacity(capacity),
            root_id: None,
            live: 0,
        }
    }

    /// Add a detached node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        if let Some(backend_id) = node.backend_node_id {
            self.backend_id_map.insert(backend_id, node_id);
        }
        self.nodes.push(Some(node));
        self.live += 1;
        node_id
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .and_then(Option::as_ref)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .and_then(Option::as_mut)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// True if the slot still holds a node
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.get(node_id).is_ok()
    }

    /// Get node ID by backend node ID
    pub fn get_node_id_by_backend(&self, backend_id: u32) -> Option<NodeId> {
        self.backend_id_map
            .get(&backend_id)
            .copied()
            .filter(|&id| self.contains(id))
    }

    /// Set root node
    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    /// Get root node ID
    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Number of live (not freed) nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterator over all live nodes, attached or not
    pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter().flatten()
    }

    /// Append `child` as the last child of `parent`
    ///
    /// The child is detached from its current parent first.
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        self.get(parent_id)?;
        self.detach(child_id)?;
        self.get_mut(child_id)?.parent_id = Some(parent_id);
        self.get_mut(parent_id)?.children_ids.push(child_id);
        Ok(())
    }

    /// Unlink a node from its parent, returning the former parent
    ///
    /// The node and its subtree stay in the arena.
    pub fn detach(&mut self, node_id: NodeId) -> Result<Option<NodeId>> {
        let parent_id = match self.get_mut(node_id)?.parent_id.take() {
            Some(parent_id) => parent_id,
            None => return Ok(None),
        };
        if let Ok(parent) = self.get_mut(parent_id) {
            parent.children_ids.retain(|id| *id != node_id);
        }
        Ok(Some(parent_id))
    }

    /// Drop a detached subtree's payload; returns the freed ids
    ///
    /// Iterative, like the traversals. Attached nodes are refused.
    pub fn free_subtree(&mut self, node_id: NodeId) -> Result<Vec<NodeId>> {
        if self.get(node_id)?.parent_id.is_some() || self.root_id == Some(node_id) {
            return Err(DomError::InvalidNodeType {
                expected: "detached node".to_string(),
                actual: "attached node".to_string(),
            });
        }

        let mut freed = Vec::new();
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id as usize).and_then(Option::take) {
                if let Some(backend_id) = node.backend_node_id {
                    self.backend_id_map.remove(&backend_id);
                }
                stack.extend(node.children_ids.iter().copied());
                self.live -= 1;
                freed.push(id);
            }
        }
        Ok(freed)
    }

    /// Get parent id of a node
    pub fn parent_id(&self, node_id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(node_id)?.parent_id)
    }

    /// Ancestors of a node, nearest first, excluding the node itself
    pub fn ancestors(&self, node_id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.get(node_id).ok().and_then(|n| n.parent_id),
        }
    }

    /// Reachable from the root through parent links
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        let root_id = match self.root_id {
            Some(root_id) => root_id,
            None => return false,
        };
        if !self.contains(node_id) {
            return false;
        }
        node_id == root_id || self.ancestors(node_id).any(|node| node.node_id == root_id)
    }

    /// Traverse tree depth-first (iterative, no recursion)
    ///
    /// This is the "good taste" version - no special cases for leaf nodes
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Descendant ids in document order, including `start_id`
    pub fn descendants(&self, start_id: NodeId) -> Result<Vec<NodeId>> {
        let mut ids = Vec::new();
        self.traverse_df(start_id, |node| {
            ids.push(node.node_id);
            Ok(())
        })?;
        Ok(ids)
    }

    /// Attached elements with the given tag, in document order
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let root_id = match self.root_id {
            Some(root_id) => root_id,
            None => return Vec::new(),
        };
        let mut found = Vec::new();
        let _ = self.traverse_df(root_id, |node| {
            if node.node_type == NodeType::Element && node.node_name.eq_ignore_ascii_case(tag) {
                found.push(node.node_id);
            }
            Ok(())
        });
        found
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node's ancestor chain
pub struct Ancestors<'a> {
    arena: &'a DomArena,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a DomNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.arena.get(self.next?).ok()?;
        self.next = node.parent_id;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (DomArena, NodeId, NodeId, NodeId) {
        // root -> div -> [span, span]
        let mut arena = DomArena::new();
        let root = arena.add_node(DomNode::new(NodeType::Document, "#document"));
        arena.set_root(root).unwrap();
        let div = arena.add_node(DomNode::element("div"));
        let a = arena.add_node(DomNode::element("span"));
        let b = arena.add_node(DomNode::element("span"));
        arena.append_child(root, div).unwrap();
        arena.append_child(div, a).unwrap();
        arena.append_child(div, b).unwrap();
        (arena, div, a, b)
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();

        let mut node = DomNode::element("div");
        node.backend_node_id = Some(100);

        let id = arena.add_node(node);
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "DIV");
        assert_eq!(retrieved.node_id, 0);
        assert_eq!(arena.get_node_id_by_backend(100), Some(0));
    }

    #[test]
    fn test_traverse_df() {
        let (arena, div, _, _) = tree();

        let mut visited = Vec::new();
        arena
            .traverse_df(div, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["DIV", "SPAN", "SPAN"]);
    }

    #[test]
    fn test_detach_and_connectivity() {
        let (mut arena, div, a, b) = tree();

        assert!(arena.is_connected(a));
        assert_eq!(arena.detach(div).unwrap(), Some(0));
        assert!(!arena.is_connected(div));
        // Descendants of a detached node are disconnected too
        assert!(!arena.is_connected(b));
        // Detaching again is a no-op
        assert_eq!(arena.detach(div).unwrap(), None);
    }

    #[test]
    fn test_free_subtree_never_reuses_slots() {
        let (mut arena, div, a, b) = tree();
        arena.detach(div).unwrap();

        let mut freed = arena.free_subtree(div).unwrap();
        freed.sort_unstable();
        assert_eq!(freed, vec![div, a, b]);
        assert_eq!(arena.len(), 1);
        assert!(arena.get(a).unwrap_err().is_stale());

        let fresh = arena.add_node(DomNode::element("p"));
        assert!(fresh > b);
    }

    #[test]
    fn test_free_attached_refused() {
        let (mut arena, div, _, _) = tree();
        assert!(arena.free_subtree(div).is_err());
        assert!(arena.contains(div));
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let (arena, div, a, _) = tree();
        let chain: Vec<NodeId> = arena.ancestors(a).map(|n| n.node_id).collect();
        assert_eq!(chain, vec![div, 0]);
        assert_eq!(arena.find_by_tag("span").len(), 2);
    }
}
