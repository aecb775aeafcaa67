//! Live document - the arena plus a change-notification feed
//!
//! Every child-list edit (insertion, removal, content replacement) is
//! reported synchronously to the registered observers. Attribute edits are
//! not reported.
//!
//! Observers run while the caller holds the document, so an observer must
//! never try to reach back into the document it observes.

use crate::arena::{Ancestors, DomArena};
use crate::error::{DomError, Result};
use crate::fragment::Fragment;
use crate::selector::SelectorList;
use crate::types::{DomNode, NodeId, NodeType};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// One child-list change under `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: SmallVec<[NodeId; 4]>,
    pub removed: SmallVec<[NodeId; 4]>,
}

/// Observer callback
pub type MutationCallback = Arc<dyn Fn(&MutationRecord) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub struct Document {
    arena: DomArena,
    url: String,
    observers: Vec<(ObserverId, MutationCallback)>,
    next_observer: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url)
            .field("nodes", &self.arena.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Document {
    /// Empty page: `#document > html > (head, body)`
    pub fn new(url: impl Into<String>) -> Self {
        let mut arena = DomArena::new();
        let root = arena.add_node(DomNode::new(NodeType::Document, "#document"));
        let html = arena.add_node(DomNode::element("html"));
        let head = arena.add_node(DomNode::element("head"));
        let body = arena.add_node(DomNode::element("body"));
        // Fresh ids on a fresh arena cannot fail
        let _ = arena.set_root(root);
        let _ = arena.append_child(root, html);
        let _ = arena.append_child(html, head);
        let _ = arena.append_child(html, body);
        Self::from_arena(arena, url)
    }

    /// Wrap an already built arena; it must have a root
    pub fn from_arena(arena: DomArena, url: impl Into<String>) -> Self {
        Self {
            arena,
            url: url.into(),
            observers: Vec::new(),
            next_observer: 1,
        }
    }

    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Same-document navigation only changes the url
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.arena.root_id()
    }

    /// First `BODY` element, falling back to the root
    pub fn body(&self) -> Result<NodeId> {
        self.arena
            .find_by_tag("body")
            .first()
            .copied()
            .or_else(|| self.arena.root_id())
            .ok_or_else(|| DomError::SnapshotError("document has no root".to_string()))
    }

    // ---- observers ----

    /// Subscribe to child-list changes anywhere in the document
    pub fn observe(&mut self, callback: MutationCallback) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, callback));
        id
    }

    /// Returns false if the observer was not registered
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    fn notify(&self, record: MutationRecord) {
        for (_, callback) in &self.observers {
            callback(&record);
        }
    }

    // ---- reads ----

    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.arena.get(node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.arena.contains(node_id)
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.arena.is_connected(node_id)
    }

    pub fn parent_id(&self, node_id: NodeId) -> Result<Option<NodeId>> {
        self.arena.parent_id(node_id)
    }

    pub fn ancestors(&self, node_id: NodeId) -> Ancestors<'_> {
        self.arena.ancestors(node_id)
    }

    /// Concatenated text of all descendant text nodes, untrimmed
    pub fn text_content(&self, node_id: NodeId) -> Result<String> {
        let mut text = String::new();
        self.arena.traverse_df(node_id, |node| {
            if node.is_text() {
                text.push_str(&node.node_value);
            }
            Ok(())
        })?;
        Ok(text)
    }

    /// Number of element children (text and comments do not count)
    pub fn element_child_count(&self, node_id: NodeId) -> Result<usize> {
        let node = self.arena.get(node_id)?;
        Ok(node
            .children_ids
            .iter()
            .filter(|&&child| self.arena.get(child).map_or(false, DomNode::is_element))
            .count())
    }

    /// Nearest inclusive ancestor with the given tag
    pub fn closest_tag(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        let node = self.arena.get(node_id).ok()?;
        if node.has_tag(tag) {
            return Some(node_id);
        }
        self.arena
            .ancestors(node_id)
            .find(|ancestor| ancestor.has_tag(tag))
            .map(|ancestor| ancestor.node_id)
    }

    /// Connected nodes in document order
    pub fn all_nodes(&self) -> Vec<NodeId> {
        match self.arena.root_id() {
            Some(root_id) => self.arena.descendants(root_id).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Connected elements whose tag is in `tags`, in document order
    pub fn elements_by_tags(&self, tags: &[&str]) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|&id| {
                self.arena
                    .get(id)
                    .map_or(false, |node| tags.iter().any(|tag| node.has_tag(tag)))
            })
            .collect()
    }

    /// Connected elements matching a parsed selector list, in document order
    pub fn select(&self, selectors: &SelectorList) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|&id| selectors.matches(&self.arena, id))
            .collect()
    }

    /// Parse and run a selector; bad syntax is an error
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        Ok(self.select(&SelectorList::parse(selector)?))
    }

    // ---- writes ----

    /// Build `fragment` and append it under `parent`
    pub fn append(&mut self, parent_id: NodeId, fragment: &Fragment) -> Result<NodeId> {
        self.arena.get(parent_id)?;
        let id = self.build(fragment)?;
        self.arena.append_child(parent_id, id)?;
        self.notify(MutationRecord {
            target: parent_id,
            added: smallvec::smallvec![id],
            removed: SmallVec::new(),
        });
        Ok(id)
    }

    /// Set an attribute; not reported to observers
    pub fn set_attribute(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        self.arena
            .get_mut(node_id)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Detach a node and free its subtree
    ///
    /// Returns the freed ids; empty when the node is unknown, already
    /// detached, or the document root.
    pub fn remove(&mut self, node_id: NodeId) -> Result<Vec<NodeId>> {
        if !self.arena.is_connected(node_id) || self.arena.root_id() == Some(node_id) {
            return Ok(Vec::new());
        }
        let parent_id = match self.arena.detach(node_id)? {
            Some(parent_id) => parent_id,
            None => return Ok(Vec::new()),
        };
        let freed = self.arena.free_subtree(node_id)?;
        self.notify(MutationRecord {
            target: parent_id,
            added: SmallVec::new(),
            removed: smallvec::smallvec![node_id],
        });
        Ok(freed)
    }

    /// Replace all children of a node with freshly built fragments
    pub fn replace_children(&mut self, node_id: NodeId, fragments: &[Fragment]) -> Result<()> {
        let old: SmallVec<[NodeId; 4]> = self.arena.get(node_id)?.children_ids.clone();
        for &child in &old {
            self.arena.detach(child)?;
            self.arena.free_subtree(child)?;
        }
        let mut added = SmallVec::new();
        for fragment in fragments {
            let id = self.build(fragment)?;
            self.arena.append_child(node_id, id)?;
            added.push(id);
        }
        self.notify(MutationRecord {
            target: node_id,
            added,
            removed: old,
        });
        Ok(())
    }

    // Iterative build: (fragment, parent to attach to)
    fn build(&mut self, fragment: &Fragment) -> Result<NodeId> {
        let top = self.arena.add_node(Self::node_for(fragment));
        let mut stack: Vec<(&Fragment, NodeId)> = Vec::new();
        if let Fragment::Element { children, .. } = fragment {
            stack.extend(children.iter().map(|child| (child, top)));
        }
        // Children are pushed in order and popped in reverse, so collect per parent
        let mut pending: Vec<(NodeId, NodeId)> = Vec::new();
        while let Some((frag, parent)) = stack.pop() {
            let id = self.arena.add_node(Self::node_for(frag));
            pending.push((parent, id));
            if let Fragment::Element { children, .. } = frag {
                stack.extend(children.iter().map(|child| (child, id)));
            }
        }
        // Reversing restores source order within each parent
        for (parent, id) in pending.into_iter().rev() {
            self.arena.append_child(parent, id)?;
        }
        Ok(top)
    }

    fn node_for(fragment: &Fragment) -> DomNode {
        match fragment {
            Fragment::Text { text } => DomNode::text(text.clone()),
            Fragment::Element {
                tag, attributes, ..
            } => {
                let mut node = DomNode::element(tag);
                node.attributes = attributes
                    .iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                    .collect();
                node
            }
        }
    }
}
