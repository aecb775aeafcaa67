//! Containment classifiers
//!
//! Three questions asked about every candidate node:
//! - is it inside the side menu (unbounded ancestor walk)
//! - is it a navigation item (node plus at most 4 ancestors)
//! - is it inside the footer (unbounded ancestor walk)
//!
//! Answers are memoized by node identity. Arena slots are never reused, so a
//! cached id can't alias another node; entries for freed nodes are dropped by
//! `evict`/`prune`. A node re-parented by the page without being removed keeps
//! its old answer until it is freed.

use ahash::AHashMap;
use dom::{DomNode, Document, NodeId};
use regex::Regex;
use smallvec::SmallVec;

use crate::config::LayoutPatterns;
use crate::error::Result;
use crate::rules::ci_regex;

/// Ancestor levels examined by `is_navigation_item`, beyond the node itself
pub const NAVIGATION_DEPTH: usize = 4;

/// Compiled class-attribute patterns
#[derive(Debug)]
pub struct Layout {
    menu: Regex,
    navigation: Regex,
    footer: Regex,
    list_item: Regex,
    menu_info: Regex,
    stop: Regex,
    content_block: Regex,
    copyright_hint: Regex,
}

fn class_matches(re: &Regex, node: &DomNode) -> bool {
    let class = node.class_name();
    !class.is_empty() && re.is_match(class)
}

impl Layout {
    pub fn new(patterns: &LayoutPatterns) -> Result<Self> {
        Ok(Self {
            menu: ci_regex(&patterns.menu)?,
            navigation: ci_regex(&patterns.navigation)?,
            footer: ci_regex(&patterns.footer)?,
            list_item: ci_regex(&patterns.list_item)?,
            menu_info: ci_regex(&patterns.menu_info)?,
            stop: ci_regex(&patterns.stop)?,
            content_block: ci_regex(&patterns.content_block)?,
            copyright_hint: ci_regex(&patterns.copyright_hint)?,
        })
    }

    pub fn is_menu_region(&self, node: &DomNode) -> bool {
        class_matches(&self.menu, node)
    }

    pub fn is_navigation(&self, node: &DomNode) -> bool {
        node.has_tag("nav") || class_matches(&self.navigation, node)
    }

    pub fn is_footer_region(&self, node: &DomNode) -> bool {
        node.has_tag("footer") || class_matches(&self.footer, node)
    }

    pub fn is_menu_unit(&self, node: &DomNode) -> bool {
        node.has_tag("li")
            || class_matches(&self.list_item, node)
            || class_matches(&self.menu_info, node)
    }

    /// Layout-critical containers: never deleted by block ascent
    pub fn is_stop(&self, node: &DomNode) -> bool {
        node.has_tag("nav") || class_matches(&self.stop, node)
    }

    pub fn is_content_block(&self, node: &DomNode) -> bool {
        class_matches(&self.content_block, node)
    }

    pub fn is_copyright_hint(&self, node: &DomNode) -> bool {
        class_matches(&self.copyright_hint, node)
    }
}

#[derive(Debug)]
pub struct Classifier {
    layout: Layout,
    menu_cache: AHashMap<NodeId, bool>,
    nav_cache: AHashMap<NodeId, bool>,
    footer_cache: AHashMap<NodeId, bool>,
}

impl Classifier {
    pub fn new(patterns: &LayoutPatterns) -> Result<Self> {
        Ok(Self {
            layout: Layout::new(patterns)?,
            menu_cache: AHashMap::new(),
            nav_cache: AHashMap::new(),
            footer_cache: AHashMap::new(),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_inside_menu(&mut self, doc: &Document, node_id: NodeId) -> bool {
        let layout = &self.layout;
        inside_region(&mut self.menu_cache, doc, node_id, |n| layout.is_menu_region(n))
    }

    pub fn is_inside_footer(&mut self, doc: &Document, node_id: NodeId) -> bool {
        let layout = &self.layout;
        inside_region(&mut self.footer_cache, doc, node_id, |n| {
            layout.is_footer_region(n)
        })
    }

    /// Node or one of its nearest `NAVIGATION_DEPTH` ancestors is navigation
    ///
    /// Exhausting the bound is a plain `false`.
    pub fn is_navigation_item(&mut self, doc: &Document, node_id: NodeId) -> bool {
        if let Some(&hit) = self.nav_cache.get(&node_id) {
            return hit;
        }
        let node = match doc.get(node_id) {
            Ok(node) => node,
            Err(_) => return false,
        };
        let layout = &self.layout;
        let answer = std::iter::once(node)
            .chain(doc.ancestors(node_id))
            .take(NAVIGATION_DEPTH + 1)
            .any(|n| layout.is_navigation(n));
        self.nav_cache.insert(node_id, answer);
        answer
    }

    /// Forget freed nodes
    pub fn evict(&mut self, freed: &[NodeId]) {
        for id in freed {
            self.menu_cache.remove(id);
            self.nav_cache.remove(id);
            self.footer_cache.remove(id);
        }
    }

    /// Drop entries for nodes the document no longer holds
    pub fn prune(&mut self, doc: &Document) {
        self.menu_cache.retain(|id, _| doc.contains(*id));
        self.nav_cache.retain(|id, _| doc.contains(*id));
        self.footer_cache.retain(|id, _| doc.contains(*id));
    }

    pub fn cached_entries(&self) -> usize {
        self.menu_cache.len() + self.nav_cache.len() + self.footer_cache.len()
    }
}

// Inclusive walk to the root. Every node on the path shares the answer, and a
// cached ancestor ends the walk early.
fn inside_region<F>(
    cache: &mut AHashMap<NodeId, bool>,
    doc: &Document,
    node_id: NodeId,
    is_region: F,
) -> bool
where
    F: Fn(&DomNode) -> bool,
{
    if let Some(&hit) = cache.get(&node_id) {
        return hit;
    }

    let mut walked: SmallVec<[NodeId; 16]> = SmallVec::new();
    let mut answer = false;
    let mut current = doc.get(node_id).ok();
    while let Some(node) = current {
        if let Some(&hit) = cache.get(&node.node_id) {
            answer = hit;
            break;
        }
        walked.push(node.node_id);
        if is_region(node) {
            answer = true;
            break;
        }
        current = node.parent_id.and_then(|parent_id| doc.get(parent_id).ok());
    }

    for id in walked {
        cache.insert(id, answer);
    }
    answer
}
