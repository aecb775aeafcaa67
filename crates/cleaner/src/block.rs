//! Block-ascent resolver
//!
//! A matched link or label is usually wrapped in decorative chrome; deleting
//! only the leaf leaves an empty box behind. `find_block_parent` picks the
//! enclosing block to delete instead, or `None` when the leaf should go alone.

use dom::{Document, NodeId};

use crate::classify::Classifier;

/// Ancestor levels examined outside the menu
pub const BLOCK_ASCENT_DEPTH: usize = 6;

const SEMANTIC_BLOCK_TAGS: &[&str] = &["section", "article", "aside"];

pub fn find_block_parent(
    classifier: &mut Classifier,
    doc: &Document,
    node_id: NodeId,
) -> Option<NodeId> {
    if classifier.is_inside_menu(doc, node_id) {
        return find_menu_unit(classifier, doc, node_id);
    }

    let layout = classifier.layout();
    for ancestor in doc.ancestors(node_id).take(BLOCK_ASCENT_DEPTH) {
        // Stop-list wins over block-list at the same level
        if layout.is_stop(ancestor) {
            return None;
        }
        if SEMANTIC_BLOCK_TAGS.iter().any(|tag| ancestor.has_tag(tag)) {
            return Some(ancestor.node_id);
        }
        if layout.is_content_block(ancestor) {
            return Some(ancestor.node_id);
        }
    }
    None
}

// Inside the menu only small units go: the nearest list item or info wrapper
// below the menu region itself.
fn find_menu_unit(classifier: &Classifier, doc: &Document, node_id: NodeId) -> Option<NodeId> {
    let layout = classifier.layout();
    if doc.get(node_id).map_or(true, |node| layout.is_menu_region(node)) {
        return None;
    }
    for ancestor in doc.ancestors(node_id) {
        if layout.is_menu_region(ancestor) {
            return None;
        }
        if layout.is_menu_unit(ancestor) {
            return Some(ancestor.node_id);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutPatterns;
    use dom::Fragment;

    fn classifier() -> Classifier {
        Classifier::new(&LayoutPatterns::default()).unwrap()
    }

    fn page(fragment: Fragment) -> (Document, NodeId) {
        let mut doc = Document::new("https://rutube.ru/");
        let body = doc.body().unwrap();
        let top = doc.append(body, &fragment).unwrap();
        (doc, top)
    }

    fn link(doc: &Document) -> NodeId {
        doc.elements_by_tags(&["a"])[0]
    }

    #[test]
    fn test_semantic_tag_block() {
        let (doc, section) = page(
            Fragment::element("section")
                .with_child(Fragment::element("div").with_child(Fragment::element("a"))),
        );
        assert_eq!(
            find_block_parent(&mut classifier(), &doc, link(&doc)),
            Some(section)
        );
    }

    #[test]
    fn test_content_block_class() {
        let (doc, card) = page(
            Fragment::element("div")
                .with_class("promo-card__root")
                .with_child(Fragment::element("a")),
        );
        assert_eq!(
            find_block_parent(&mut classifier(), &doc, link(&doc)),
            Some(card)
        );
    }

    #[test]
    fn test_stop_wins_at_same_level() {
        // "main-content" is a stop class and "section" a block class
        let (doc, _) = page(
            Fragment::element("div")
                .with_class("main-content section")
                .with_child(Fragment::element("a")),
        );
        assert_eq!(find_block_parent(&mut classifier(), &doc, link(&doc)), None);
    }

    #[test]
    fn test_nav_tag_stops_ascent() {
        let (doc, _) = page(
            Fragment::element("section").with_child(
                Fragment::element("nav").with_child(Fragment::element("a")),
            ),
        );
        assert_eq!(find_block_parent(&mut classifier(), &doc, link(&doc)), None);
    }

    #[test]
    fn test_ascent_bound() {
        // Block seven levels up is out of reach
        let mut fragment = Fragment::element("a");
        for _ in 0..6 {
            fragment = Fragment::element("div").with_child(fragment);
        }
        let (doc, _) = page(Fragment::element("section").with_child(fragment));
        assert_eq!(find_block_parent(&mut classifier(), &doc, link(&doc)), None);
    }

    #[test]
    fn test_menu_keeps_to_small_units() {
        let (doc, menu) = page(
            Fragment::element("div")
                .with_class("menu-content-module__wrapper")
                .with_child(
                    Fragment::element("section").with_child(
                        Fragment::element("ul").with_child(
                            Fragment::element("li").with_child(Fragment::element("a")),
                        ),
                    ),
                ),
        );
        let li = doc.elements_by_tags(&["li"])[0];
        let mut c = classifier();
        // The section is never chosen inside the menu
        assert_eq!(find_block_parent(&mut c, &doc, link(&doc)), Some(li));
        assert_eq!(find_block_parent(&mut c, &doc, menu), None);
    }

    #[test]
    fn test_menu_without_unit() {
        let (doc, _) = page(
            Fragment::element("div")
                .with_class("wdp-mobile-menu")
                .with_child(Fragment::element("div").with_class("card").with_child(Fragment::element("a"))),
        );
        assert_eq!(find_block_parent(&mut classifier(), &doc, link(&doc)), None);
    }
}
