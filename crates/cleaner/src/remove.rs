//! Removal primitive
//!
//! `remove` deletes a node and, when that leaves the parent without element
//! children and without text, the parent as well. One level only.

use dom::{Document, NodeId, Result};

use crate::block::find_block_parent;
use crate::classify::Classifier;

/// Never cascaded into, even when left empty
const STRUCTURAL_TAGS: &[&str] = &["html", "head", "body"];

/// Delete `node_id`; returns every freed id
///
/// Unknown or already-detached nodes are a no-op.
pub fn remove(doc: &mut Document, node_id: NodeId) -> Result<Vec<NodeId>> {
    if !doc.is_connected(node_id) {
        return Ok(Vec::new());
    }
    let parent_id = doc.parent_id(node_id)?;
    let mut freed = doc.remove(node_id)?;

    if let Some(parent_id) = parent_id {
        if is_empty_wrapper(doc, parent_id)? {
            freed.extend(doc.remove(parent_id)?);
        }
    }
    Ok(freed)
}

/// `remove(find_block_parent(node) ?? node)`
pub fn remove_with_block(
    classifier: &mut Classifier,
    doc: &mut Document,
    node_id: NodeId,
) -> Result<Vec<NodeId>> {
    let target = find_block_parent(classifier, doc, node_id).unwrap_or(node_id);
    remove(doc, target)
}

fn is_empty_wrapper(doc: &Document, node_id: NodeId) -> Result<bool> {
    let node = doc.get(node_id)?;
    if !node.is_element() || STRUCTURAL_TAGS.iter().any(|tag| node.has_tag(tag)) {
        return Ok(false);
    }
    Ok(doc.element_child_count(node_id)? == 0 && doc.text_content(node_id)?.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Fragment;

    #[test]
    fn test_cascade_is_one_level() {
        // grandparent > parent > leaf; removing leaf empties parent, which in
        // turn empties grandparent - only parent goes
        let mut doc = Document::new("https://rutube.ru/");
        let body = doc.body().unwrap();
        let grandparent = doc
            .append(
                body,
                &Fragment::element("div")
                    .with_child(Fragment::element("div").with_child(Fragment::element("a"))),
            )
            .unwrap();
        let parent = doc.get(grandparent).unwrap().children_ids[0];
        let leaf = doc.get(parent).unwrap().children_ids[0];

        let freed = remove(&mut doc, leaf).unwrap();

        assert_eq!(freed.len(), 2);
        assert!(!doc.contains(parent));
        assert!(doc.is_connected(grandparent));
        assert_eq!(doc.element_child_count(grandparent).unwrap(), 0);
    }

    #[test]
    fn test_parent_with_text_survives() {
        let mut doc = Document::new("https://rutube.ru/");
        let body = doc.body().unwrap();
        let parent = doc
            .append(
                body,
                &Fragment::element("p")
                    .with_text("keep me")
                    .with_child(Fragment::element("a")),
            )
            .unwrap();
        let leaf = doc.elements_by_tags(&["a"])[0];

        assert_eq!(remove(&mut doc, leaf).unwrap(), vec![leaf]);
        assert!(doc.is_connected(parent));
    }

    #[test]
    fn test_body_is_never_cascaded() {
        let mut doc = Document::new("https://rutube.ru/");
        let body = doc.body().unwrap();
        let only = doc.append(body, &Fragment::element("div")).unwrap();

        remove(&mut doc, only).unwrap();
        assert!(doc.is_connected(body));
    }

    #[test]
    fn test_stale_node_is_noop() {
        let mut doc = Document::new("https://rutube.ru/");
        let body = doc.body().unwrap();
        let div = doc.append(body, &Fragment::element("div")).unwrap();

        doc.remove(div).unwrap();
        assert!(remove(&mut doc, div).unwrap().is_empty());
        assert!(remove(&mut doc, 9_999).unwrap().is_empty());
    }
}
