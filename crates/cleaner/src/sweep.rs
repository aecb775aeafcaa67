//! Sweep Engine - one full cleaning pass over the document
//!
//! Four steps, always in this order:
//! 1. structural selectors, removed as-is
//! 2. exact texts and link destinations, removed with their block
//! 3. store badges and download images, removed with their link
//! 4. copyright line rewrite
//!
//! Step 2 walks children before ancestors and runs again when step 3
//! removed anything, so a second sweep right after the first changes
//! nothing. Nodes that vanish mid-pass are skipped.

use dom::utils::cap_text_length;
use dom::{Document, NodeId};
use serde::Serialize;
use std::time::Instant;

use crate::classify::Classifier;
use crate::config::CleanerConfig;
use crate::error::Result;
use crate::remove::{remove, remove_with_block};
use crate::rules::RuleSet;

/// Candidates of the text/link pass
const CONTENT_TAGS: &[&str] = &[
    "a", "button", "span", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "section",
];

/// Tags that may carry the copyright line
const COPYRIGHT_TAGS: &[&str] = &["footer", "p", "span", "small", "div"];

/// What one sweep did
///
/// Category counters count matched nodes; `freed` counts every node that
/// left the arena, cascades and subtrees included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub structural: usize,
    pub text: usize,
    pub href: usize,
    pub images: usize,
    pub copyright: usize,
    pub freed: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.structural + self.text + self.href + self.images + self.copyright
    }

    /// Nothing matched
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Compiled rules plus the classifiers and their caches
#[derive(Debug)]
pub struct Cleaner {
    rules: RuleSet,
    classifier: Classifier,
}

impl Cleaner {
    pub fn new(config: &CleanerConfig) -> Result<Self> {
        Ok(Self {
            rules: RuleSet::from_config(config)?,
            classifier: Classifier::new(&config.layout)?,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Run all four steps once
    pub fn sweep(&mut self, doc: &mut Document) -> Result<SweepReport> {
        let started = Instant::now();
        self.classifier.prune(doc);

        let mut report = SweepReport::default();
        self.remove_structural(doc, &mut report)?;
        self.remove_text_and_links(doc, &mut report)?;
        self.remove_images(doc, &mut report)?;
        if report.images > 0 {
            // A removed badge may leave its wrapper holding only a listed text
            self.remove_text_and_links(doc, &mut report)?;
        }
        self.rewrite_copyright(doc, &mut report)?;

        if report.is_clean() {
            tracing::trace!("[Cleaner] Sweep found nothing in {:?}", started.elapsed());
        } else {
            tracing::debug!(
                "[Cleaner] Sweep done in {:?}: {} structural, {} text, {} href, {} images, {} copyright ({} nodes freed)",
                started.elapsed(),
                report.structural,
                report.text,
                report.href,
                report.images,
                report.copyright,
                report.freed
            );
        }
        Ok(report)
    }

    fn remove_structural(&mut self, doc: &mut Document, report: &mut SweepReport) -> Result<()> {
        // Match every selector first; removals below must not shift the list
        let matched: Vec<Vec<NodeId>> = self
            .rules
            .selectors()
            .iter()
            .map(|selector| {
                let nodes = doc.select(selector);
                if !nodes.is_empty() {
                    tracing::trace!("[Cleaner] {} matched {} nodes", selector.source(), nodes.len());
                }
                nodes
            })
            .collect();

        for node_id in matched.into_iter().flatten() {
            let freed = self.discard(doc, node_id, false, "selector")?;
            if freed > 0 {
                report.structural += 1;
                report.freed += freed;
            }
        }
        Ok(())
    }

    fn remove_text_and_links(
        &mut self,
        doc: &mut Document,
        report: &mut SweepReport,
    ) -> Result<()> {
        // Children before ancestors: a removal only changes the text of
        // ancestors, and those are still ahead in this order
        let mut candidates = doc.elements_by_tags(CONTENT_TAGS);
        candidates.reverse();

        for node_id in candidates {
            if !doc.is_connected(node_id)
                || self.classifier.is_navigation_item(doc, node_id)
                || self.classifier.is_inside_menu(doc, node_id)
            {
                continue;
            }

            let text = match doc.text_content(node_id) {
                Ok(text) => text,
                Err(e) if e.is_stale() => continue,
                Err(e) => return Err(e.into()),
            };
            if self.rules.is_exact_text(text.trim()) {
                let freed = self.discard(doc, node_id, true, "text")?;
                if freed > 0 {
                    report.text += 1;
                    report.freed += freed;
                }
                continue;
            }

            if self.href_matches(doc, node_id) {
                let freed = self.discard(doc, node_id, true, "href")?;
                if freed > 0 {
                    report.href += 1;
                    report.freed += freed;
                }
            }
        }
        Ok(())
    }

    fn href_matches(&mut self, doc: &Document, node_id: NodeId) -> bool {
        let href = match doc.get(node_id) {
            Ok(node) if node.has_tag("a") => match node.attr("href") {
                Some(href) => href,
                None => return false,
            },
            _ => return false,
        };
        if self.rules.matches_global_href(href) {
            return true;
        }
        self.rules.matches_footer_href(href) && self.classifier.is_inside_footer(doc, node_id)
    }

    fn remove_images(&mut self, doc: &mut Document, report: &mut SweepReport) -> Result<()> {
        for img_id in doc.elements_by_tags(&["img"]) {
            let hit = match doc.get(img_id) {
                Ok(img) if doc.is_connected(img_id) => self.rules.matches_image(
                    img.attr("src").unwrap_or_default(),
                    img.attr("alt").unwrap_or_default(),
                ),
                _ => false,
            };
            if !hit {
                continue;
            }
            // A badge is usually the whole content of its store link
            let target = doc.closest_tag(img_id, "a").unwrap_or(img_id);
            let freed = self.discard(doc, target, true, "image")?;
            if freed > 0 {
                report.images += 1;
                report.freed += freed;
            }
        }
        Ok(())
    }

    fn rewrite_copyright(&mut self, doc: &mut Document, report: &mut SweepReport) -> Result<()> {
        let layout = self.classifier.layout();
        let candidates: Vec<NodeId> = doc
            .all_nodes()
            .into_iter()
            .filter(|&id| {
                doc.get(id).map_or(false, |node| {
                    node.is_element()
                        && (COPYRIGHT_TAGS.iter().any(|tag| node.has_tag(tag))
                            || layout.is_copyright_hint(node))
                })
            })
            .collect();

        for node_id in candidates {
            // The rewritten line carries a link, which keeps it out of here
            if doc.element_child_count(node_id)? != 0 {
                continue;
            }
            let text = doc.text_content(node_id)?;
            if !self.rules.is_copyright(text.trim()) {
                continue;
            }
            tracing::trace!("[Cleaner] Rewriting copyright line {:?}", text.trim());
            doc.replace_children(node_id, self.rules.copyright_replacement())?;
            report.copyright += 1;
        }
        Ok(())
    }

    // Remove one match and forget everything it freed
    fn discard(
        &mut self,
        doc: &mut Document,
        node_id: NodeId,
        with_block: bool,
        reason: &str,
    ) -> Result<usize> {
        tracing::trace!("[Cleaner] Removing {} ({})", describe(doc, node_id), reason);

        let removed = if with_block {
            remove_with_block(&mut self.classifier, doc, node_id)
        } else {
            remove(doc, node_id)
        };
        let freed = match removed {
            Ok(freed) => freed,
            Err(e) if e.is_stale() => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        self.classifier.evict(&freed);
        Ok(freed.len())
    }
}

fn describe(doc: &Document, node_id: NodeId) -> String {
    match doc.get(node_id) {
        Ok(node) => {
            let text = doc.text_content(node_id).unwrap_or_default();
            format!(
                "<{} class={:?}> {:?}",
                node.tag_name().unwrap_or("?"),
                node.class_name(),
                cap_text_length(text.trim(), 40)
            )
        }
        Err(_) => format!("#{}", node_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::{DomSerializer, Fragment};

    fn cleaner() -> Cleaner {
        Cleaner::new(&CleanerConfig::default()).unwrap()
    }

    fn blank() -> (Document, NodeId) {
        let doc = Document::new("https://rutube.ru/");
        let body = doc.body().unwrap();
        (doc, body)
    }

    fn texts(doc: &Document, tag: &str) -> Vec<String> {
        doc.elements_by_tags(&[tag])
            .into_iter()
            .map(|id| doc.text_content(id).unwrap().trim().to_string())
            .collect()
    }

    fn html(doc: &Document) -> String {
        DomSerializer::new().serialize(doc.arena()).unwrap()
    }

    /// Header, menu, content and footer roughly the way the site lays them out
    fn rutube_page() -> Document {
        let (mut doc, body) = blank();
        doc.append(
            body,
            &Fragment::element("header")
                .with_child(
                    Fragment::element("div")
                        .with_class("premium-subscription-entrypoint-module__premium-entrypoint")
                        .with_child(Fragment::element("button").with_text("Оформить подписку")),
                )
                .with_child(
                    Fragment::element("a")
                        .with_attr("href", "/")
                        .with_text("Главная"),
                ),
        )
        .unwrap();
        doc.append(
            body,
            &Fragment::element("div")
                .with_class("menu-content-module__menuContent")
                .with_child(
                    Fragment::element("ul")
                        .with_child(
                            Fragment::element("li").with_child(
                                Fragment::element("a")
                                    .with_attr("href", "/kids")
                                    .with_text("RUTUBE детям"),
                            ),
                        )
                        .with_child(
                            Fragment::element("li").with_child(
                                Fragment::element("a")
                                    .with_attr("href", "/sport")
                                    .with_text("Спорт"),
                            ),
                        ),
                ),
        )
        .unwrap();
        doc.append(
            body,
            &Fragment::element("main")
                .with_child(Fragment::element("h2").with_text("Популярное"))
                .with_child(Fragment::element("p").with_text("Оформить подписку сейчас"))
                .with_child(
                    Fragment::element("div")
                        .with_class("stores-card")
                        .with_child(
                            Fragment::element("a")
                                .with_attr("href", "https://example.com/badge")
                                .with_child(
                                    Fragment::element("img")
                                        .with_attr("src", "/static/GooglePlay.svg"),
                                ),
                        ),
                ),
        )
        .unwrap();
        doc.append(
            body,
            &Fragment::element("footer")
                .with_child(
                    Fragment::element("div")
                        .with_child(Fragment::element("a").with_attr("href", "/kids").with_text("Детям"))
                        .with_child(Fragment::element("a").with_attr("href", "/channels").with_text("Каналы")),
                )
                .with_child(Fragment::element("a").with_attr("href", "https://t.me/rutube").with_text("Telegram"))
                .with_child(Fragment::element("span").with_text("© 2024, RUTUBE")),
        )
        .unwrap();
        doc
    }

    #[test]
    fn test_full_page_sweep() {
        let mut doc = rutube_page();
        let report = cleaner().sweep(&mut doc).unwrap();

        assert_eq!(report.structural, 1);
        assert_eq!(report.href, 2);
        assert_eq!(report.images, 1);
        assert_eq!(report.copyright, 1);
        assert!(report.freed >= report.total());

        let links = texts(&doc, "a");
        // Menu entries survive even though their text/href match rules
        assert!(links.contains(&"RUTUBE детям".to_string()));
        assert!(links.contains(&"Спорт".to_string()));
        assert!(links.contains(&"Каналы".to_string()));
        assert!(!links.contains(&"Детям".to_string()));
        assert!(!links.contains(&"Telegram".to_string()));
        assert!(doc.elements_by_tags(&["img"]).is_empty());
        assert!(doc.query_selector_all("button").unwrap().is_empty());
    }

    #[test]
    fn test_exact_text_is_exact() {
        let (mut doc, body) = blank();
        let kept = doc
            .append(body, &Fragment::element("p").with_text("Оформить подписку сейчас"))
            .unwrap();
        let gone = doc
            .append(body, &Fragment::element("button").with_text("  Оформить подписку \n"))
            .unwrap();

        let report = cleaner().sweep(&mut doc).unwrap();

        assert_eq!(report.text, 1);
        assert!(doc.is_connected(kept));
        assert!(!doc.contains(gone));
    }

    #[test]
    fn test_exact_text_removes_block() {
        let (mut doc, body) = blank();
        let section = doc
            .append(
                body,
                &Fragment::element("section")
                    .with_child(Fragment::element("h3").with_text("Больше от RUTUBE"))
                    .with_child(Fragment::element("a").with_attr("href", "/x").with_text("x")),
            )
            .unwrap();

        cleaner().sweep(&mut doc).unwrap();
        assert!(!doc.contains(section));
    }

    #[test]
    fn test_navigation_items_are_immune() {
        let (mut doc, body) = blank();
        let nav = doc
            .append(
                body,
                &Fragment::element("div").with_class("nav-item").with_child(
                    Fragment::element("a")
                        .with_attr("href", "/info/faq")
                        .with_text("Вопросы и ответы"),
                ),
            )
            .unwrap();

        let report = cleaner().sweep(&mut doc).unwrap();
        assert!(report.is_clean());
        assert!(doc.is_connected(nav));
    }

    #[test]
    fn test_footer_scoped_href() {
        let (mut doc, body) = blank();
        doc.append(
            body,
            &Fragment::element("footer")
                .with_child(Fragment::element("a").with_attr("href", "/kids").with_text("Детям")),
        )
        .unwrap();
        let elsewhere = doc
            .append(
                body,
                &Fragment::element("div")
                    .with_attr("id", "content")
                    .with_child(Fragment::element("a").with_attr("href", "/kids").with_text("Детям")),
            )
            .unwrap();

        let report = cleaner().sweep(&mut doc).unwrap();

        assert_eq!(report.href, 1);
        let links = doc.query_selector_all("a[href=\"/kids\"]").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(doc.parent_id(links[0]).unwrap(), Some(elsewhere));
        // The emptied footer went with its only link
        assert!(doc.elements_by_tags(&["footer"]).is_empty());
    }

    #[test]
    fn test_social_links_take_their_block_outside_the_menu() {
        let (mut doc, body) = blank();
        let card = doc
            .append(
                body,
                &Fragment::element("div")
                    .with_class("social-card")
                    .with_child(Fragment::element("a").with_attr("href", "https://vk.com/rutube").with_text("VK"))
                    .with_child(Fragment::element("span").with_text("Мы в соцсетях")),
            )
            .unwrap();
        doc.append(
            body,
            &Fragment::element("div")
                .with_class("menu-content-module__menuContent")
                .with_child(
                    Fragment::element("a")
                        .with_attr("href", "https://t.me/rutube")
                        .with_text("Telegram"),
                ),
        )
        .unwrap();

        let report = cleaner().sweep(&mut doc).unwrap();

        assert_eq!(report.href, 1);
        assert!(!doc.contains(card));
        assert_eq!(texts(&doc, "a"), vec!["Telegram"]);
    }

    #[test]
    fn test_image_removes_enclosing_link() {
        let (mut doc, body) = blank();
        let stores = doc
            .append(
                body,
                &Fragment::element("div")
                    .with_attr("id", "stores")
                    .with_child(
                        Fragment::element("a")
                            .with_attr("href", "https://example.com/one")
                            .with_child(Fragment::element("img").with_attr("src", "/img/RuStore-badge.svg")),
                    )
                    .with_child(
                        Fragment::element("a")
                            .with_attr("href", "https://example.com/two")
                            .with_child(Fragment::element("img").with_attr("alt", "cat")),
                    ),
            )
            .unwrap();
        let bare = doc
            .append(body, &Fragment::element("img").with_attr("alt", "Скачать приложение"))
            .unwrap();

        let report = cleaner().sweep(&mut doc).unwrap();

        assert_eq!(report.images, 2);
        assert!(!doc.contains(bare));
        assert!(doc.is_connected(stores));
        assert_eq!(doc.elements_by_tags(&["a"]).len(), 1);
        let imgs = doc.elements_by_tags(&["img"]);
        assert_eq!(imgs.len(), 1);
        assert_eq!(doc.get(imgs[0]).unwrap().attr("alt"), Some("cat"));
    }

    #[test]
    fn test_copyright_rewrite() {
        let (mut doc, body) = blank();
        let line = doc
            .append(
                body,
                &Fragment::element("div")
                    .with_class("footer-copyright")
                    .with_text("© 2024, RUTUBE"),
            )
            .unwrap();
        let premium = doc
            .append(body, &Fragment::element("p").with_text("© 2024, RUTUBE Premium"))
            .unwrap();

        let report = cleaner().sweep(&mut doc).unwrap();

        assert_eq!(report.copyright, 1);
        assert_eq!(doc.text_content(line).unwrap(), "© 2026, RUTUBE edit by dah9");
        assert_eq!(doc.element_child_count(line).unwrap(), 1);
        assert_eq!(doc.text_content(premium).unwrap(), "© 2024, RUTUBE Premium");
    }

    #[test]
    fn test_second_sweep_changes_nothing() {
        let mut doc = rutube_page();
        let mut cleaner = cleaner();

        let first = cleaner.sweep(&mut doc).unwrap();
        assert!(!first.is_clean());
        let after_first = html(&doc);

        let second = cleaner.sweep(&mut doc).unwrap();
        assert!(second.is_clean());
        assert_eq!(html(&doc), after_first);
    }

    #[test]
    fn test_inner_link_unmasks_wrapper_text_in_one_pass() {
        let (mut doc, body) = blank();
        doc.append(
            body,
            &Fragment::element("div")
                .with_child(Fragment::element("a").with_attr("href", "/info/faq").with_text("x"))
                .with_child(Fragment::text("Безопасный режим")),
        )
        .unwrap();
        let mut cleaner = cleaner();

        let first = cleaner.sweep(&mut doc).unwrap();
        assert_eq!(first.href, 1);
        assert_eq!(first.text, 1);
        assert_eq!(html(&doc), "<html><head></head><body></body></html>");

        assert!(cleaner.sweep(&mut doc).unwrap().is_clean());
        assert_eq!(html(&doc), "<html><head></head><body></body></html>");
    }

    #[test]
    fn test_badge_removal_unmasks_wrapper_text() {
        let (mut doc, body) = blank();
        doc.append(
            body,
            &Fragment::element("div")
                .with_child(
                    Fragment::element("a")
                        .with_attr("href", "https://example.com/app")
                        .with_child(Fragment::element("img").with_attr("alt", "App Store"))
                        .with_text("Скачать"),
                )
                .with_child(Fragment::text("Безопасный режим")),
        )
        .unwrap();
        let mut cleaner = cleaner();

        let first = cleaner.sweep(&mut doc).unwrap();
        assert_eq!(first.images, 1);
        assert_eq!(first.text, 1);
        let after_first = html(&doc);
        assert_eq!(after_first, "<html><head></head><body></body></html>");

        assert!(cleaner.sweep(&mut doc).unwrap().is_clean());
        assert_eq!(html(&doc), after_first);
    }

    #[test]
    fn test_invalid_selector_does_not_stop_sweep() {
        let mut config = CleanerConfig::default();
        config.selectors = vec!["[class*=\"promo\"".to_string(), ".promo".to_string()];
        let mut cleaner = Cleaner::new(&config).unwrap();
        assert_eq!(cleaner.rules().rejected_selectors().len(), 1);

        let (mut doc, body) = blank();
        let promo = doc
            .append(body, &Fragment::element("div").with_class("promo"))
            .unwrap();

        let report = cleaner.sweep(&mut doc).unwrap();
        assert_eq!(report.structural, 1);
        assert!(!doc.contains(promo));
    }

    #[test]
    fn test_freed_nodes_leave_the_cache() {
        let mut doc = rutube_page();
        let mut cleaner = cleaner();
        cleaner.sweep(&mut doc).unwrap();
        let warm = cleaner.classifier().cached_entries();
        assert!(warm > 0);

        // Drop the whole body behind the cleaner's back
        let body = doc.body().unwrap();
        let children: Vec<NodeId> = doc.get(body).unwrap().children_ids.to_vec();
        for child in children {
            doc.remove(child).unwrap();
        }
        let report = cleaner.sweep(&mut doc).unwrap();

        assert!(report.is_clean());
        assert!(cleaner.classifier().cached_entries() < warm);
    }

    #[test]
    fn test_empty_document_is_clean() {
        let (mut doc, _) = blank();
        assert!(cleaner().sweep(&mut doc).unwrap().is_clean());
    }
}
