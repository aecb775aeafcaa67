//! Rule model and its compiled form
//!
//! Rules are plain data. `RuleSet` indexes them once at startup so a sweep
//! only does lookups: a hash set for exact texts, substring lists for link
//! destinations, parsed selectors, and case-insensitive regexes.

use ahash::AHashSet;
use dom::{Fragment, SelectorList};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::CleanerConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HrefScope {
    /// Anywhere on the page
    Global,
    /// Only links inside the footer region
    FooterOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    /// Trimmed text content equals this string
    ExactText(String),
    /// `href` contains this string
    HrefPattern { pattern: String, scope: HrefScope },
    /// Selector whose matches are removed as-is
    StructuralSelector(String),
    /// Regex over lower-cased image `src` / `alt`
    ImageSourcePattern(String),
}

/// Case-insensitive regex, the way every layout/class pattern is matched
pub(crate) fn ci_regex(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

#[derive(Debug)]
pub struct RuleSet {
    exact_texts: AHashSet<String>,
    global_hrefs: Vec<String>,
    footer_hrefs: Vec<String>,
    selectors: Vec<SelectorList>,
    rejected_selectors: Vec<String>,
    images: Vec<Regex>,
    copyright: Regex,
    copyright_replacement: Vec<Fragment>,
}

impl RuleSet {
    pub fn from_config(config: &CleanerConfig) -> Result<Self> {
        let mut set = Self {
            exact_texts: AHashSet::new(),
            global_hrefs: Vec::new(),
            footer_hrefs: Vec::new(),
            selectors: Vec::new(),
            rejected_selectors: Vec::new(),
            images: Vec::new(),
            copyright: ci_regex(&config.copyright_pattern)?,
            copyright_replacement: config.copyright_replacement.clone(),
        };
        for rule in config.rules() {
            set.add(rule)?;
        }
        Ok(set)
    }

    /// Index one rule
    ///
    /// A selector the query engine rejects is logged and skipped; the other
    /// rules are unaffected.
    pub fn add(&mut self, rule: Rule) -> Result<()> {
        match rule {
            Rule::ExactText(text) => {
                self.exact_texts.insert(text);
            }
            Rule::HrefPattern {
                pattern,
                scope: HrefScope::Global,
            } => self.global_hrefs.push(pattern),
            Rule::HrefPattern {
                pattern,
                scope: HrefScope::FooterOnly,
            } => self.footer_hrefs.push(pattern),
            Rule::StructuralSelector(source) => match SelectorList::parse(&source) {
                Ok(list) => self.selectors.push(list),
                Err(e) => {
                    tracing::warn!("[Cleaner] Skipping selector rule: {}", e);
                    self.rejected_selectors.push(source);
                }
            },
            Rule::ImageSourcePattern(pattern) => self.images.push(ci_regex(&pattern)?),
        }
        Ok(())
    }

    pub fn is_exact_text(&self, trimmed: &str) -> bool {
        self.exact_texts.contains(trimmed)
    }

    pub fn matches_global_href(&self, href: &str) -> bool {
        self.global_hrefs.iter().any(|p| href.contains(p.as_str()))
    }

    pub fn matches_footer_href(&self, href: &str) -> bool {
        self.footer_hrefs.iter().any(|p| href.contains(p.as_str()))
    }

    /// `src` / `alt` are lower-cased before matching
    pub fn matches_image(&self, src: &str, alt: &str) -> bool {
        let src = src.to_lowercase();
        let alt = alt.to_lowercase();
        self.images
            .iter()
            .any(|re| re.is_match(&src) || re.is_match(&alt))
    }

    pub fn is_copyright(&self, trimmed: &str) -> bool {
        self.copyright.is_match(trimmed)
    }

    pub fn copyright_replacement(&self) -> &[Fragment] {
        &self.copyright_replacement
    }

    pub fn selectors(&self) -> &[SelectorList] {
        &self.selectors
    }

    pub fn rejected_selectors(&self) -> &[String] {
        &self.rejected_selectors
    }
}
