//! Markup fragments to insert into a document
//!
//! A small owned tree, built with a chaining API in code and deserialized
//! from configuration files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fragment {
    Text {
        text: String,
    },
    Element {
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default)]
        children: Vec<Fragment>,
    },
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text { text: text.into() }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Fragment::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute; ignored on text fragments
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Fragment::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attr("class", class)
    }

    /// Append a child; ignored on text fragments
    pub fn with_child(mut self, child: Fragment) -> Self {
        if let Fragment::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Fragment::text(text))
    }
}
