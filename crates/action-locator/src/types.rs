//! Core types for the locator system

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a live node in the page, valid while the node stays attached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(pub u64);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Value snapshot of an element as seen when it was queried.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementHandle {
    pub node: NodeRef,

    /// Lowercase tag name
    pub tag: String,

    /// Rendered text (innerText, falling back to textContent)
    #[serde(default)]
    pub text: String,

    /// Text of the `<label for=...>` pointing at this element, if any
    #[serde(default)]
    pub label_text: Option<String>,

    /// Selected attributes (placeholder, name, id, aria-label, role, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Rendered width in CSS pixels
    #[serde(default)]
    pub width: f64,

    /// Rendered height in CSS pixels
    #[serde(default)]
    pub height: f64,

    /// Whether the element exposes a click entry point
    #[serde(default)]
    pub clickable: bool,
}

impl ElementHandle {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn aria_label(&self) -> Option<&str> {
        self.attr("aria-label")
    }

    /// Non-zero rendered box.
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Declarative location hints for one page control.
///
/// Hints are tried in order: selectors, then path expressions, then keyword
/// fragments matched against the text and aria-label of interactive elements.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, deserialize_with = "lowercase_keywords")]
    pub keywords: Vec<String>,
}

impl ElementDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Keyword fragments are stored lowercase.
    pub fn keyword(mut self, keyword: impl AsRef<str>) -> Self {
        self.keywords.push(keyword.as_ref().to_lowercase());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty() && self.paths.is_empty() && self.keywords.is_empty()
    }
}

fn lowercase_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|k| k.to_lowercase()).collect())
}

/// Locator strategy enumeration, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorStrategy {
    /// CSS selector strategy
    Selector,

    /// XPath strategy
    Path,

    /// Keyword match on interactive elements
    Keyword,
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Selector => "selector",
            LocatorStrategy::Path => "path",
            LocatorStrategy::Keyword => "keyword",
        }
    }

    pub fn fallback_chain() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::Selector,
            LocatorStrategy::Path,
            LocatorStrategy::Keyword,
        ]
    }
}

/// Element candidate collected by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub element: ElementHandle,
    pub strategy: LocatorStrategy,
}

impl Candidate {
    pub fn new(element: ElementHandle, strategy: LocatorStrategy) -> Self {
        Self { element, strategy }
    }

    /// Clickable and rendered.
    pub fn is_preferred(&self) -> bool {
        self.element.clickable && self.element.is_visible()
    }
}

/// Result of a descriptor click.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClickOutcome {
    pub clicked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeRef>,
}

impl ClickOutcome {
    pub fn missed() -> Self {
        Self::default()
    }

    pub fn clicked(node: NodeRef) -> Self {
        Self {
            clicked: true,
            node: Some(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_lowercased() {
        let descriptor = ElementDescriptor::new().keyword("Copy Code").keyword("复制");
        assert_eq!(descriptor.keywords, vec!["copy code", "复制"]);

        let parsed: ElementDescriptor =
            serde_json::from_str(r#"{"keywords":["NEXT"],"selectors":["button.next"]}"#).unwrap();
        assert_eq!(parsed.keywords, vec!["next"]);
        assert!(parsed.paths.is_empty());
    }

    #[test]
    fn visibility_requires_both_dimensions() {
        let mut handle = ElementHandle {
            width: 10.0,
            ..Default::default()
        };
        assert!(!handle.is_visible());
        handle.height = 2.0;
        assert!(handle.is_visible());
    }
}
