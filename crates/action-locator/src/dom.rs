//! Document capability consumed by the locator and the page probes.

use async_trait::async_trait;

use crate::errors::DomError;
use crate::types::{ElementHandle, NodeRef};

/// Elements scanned by keyword matching.
pub const INTERACTIVE_SELECTOR: &str = "button, [role=\"button\"], a";

/// Live document of one tab.
///
/// Queries return value snapshots; actions address nodes through the
/// [`NodeRef`] carried by a snapshot.
#[async_trait]
pub trait DomPort: Send + Sync {
    /// First element matching a CSS selector.
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, DomError>;

    /// All elements matching a CSS selector, in document order, optionally
    /// restricted to the subtree of `scope`.
    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<NodeRef>,
    ) -> Result<Vec<ElementHandle>, DomError>;

    /// First node of an XPath expression.
    async fn evaluate_xpath(&self, path: &str) -> Result<Option<ElementHandle>, DomError>;

    /// Nearest ancestor-or-self matching `selector`.
    async fn closest(&self, node: NodeRef, selector: &str) -> Result<Option<NodeRef>, DomError>;

    /// Rendered text of the whole body.
    async fn body_text(&self) -> Result<String, DomError>;

    async fn scroll_into_view(&self, node: NodeRef) -> Result<(), DomError>;

    async fn click(&self, node: NodeRef) -> Result<(), DomError>;

    async fn focus(&self, node: NodeRef) -> Result<(), DomError>;

    /// Sets the value of a form field, fires `input` and `change`, and moves
    /// the caret to the end.
    async fn set_value(&self, node: NodeRef, value: &str) -> Result<(), DomError>;

    /// Synthesizes keydown, keypress and keyup for Enter on the node.
    async fn press_enter(&self, node: NodeRef) -> Result<(), DomError>;

    /// Dispatches `submit` on the node's form and submits it. Returns false
    /// when the node has no form.
    async fn submit_form(&self, node: NodeRef) -> Result<bool, DomError>;

    /// Host name of the current document.
    async fn host(&self) -> Result<String, DomError>;
}
