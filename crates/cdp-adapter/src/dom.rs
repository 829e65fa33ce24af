use std::time::Duration;

use action_locator::{DomError, DomPort, ElementHandle, NodeRef};
use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts;

/// Evaluate a page script and decode its JSON envelope.
pub(crate) async fn run_script<T: DeserializeOwned>(
    page: &Page,
    script: String,
    deadline: Duration,
) -> Result<T, DomError> {
    let evaluation = tokio::time::timeout(deadline, page.evaluate(script))
        .await
        .map_err(|_| {
            AdapterError::new(AdapterErrorKind::Timeout).with_hint("page script timed out")
        })?
        .map_err(AdapterError::from)?;
    let raw: String = evaluation
        .into_value()
        .map_err(|err| DomError::Script(format!("unexpected script result: {err}")))?;
    trace!(target: "cdp-dom", len = raw.len(), "script result");
    scripts::decode(&raw)
}

/// [`DomPort`] over one Chromium page.
#[derive(Clone)]
pub struct ChromiumDom {
    page: Page,
    deadline: Duration,
}

impl ChromiumDom {
    pub fn new(page: Page, deadline: Duration) -> Self {
        Self { page, deadline }
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, DomError> {
        run_script(&self.page, script, self.deadline).await
    }
}

#[async_trait]
impl DomPort for ChromiumDom {
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, DomError> {
        self.eval(scripts::query_first(selector)).await
    }

    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<NodeRef>,
    ) -> Result<Vec<ElementHandle>, DomError> {
        self.eval(scripts::query_all(selector, scope)).await
    }

    async fn evaluate_xpath(&self, path: &str) -> Result<Option<ElementHandle>, DomError> {
        self.eval(scripts::xpath_first(path)).await
    }

    async fn closest(&self, node: NodeRef, selector: &str) -> Result<Option<NodeRef>, DomError> {
        let found: Option<u64> = self.eval(scripts::closest(node, selector)).await?;
        Ok(found.map(NodeRef))
    }

    async fn body_text(&self) -> Result<String, DomError> {
        self.eval(scripts::body_text()).await
    }

    async fn scroll_into_view(&self, node: NodeRef) -> Result<(), DomError> {
        self.eval(scripts::scroll_into_view(node)).await
    }

    async fn click(&self, node: NodeRef) -> Result<(), DomError> {
        self.eval(scripts::click(node)).await
    }

    async fn focus(&self, node: NodeRef) -> Result<(), DomError> {
        self.eval(scripts::focus(node)).await
    }

    async fn set_value(&self, node: NodeRef, value: &str) -> Result<(), DomError> {
        self.eval(scripts::set_value(node, value)).await
    }

    async fn press_enter(&self, node: NodeRef) -> Result<(), DomError> {
        self.eval(scripts::press_enter(node)).await
    }

    async fn submit_form(&self, node: NodeRef) -> Result<bool, DomError> {
        self.eval(scripts::submit_form(node)).await
    }

    async fn host(&self) -> Result<String, DomError> {
        self.eval(scripts::host()).await
    }
}
