//! Binds the orchestrator's [`TabPort`] to a live Chromium instance.

use std::sync::Arc;

use action_flow::{LoadState, TabPort};
use action_locator::DomPort;
use async_trait::async_trait;
use cdp_adapter::{AdapterErrorKind, ChromiumBrowser};
use page_probes::ClipboardPort;
use relay_core_types::{RelayError, SiteTarget, TabHandle};
use tracing::debug;

pub struct CdpTabs {
    browser: Arc<ChromiumBrowser>,
}

impl CdpTabs {
    pub fn new(browser: Arc<ChromiumBrowser>) -> Self {
        Self { browser }
    }

    pub fn browser(&self) -> &Arc<ChromiumBrowser> {
        &self.browser
    }
}

fn load_state_of(ready_state: &str) -> LoadState {
    if ready_state == "complete" {
        LoadState::Complete
    } else {
        LoadState::Loading
    }
}

#[async_trait]
impl TabPort for CdpTabs {
    async fn find_or_create(&self, site: &SiteTarget) -> Result<TabHandle, RelayError> {
        Ok(self.browser.find_or_create(site).await?)
    }

    async fn load_state(&self, tab: &TabHandle) -> Result<LoadState, RelayError> {
        match self.browser.ready_state(tab).await {
            Ok(ready_state) => {
                debug!(%tab, %ready_state, "tab ready state");
                Ok(load_state_of(&ready_state))
            }
            // Evaluation fails while a navigation swaps the document out
            Err(err) if err.is_transient() || err.kind == AdapterErrorKind::Script => {
                debug!(%tab, %err, "ready state unavailable");
                Ok(LoadState::Loading)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn focus(&self, tab: &TabHandle) -> Result<(), RelayError> {
        Ok(self.browser.focus(tab).await?)
    }

    async fn reload(&self, tab: &TabHandle) -> Result<(), RelayError> {
        Ok(self.browser.reload(tab).await?)
    }

    fn dom(&self, tab: &TabHandle) -> Result<Arc<dyn DomPort>, RelayError> {
        Ok(Arc::new(self.browser.dom(tab)?))
    }

    fn clipboard(&self, tab: &TabHandle) -> Result<Arc<dyn ClipboardPort>, RelayError> {
        Ok(Arc::new(self.browser.clipboard(tab)?))
    }
}
