use std::sync::Arc;

use action_locator::DomPort;
use async_trait::async_trait;
use page_probes::{ClipboardPort, PageAgent};
use relay_core_types::{RelayError, SiteTarget, TabHandle};
use serde::{Deserialize, Serialize};

/// Document readiness of a tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Complete,
}

/// Browser tabs as seen by the orchestrator.
#[async_trait]
pub trait TabPort: Send + Sync {
    /// First open tab whose URL matches the site's patterns, otherwise a new
    /// tab on the site URL. The tab is made active either way.
    async fn find_or_create(&self, site: &SiteTarget) -> Result<TabHandle, RelayError>;

    async fn load_state(&self, tab: &TabHandle) -> Result<LoadState, RelayError>;

    /// Activate the tab and focus its window.
    async fn focus(&self, tab: &TabHandle) -> Result<(), RelayError>;

    async fn reload(&self, tab: &TabHandle) -> Result<(), RelayError>;

    fn dom(&self, tab: &TabHandle) -> Result<Arc<dyn DomPort>, RelayError>;

    fn clipboard(&self, tab: &TabHandle) -> Result<Arc<dyn ClipboardPort>, RelayError>;

    /// Page-side agent bound to the tab.
    fn agent(&self, tab: &TabHandle) -> Result<PageAgent, RelayError> {
        Ok(PageAgent::new(self.dom(tab)?, self.clipboard(tab)?))
    }
}
