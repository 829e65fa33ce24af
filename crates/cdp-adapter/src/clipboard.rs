use std::time::Duration;

use action_locator::DomError;
use async_trait::async_trait;
use chromiumoxide::Page;
use page_probes::{ClipboardPort, CopiedText};
use tracing::debug;

use crate::dom::run_script;
use crate::scripts;

/// Clipboard interception through a wrapped `navigator.clipboard.writeText`.
///
/// The hook lives in the page, so a reload drops it along with the last
/// captured text.
#[derive(Clone)]
pub struct ChromiumClipboard {
    page: Page,
    deadline: Duration,
}

impl ChromiumClipboard {
    pub fn new(page: Page, deadline: Duration) -> Self {
        Self { page, deadline }
    }
}

#[async_trait]
impl ClipboardPort for ChromiumClipboard {
    async fn install_hook(&self) -> Result<(), DomError> {
        let installed: bool =
            run_script(&self.page, scripts::install_clipboard_hook(), self.deadline).await?;
        if installed {
            debug!(target: "cdp-clipboard", "clipboard hook installed");
        }
        Ok(())
    }

    async fn last_copied(&self) -> Result<Option<CopiedText>, DomError> {
        run_script(&self.page, scripts::last_copied(), self.deadline).await
    }
}
