use std::sync::Arc;

use action_locator::{DomError, DomPort};
use serde::{Deserialize, Serialize};

use crate::capture::{latest_code, ClipboardPort, CodeReport};

/// Liveness answer from the page-side agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReply {
    pub ok: bool,
    pub host: String,
}

/// Page-side handler bound to one tab's document and clipboard.
#[derive(Clone)]
pub struct PageAgent {
    dom: Arc<dyn DomPort>,
    clipboard: Arc<dyn ClipboardPort>,
}

impl PageAgent {
    pub fn new(dom: Arc<dyn DomPort>, clipboard: Arc<dyn ClipboardPort>) -> Self {
        Self { dom, clipboard }
    }

    pub async fn install_hook(&self) -> Result<(), DomError> {
        self.clipboard.install_hook().await
    }

    pub async fn latest_code(&self) -> Result<CodeReport, DomError> {
        latest_code(self.dom.as_ref(), self.clipboard.as_ref()).await
    }

    /// Fails while the document cannot run agent scripts.
    pub async fn ping(&self) -> Result<PingReply, DomError> {
        Ok(PingReply {
            ok: true,
            host: self.dom.host().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeClipboard;
    use action_locator::fake::{FakeDom, FakeElement};
    use relay_core_types::CodeOrigin;

    #[tokio::test]
    async fn ping_and_latest_code() {
        let dom = FakeDom::new();
        dom.set_host("formbiz.biz");
        dom.append(None, FakeElement::new("pre").text("K9L8M7"));
        let agent = PageAgent::new(Arc::new(dom.clone()), Arc::new(FakeClipboard::new()));

        let reply = agent.ping().await.unwrap();
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({ "ok": true, "host": "formbiz.biz" })
        );

        let report = agent.latest_code().await.unwrap();
        assert_eq!(report.code, "K9L8M7");
        assert_eq!(report.source, CodeOrigin::Scanned);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source"], "scanned");
        assert!(json["copiedAt"].as_i64().unwrap() > 0);

        dom.fail_with(DomError::Script("navigating".into()));
        assert!(agent.ping().await.is_err());
    }
}
