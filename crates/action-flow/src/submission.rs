//! Code submission on the target tab

use page_probes::{classify_outcome, is_disconnected, submit_invite, Outcome};
use relay_core_types::TabHandle;
use relay_state_center::{Phase, TabRole};
use tracing::{info, warn};

use crate::errors::FlowError;
use crate::orchestrator::RelayRun;

impl RelayRun {
    /// Submit `code` on the target tab and classify the result.
    ///
    /// Returns `None` when the run was cancelled along the way. Submission
    /// errors are reported as an `unknown` outcome carrying the reason code.
    pub(crate) async fn submit_code(&self, code: &str) -> Result<Option<Outcome>, FlowError> {
        self.enter(Phase::Submitting, None);

        let target = self.open_tab(TabRole::Target).await?;
        self.focus(&target).await;
        if !self.pause(self.timings().focus_settle()).await {
            return Ok(None);
        }
        if !self.ensure_connected(&target).await? {
            return Ok(None);
        }

        let dom = self.tabs.dom(&target)?;
        match submit_invite(dom.as_ref(), self.policy(), code).await {
            Ok(method) => info!(method = method.as_str(), "code submitted"),
            Err(err) => {
                warn!(%err, "submission failed");
                return Ok(Some(Outcome::unknown(Some(err.reason_code()))));
            }
        }

        if !self.pause(self.timings().submit_settle()).await {
            return Ok(None);
        }
        let outcome = match classify_outcome(dom.as_ref(), self.policy()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, "outcome probe failed");
                Outcome::unknown(None)
            }
        };
        info!(status = ?outcome.status, detail = outcome.detail.as_deref().unwrap_or(""), "outcome");
        Ok(Some(outcome))
    }

    /// Reload the tab when it shows a lost-connection banner. Returns false
    /// when cancelled.
    async fn ensure_connected(&self, tab: &TabHandle) -> Result<bool, FlowError> {
        let dom = self.tabs.dom(tab)?;
        if !is_disconnected(dom.as_ref(), self.policy()).await? {
            return Ok(true);
        }
        warn!(tab = %tab, "target disconnected; reloading");
        self.tabs.reload(tab).await?;
        if !self.pause(self.timings().reconnect_settle()).await {
            return Ok(false);
        }
        self.wait_for_load(tab).await;
        Ok(self.pause(self.timings().reconnect_post_load()).await)
    }
}
