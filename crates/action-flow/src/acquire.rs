//! Code acquisition on the source tab

use action_locator::{ClickOutcome, DomPort, ElementDescriptor, LocatorError};
use page_probes::{CodeReport, PageAgent};
use relay_core_types::TabHandle;
use relay_state_center::Phase;
use tracing::{debug, warn};

use crate::errors::{AcquireFailure, FlowError};
use crate::orchestrator::RelayRun;
use crate::poll::{poll_until, PollOutcome};

/// Result of one acquisition round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// A code newer than the recorded one; `code` is trimmed and uppercase
    Captured(CodeReport),
    Failed(AcquireFailure),
    Cancelled,
}

impl RelayRun {
    /// Reveal the copy control, click it, and wait for a fresh code.
    pub(crate) async fn acquire_code(&self, source: &TabHandle) -> Result<Acquisition, FlowError> {
        self.enter(Phase::FetchingCode, None);

        let agent = self.tabs.agent(source)?;
        if !self.ensure_agent(source, &agent).await? {
            return Ok(Acquisition::Cancelled);
        }
        if let Err(err) = agent.install_hook().await {
            warn!(%err, "clipboard hook not installed; relying on DOM scan");
        }

        let dom = self.tabs.dom(source)?;
        let profile = &self.profile;
        for attempt in 0..self.timings().max_fetch_clicks {
            if self.signal.is_cancelled() {
                return Ok(Acquisition::Cancelled);
            }
            if self.present(dom.as_ref(), &profile.copy_button).await? {
                break;
            }
            let click = self.press(dom.as_ref(), &profile.fetch_button).await?;
            debug!(attempt, clicked = click.clicked, "fetch control clicked");
            if !self.pause(self.timings().fetch_settle()).await {
                return Ok(Acquisition::Cancelled);
            }
        }

        if !self.present(dom.as_ref(), &profile.copy_button).await? {
            return Ok(Acquisition::Failed(AcquireFailure::SecondButtonNotFound));
        }
        let copy = self.press(dom.as_ref(), &profile.copy_button).await?;
        debug!(clicked = copy.clicked, "copy control clicked");
        if !self.pause(self.timings().copy_settle()).await {
            return Ok(Acquisition::Cancelled);
        }

        let previous = self.state.snapshot();
        let agent = &agent;
        let previous = &previous;
        let outcome = poll_until(
            move || async move {
                let report = match agent.latest_code().await {
                    Ok(report) => report,
                    Err(err) => {
                        debug!(%err, "page agent not ready");
                        return Ok::<_, FlowError>(None);
                    }
                };
                let code = report.code.trim().to_uppercase();
                if !previous.is_newer_code(&code, report.copied_at) {
                    return Ok(None);
                }
                Ok(Some(CodeReport { code, ..report }))
            },
            self.timings().code_poll(),
            &self.signal,
        )
        .await?;

        Ok(match outcome {
            PollOutcome::Ready(report) => Acquisition::Captured(report),
            PollOutcome::Exhausted => Acquisition::Failed(AcquireFailure::CodeNotCaptured),
            PollOutcome::Cancelled => Acquisition::Cancelled,
        })
    }

    /// Ping the page agent; reload the source tab once when it does not
    /// answer. False when cancelled during the reload.
    async fn ensure_agent(
        &self,
        source: &TabHandle,
        agent: &PageAgent,
    ) -> Result<bool, FlowError> {
        match agent.ping().await {
            Ok(reply) => {
                debug!(host = %reply.host, "page agent answered");
                return Ok(true);
            }
            Err(err) => warn!(tab = %source, %err, "page agent unreachable; reloading source"),
        }
        self.tabs.reload(source).await?;
        if !self.pause(self.timings().reconnect_settle()).await {
            return Ok(false);
        }
        self.wait_for_load(source).await;
        Ok(true)
    }

    /// Whether `descriptor` resolves; a page that moved mid-lookup reads as absent.
    async fn present(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<bool, FlowError> {
        match self.locator.exists(dom, descriptor).await {
            Ok(found) => Ok(found),
            Err(err) => stale_or(err, false),
        }
    }

    /// Click `descriptor`; a page that moved mid-click reads as a miss.
    async fn press(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<ClickOutcome, FlowError> {
        match self.locator.click(dom, descriptor).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => stale_or(err, ClickOutcome::missed()),
        }
    }
}

fn stale_or<T>(err: LocatorError, fallback: T) -> Result<T, FlowError> {
    if err.is_stale() {
        debug!(%err, "page changed under the locator");
        return Ok(fallback);
    }
    Err(err.into())
}
