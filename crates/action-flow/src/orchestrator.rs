//! Automation run loop

use std::sync::Arc;

use action_locator::ElementLocator;
use page_probes::{OutcomeStatus, ProbePolicy};
use relay_core_types::{RunId, TabHandle};
use relay_state_center::{Phase, RunState, StateCenter, StopOptions, TabRole};
use tracing::{debug, error, info, instrument, warn};

use crate::acquire::Acquisition;
use crate::errors::FlowError;
use crate::poll::{poll_until, sleep_or_cancel, PollOutcome, RunSignal};
use crate::ports::{LoadState, TabPort};
use crate::profile::RelayProfile;
use crate::timings::RelayTimings;

/// How a run ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunEnd {
    Succeeded,
    Cancelled,
}

/// One automation run, from locating the source tab to success or stop.
pub struct RelayRun {
    pub(crate) run_id: RunId,
    pub(crate) tabs: Arc<dyn TabPort>,
    pub(crate) state: Arc<StateCenter>,
    pub(crate) profile: Arc<RelayProfile>,
    pub(crate) locator: ElementLocator,
    pub(crate) signal: RunSignal,
}

impl RelayRun {
    pub fn new(
        run_id: RunId,
        tabs: Arc<dyn TabPort>,
        state: Arc<StateCenter>,
        profile: Arc<RelayProfile>,
        signal: RunSignal,
    ) -> Self {
        Self {
            run_id,
            tabs,
            state,
            profile,
            locator: ElementLocator::new(),
            signal,
        }
    }

    pub(crate) fn timings(&self) -> &RelayTimings {
        &self.profile.timings
    }

    pub(crate) fn policy(&self) -> &ProbePolicy {
        &self.profile.probes
    }

    /// Write to the run state while this run still owns it.
    pub(crate) fn write<R>(&self, mutate: impl FnOnce(&mut RunState) -> R) -> Option<R> {
        self.state.update_run(self.run_id, mutate)
    }

    pub(crate) fn enter(&self, phase: Phase, error: Option<String>) {
        info!(phase = %phase, error = error.as_deref().unwrap_or(""), "phase");
        self.write(|state| {
            state.phase = phase;
            state.last_error = error;
        });
    }

    /// Sleep unless cancelled; false when the run should stop.
    pub(crate) async fn pause(&self, duration: std::time::Duration) -> bool {
        sleep_or_cancel(duration, &self.signal).await
    }

    /// Drive the run to completion and record how it ended.
    #[instrument(name = "relay_run", skip_all, fields(run_id = %self.run_id))]
    pub async fn run(self) -> Result<RunEnd, FlowError> {
        let result = self.drive().await;
        match &result {
            Ok(RunEnd::Succeeded) => info!("invite code accepted"),
            Ok(RunEnd::Cancelled) => info!("run cancelled"),
            Err(err) => {
                error!(%err, "run failed");
                self.state
                    .stop_run(self.run_id, StopOptions::failed(err.to_string()));
            }
        }
        result
    }

    async fn drive(&self) -> Result<RunEnd, FlowError> {
        let source = self.open_tab(TabRole::Source).await?;
        self.focus(&source).await;
        self.enter(Phase::SourceReady, None);
        if !self.pause(self.timings().initial_settle()).await {
            return Ok(RunEnd::Cancelled);
        }

        loop {
            if self.signal.is_cancelled() {
                return Ok(RunEnd::Cancelled);
            }

            let report = match self.acquire_code(&source).await? {
                Acquisition::Captured(report) => report,
                Acquisition::Failed(failure) => {
                    warn!(reason = failure.reason_code(), "acquisition failed");
                    self.enter(Phase::AcquireWait, Some(failure.reason_code().to_string()));
                    if !self.pause(self.timings().acquire_backoff()).await {
                        return Ok(RunEnd::Cancelled);
                    }
                    continue;
                }
                Acquisition::Cancelled => return Ok(RunEnd::Cancelled),
            };

            if self.signal.is_cancelled() {
                return Ok(RunEnd::Cancelled);
            }
            if !self.state.accept_run_code(
                self.run_id,
                &report.code,
                report.source,
                report.copied_at,
            ) {
                if !self.state.owns_run(self.run_id) {
                    info!(code = %report.code, "run no longer owns the state; not submitting");
                    return Ok(RunEnd::Cancelled);
                }
                debug!(code = %report.code, "code already recorded; acquiring again");
                continue;
            }
            info!(code = %report.code, source = %report.source, "code acquired");

            let Some(outcome) = self.submit_code(&report.code).await? else {
                return Ok(RunEnd::Cancelled);
            };
            if self.signal.is_cancelled() {
                return Ok(RunEnd::Cancelled);
            }

            match outcome.status {
                OutcomeStatus::Success => {
                    info!(detail = outcome.detail.as_deref().unwrap_or(""), "submission succeeded");
                    self.write(|state| {
                        state.phase = Phase::Success;
                        state.last_error = None;
                        state.active = false;
                    });
                    return Ok(RunEnd::Succeeded);
                }
                OutcomeStatus::Unknown => {
                    let reason = outcome.detail.unwrap_or_else(|| "waiting".to_string());
                    self.enter(Phase::UnknownWait, Some(reason));
                    if !self.pause(self.timings().unknown_backoff()).await {
                        return Ok(RunEnd::Cancelled);
                    }
                }
                OutcomeStatus::Failure => {
                    let reason = outcome.detail.unwrap_or_else(|| "invalid-code".to_string());
                    warn!(reason = %reason, "code rejected");
                    self.write(|state| {
                        state.attempt_count += 1;
                        state.phase = Phase::RetryWait;
                        state.last_error = Some(reason);
                    });
                    self.mark_invalid(&source).await;
                    if !self.pause(self.timings().failure_backoff()).await {
                        return Ok(RunEnd::Cancelled);
                    }
                }
            }
        }
    }

    /// Find or open the tab for `role`, record it, and wait for it to load.
    pub(crate) async fn open_tab(&self, role: TabRole) -> Result<TabHandle, FlowError> {
        let site = match role {
            TabRole::Source => &self.profile.source,
            TabRole::Target => &self.profile.target,
        };
        let tab = self
            .tabs
            .find_or_create(site)
            .await
            .map_err(|source| FlowError::TabUnavailable {
                url: site.url.clone(),
                source,
            })?;
        self.write(|state| state.set_tab(role, tab.clone()));
        if !self.wait_for_load(&tab).await {
            warn!(tab = %tab, "tab did not finish loading in time");
        }
        Ok(tab)
    }

    /// True once the tab reports a complete document within the budget.
    pub(crate) async fn wait_for_load(&self, tab: &TabHandle) -> bool {
        let tabs = self.tabs.as_ref();
        let outcome = poll_until(
            move || async move {
                tabs.load_state(tab)
                    .await
                    .map(|state| (state == LoadState::Complete).then_some(()))
            },
            self.timings().tab_load(),
            &self.signal,
        )
        .await;
        match outcome {
            Ok(PollOutcome::Ready(())) => true,
            Ok(_) => false,
            Err(err) => {
                warn!(tab = %tab, %err, "tab state unavailable");
                false
            }
        }
    }

    pub(crate) async fn focus(&self, tab: &TabHandle) {
        if let Err(err) = self.tabs.focus(tab).await {
            warn!(tab = %tab, %err, "could not focus tab");
        }
    }

    /// Best effort; the next acquisition recovers from a missed mark.
    async fn mark_invalid(&self, source: &TabHandle) {
        self.focus(source).await;
        let dom = match self.tabs.dom(source) {
            Ok(dom) => dom,
            Err(err) => {
                warn!(%err, "source tab unavailable for mark-invalid");
                return;
            }
        };
        match self
            .locator
            .click(dom.as_ref(), &self.profile.mark_invalid_button)
            .await
        {
            Ok(outcome) if outcome.clicked => {}
            Ok(_) => warn!("mark-invalid control not found"),
            Err(err) => warn!(%err, "mark-invalid click failed"),
        }
    }
}
