use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core_types::{now_millis, CodeOrigin, RunId, TabHandle};
use relay_event_bus::{EventBus, InMemoryBus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Named step of the automation state machine.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Idle,
    Initializing,
    SourceReady,
    FetchingCode,
    AcquireWait,
    CodeAcquired,
    Submitting,
    UnknownWait,
    RetryWait,
    Success,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Initializing => "initializing",
            Phase::SourceReady => "source-ready",
            Phase::FetchingCode => "fetching-code",
            Phase::AcquireWait => "acquire-wait",
            Phase::CodeAcquired => "code-acquired",
            Phase::Submitting => "submitting",
            Phase::UnknownWait => "unknown-wait",
            Phase::RetryWait => "retry-wait",
            Phase::Success => "success",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single mutable record describing the automation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub active: bool,
    pub source_tab_handle: Option<TabHandle>,
    pub target_tab_handle: Option<TabHandle>,
    pub phase: Phase,
    /// Uppercase, trimmed
    pub last_code: String,
    pub code_origin: Option<CodeOrigin>,
    /// Epoch milliseconds, 0 when no code was captured
    pub last_code_observed_at: i64,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub run_id: Option<RunId>,
}

impl RunState {
    /// A code is new when its value differs from the current one, or when
    /// the same value was observed strictly later.
    pub fn is_newer_code(&self, code: &str, observed_at: i64) -> bool {
        !code.is_empty() && (code != self.last_code || observed_at > self.last_code_observed_at)
    }

    pub fn set_tab(&mut self, role: TabRole, handle: TabHandle) {
        match role {
            TabRole::Source => self.source_tab_handle = Some(handle),
            TabRole::Target => self.target_tab_handle = Some(handle),
        }
    }

    fn owned_by(&self, run_id: RunId) -> bool {
        self.active && self.run_id == Some(run_id)
    }

    fn clear_code(&mut self) {
        self.last_code.clear();
        self.code_origin = None;
        self.last_code_observed_at = 0;
    }
}

/// Broadcast after every mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename = "stateUpdate")]
pub struct StateUpdate {
    pub state: RunState,
}

/// How a run is stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopOptions {
    /// Keep phase, code and error fields as they are.
    pub preserve_state: bool,
    /// Recorded as the last error.
    pub error: Option<String>,
}

impl StopOptions {
    pub fn preserve() -> Self {
        Self {
            preserve_state: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            preserve_state: false,
            error: Some(error.into()),
        }
    }
}

/// Sole owner of the [`RunState`].
///
/// Every mutation goes through [`StateCenter::update`], which publishes a
/// [`StateUpdate`] once the lock is released. Publishing never fails; an
/// update with no listener is dropped.
pub struct StateCenter {
    state: Mutex<RunState>,
    bus: Arc<InMemoryBus<StateUpdate>>,
}

impl StateCenter {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RunState::default()),
            bus: InMemoryBus::new(capacity),
        })
    }

    pub fn snapshot(&self) -> RunState {
        self.state.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.bus.subscribe()
    }

    /// Apply `mutate` under the lock and broadcast the resulting snapshot.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut RunState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = mutate(&mut state);
            if state.phase == Phase::Idle {
                state.active = false;
            }
            (result, state.clone())
        };
        let delivered = self.bus.publish(StateUpdate { state: snapshot });
        debug!(delivered, "state update published");
        result
    }

    /// Re-broadcast the current state without changing it.
    pub fn notify(&self) {
        self.update(|_| ());
    }

    /// Restore defaults.
    pub fn reset(&self) {
        self.update(|state| *state = RunState::default());
    }

    pub fn set_phase(&self, phase: Phase) {
        self.update(|state| state.phase = phase);
    }

    /// Enter a phase with an error (or none) recorded alongside.
    pub fn transition(&self, phase: Phase, error: Option<String>) {
        self.update(|state| {
            state.phase = phase;
            state.last_error = error;
        });
    }

    /// Mark a new run as active. Returns false when one already is.
    pub fn begin_run(&self, run_id: RunId) -> bool {
        self.update(|state| {
            if state.active {
                return false;
            }
            state.active = true;
            state.attempt_count = 0;
            state.last_error = None;
            state.clear_code();
            state.run_id = Some(run_id);
            state.phase = Phase::Initializing;
            true
        })
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Deactivate. Unless preserving, return to idle with the code fields
    /// cleared and the supplied error (if any) recorded.
    /// Whether `run_id` is the active run.
    pub fn owns_run(&self, run_id: RunId) -> bool {
        self.state.lock().owned_by(run_id)
    }

    pub fn stop(&self, options: StopOptions) {
        self.update(|state| apply_stop(state, options));
    }

    /// Record a freshly captured code if it is new.
    ///
    /// `observed_at` of 0 is replaced by the current time. Returns whether
    /// the state changed.
    pub fn accept_code(&self, code: &str, origin: CodeOrigin, observed_at: i64) -> bool {
        self.apply_code(None, code, origin, observed_at)
    }

    /// [`accept_code`](Self::accept_code) restricted to the active run `run_id`.
    pub fn accept_run_code(
        &self,
        run_id: RunId,
        code: &str,
        origin: CodeOrigin,
        observed_at: i64,
    ) -> bool {
        self.apply_code(Some(run_id), code, origin, observed_at)
    }

    fn apply_code(
        &self,
        run_id: Option<RunId>,
        code: &str,
        origin: CodeOrigin,
        observed_at: i64,
    ) -> bool {
        let code = code.trim().to_uppercase();
        let observed_at = if observed_at > 0 {
            observed_at
        } else {
            now_millis()
        };
        let snapshot = {
            let mut state = self.state.lock();
            if let Some(run_id) = run_id {
                if !state.owned_by(run_id) {
                    return false;
                }
            }
            if !state.is_newer_code(&code, observed_at) {
                return false;
            }
            state.last_code = code;
            state.code_origin = Some(origin);
            state.last_code_observed_at = observed_at;
            state.last_error = None;
            state.phase = Phase::CodeAcquired;
            state.clone()
        };
        self.bus.publish(StateUpdate { state: snapshot });
        true
    }

    /// Apply `mutate` only while `run_id` is the active run. Writes from a
    /// stopped or replaced run are dropped.
    pub fn update_run<R>(
        &self,
        run_id: RunId,
        mutate: impl FnOnce(&mut RunState) -> R,
    ) -> Option<R> {
        let (result, snapshot) = {
            let mut state = self.state.lock();
            if !state.owned_by(run_id) {
                debug!(%run_id, "dropping write from inactive run");
                return None;
            }
            let result = mutate(&mut state);
            if state.phase == Phase::Idle {
                state.active = false;
            }
            (result, state.clone())
        };
        self.bus.publish(StateUpdate { state: snapshot });
        Some(result)
    }

    /// [`stop`](Self::stop) restricted to the active run `run_id`.
    pub fn stop_run(&self, run_id: RunId, options: StopOptions) -> bool {
        self.update_run(run_id, |state| apply_stop(state, options))
            .is_some()
    }

    pub fn record_tab(&self, role: TabRole, handle: TabHandle) {
        self.update(|state| state.set_tab(role, handle));
    }
}

fn apply_stop(state: &mut RunState, options: StopOptions) {
    state.active = false;
    if options.preserve_state {
        if let Some(error) = options.error {
            state.last_error = Some(error);
        }
        return;
    }
    state.phase = Phase::Idle;
    state.clear_code();
    state.last_error = options.error;
}

/// Which of the two sites a tab belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TabRole {
    Source,
    Target,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_code_never_overwrites() {
        let center = StateCenter::new(16);
        assert!(center.accept_code("abc123", CodeOrigin::Intercepted, 100));
        assert!(!center.accept_code("ABC123", CodeOrigin::Intercepted, 90));
        assert_eq!(center.snapshot().last_code_observed_at, 100);
        assert!(!center.accept_code("ABC123", CodeOrigin::Intercepted, 100));

        assert!(center.accept_code("ABC123", CodeOrigin::Scanned, 150));
        let state = center.snapshot();
        assert_eq!(state.last_code, "ABC123");
        assert_eq!(state.last_code_observed_at, 150);
        assert_eq!(state.code_origin, Some(CodeOrigin::Scanned));
        assert_eq!(state.phase, Phase::CodeAcquired);

        assert!(center.accept_code("ZZZ999", CodeOrigin::Scanned, 10));
        assert!(!center.accept_code("  ", CodeOrigin::Scanned, 500));
    }

    #[test]
    fn zero_observation_time_falls_back_to_now() {
        let center = StateCenter::new(16);
        let before = now_millis();
        assert!(center.accept_code("Q1W2E3", CodeOrigin::Scanned, 0));
        assert!(center.snapshot().last_code_observed_at >= before);
    }

    #[test]
    fn begin_run_is_exclusive() {
        let center = StateCenter::new(16);
        center.update(|state| {
            state.attempt_count = 4;
            state.last_error = Some("old".into());
            state.last_code = "OLD111".into();
        });
        assert!(center.begin_run(RunId::new()));
        let state = center.snapshot();
        assert!(state.active);
        assert_eq!(state.phase, Phase::Initializing);
        assert_eq!(state.attempt_count, 0);
        assert!(state.last_error.is_none());
        assert!(state.last_code.is_empty());
        assert!(state.run_id.is_some());

        assert!(!center.begin_run(RunId::new()));
        assert_eq!(center.snapshot().run_id, state.run_id);
    }

    #[test]
    fn stop_without_preserve_resets() {
        let center = StateCenter::new(16);
        center.begin_run(RunId::new());
        center.accept_code("ABC123", CodeOrigin::Intercepted, 100);
        center.transition(Phase::UnknownWait, Some("waiting".into()));

        center.stop(StopOptions::default());
        let state = center.snapshot();
        assert!(!state.active);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.last_code.is_empty());
        assert_eq!(state.last_code_observed_at, 0);
        assert!(state.code_origin.is_none());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn stop_with_preserve_keeps_fields() {
        let center = StateCenter::new(16);
        center.begin_run(RunId::new());
        center.accept_code("ABC123", CodeOrigin::Intercepted, 100);
        center.set_phase(Phase::Success);

        center.stop(StopOptions::preserve());
        let state = center.snapshot();
        assert!(!state.active);
        assert_eq!(state.phase, Phase::Success);
        assert_eq!(state.last_code, "ABC123");
        assert_eq!(state.last_code_observed_at, 100);
    }

    #[test]
    fn failed_stop_keeps_error() {
        let center = StateCenter::new(16);
        center.begin_run(RunId::new());
        center.stop(StopOptions::failed("tab creation failed"));
        let state = center.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.last_error.as_deref(), Some("tab creation failed"));
    }

    #[test]
    fn stopped_run_cannot_write() {
        let center = StateCenter::new(16);
        let run_id = RunId::new();
        center.begin_run(run_id);
        assert!(center.owns_run(run_id));
        assert_eq!(
            center.update_run(run_id, |state| state.phase = Phase::FetchingCode),
            Some(())
        );
        center.stop(StopOptions::default());
        assert!(!center.owns_run(run_id));

        assert!(center
            .update_run(run_id, |state| state.phase = Phase::AcquireWait)
            .is_none());
        assert!(!center.accept_run_code(run_id, "ABC123", CodeOrigin::Scanned, 10));
        assert!(!center.stop_run(run_id, StopOptions::failed("late")));
        let state = center.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.last_error.is_none());
        assert!(state.last_code.is_empty());

        let next = RunId::new();
        center.begin_run(next);
        assert!(center.update_run(run_id, |_| ()).is_none());
        assert!(center.accept_run_code(next, "ABC123", CodeOrigin::Scanned, 10));
    }

    #[test]
    fn idle_is_never_active() {
        let center = StateCenter::new(16);
        center.update(|state| {
            state.active = true;
            state.phase = Phase::Idle;
        });
        assert!(!center.is_active());
    }

    #[tokio::test]
    async fn every_mutation_is_broadcast() {
        let center = StateCenter::new(16);
        center.set_phase(Phase::Initializing);

        let mut updates = center.subscribe();
        center.record_tab(TabRole::Source, TabHandle::new("tab-1"));
        center.set_phase(Phase::SourceReady);

        let first = updates.recv().await.unwrap();
        assert_eq!(
            first.state.source_tab_handle,
            Some(TabHandle::new("tab-1"))
        );
        let second = updates.recv().await.unwrap();
        assert_eq!(second.state.phase, Phase::SourceReady);
    }

    #[test]
    fn wire_format() {
        let update = StateUpdate {
            state: RunState {
                phase: Phase::FetchingCode,
                code_origin: Some(CodeOrigin::Scanned),
                ..RunState::default()
            },
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["action"], "stateUpdate");
        assert_eq!(json["state"]["phase"], "fetching-code");
        assert_eq!(json["state"]["codeOrigin"], "scanned");
        assert_eq!(json["state"]["lastCodeObservedAt"], 0);
        assert_eq!(json["state"]["sourceTabHandle"], serde_json::Value::Null);
    }
}
