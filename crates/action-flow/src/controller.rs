use std::sync::Arc;

use parking_lot::Mutex;
use relay_core_types::RunId;
use relay_state_center::{RunState, StateCenter, StateUpdate, StopOptions};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::messages::{ControlRequest, ControlResponse};
use crate::orchestrator::RelayRun;
use crate::poll::RunSignal;
use crate::ports::TabPort;
use crate::profile::RelayProfile;

struct RunHandle {
    run_id: RunId,
    signal: RunSignal,
    /// Cancelled when the run task exits, including on panic
    finished: CancellationToken,
}

/// Start/stop entry point owning the single run task.
pub struct RelayController {
    tabs: Arc<dyn TabPort>,
    state: Arc<StateCenter>,
    profile: Arc<RelayProfile>,
    current: Mutex<Option<RunHandle>>,
}

impl RelayController {
    pub fn new(
        tabs: Arc<dyn TabPort>,
        state: Arc<StateCenter>,
        profile: RelayProfile,
    ) -> Arc<Self> {
        Arc::new(Self {
            tabs,
            state,
            profile: Arc::new(profile),
            current: Mutex::new(None),
        })
    }

    pub fn profile(&self) -> &RelayProfile {
        &self.profile
    }

    /// Start a run. A no-op returning false while a run is active or a
    /// previous run task has not finished yet. Must be called inside a
    /// Tokio runtime.
    pub fn start(&self) -> bool {
        let mut current = self.current.lock();
        if let Some(handle) = current.as_ref() {
            if !handle.finished.is_cancelled() {
                debug!(run_id = %handle.run_id, "run still in progress; start ignored");
                return false;
            }
        }

        let run_id = RunId::new();
        if !self.state.begin_run(run_id) {
            return false;
        }

        let signal = RunSignal::new();
        let finished = CancellationToken::new();
        let run = RelayRun::new(
            run_id,
            self.tabs.clone(),
            self.state.clone(),
            self.profile.clone(),
            signal.clone(),
        );
        let guard = finished.clone().drop_guard();
        tokio::spawn(async move {
            let _guard = guard;
            let _ = run.run().await;
        });
        info!(%run_id, "automation started");

        *current = Some(RunHandle {
            run_id,
            signal,
            finished,
        });
        true
    }

    /// Cancel the current run and update the state per `options`.
    pub fn stop(&self, options: StopOptions) {
        if let Some(handle) = self.current.lock().as_ref() {
            handle.signal.cancel();
            info!(run_id = %handle.run_id, "automation stopped");
        }
        self.state.stop(options);
    }

    pub fn state(&self) -> RunState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.state.subscribe()
    }

    /// True while a run task is alive.
    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.finished.is_cancelled())
    }

    /// Wait for the current run task, if any, to exit.
    pub async fn wait(&self) {
        let finished = self
            .current
            .lock()
            .as_ref()
            .map(|handle| handle.finished.clone());
        if let Some(finished) = finished {
            finished.cancelled().await;
        }
    }

    pub fn handle(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::StartAutomation => {
                self.start();
                ControlResponse::ack()
            }
            ControlRequest::StopAutomation => {
                self.stop(StopOptions::default());
                ControlResponse::ack()
            }
            ControlRequest::GetState => ControlResponse::State {
                state: self.state(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_state_center::Phase;

    use super::*;
    use crate::fake::{CodeSourceFixture, FakeTabs, TargetFixture, Verdict};
    use crate::timings::RelayTimings;

    fn controller(source: &CodeSourceFixture, target: &TargetFixture) -> Arc<RelayController> {
        let tabs = FakeTabs::new();
        tabs.open("https://formbiz.biz/", source.page.clone());
        tabs.prepare("https://sora.chatgpt.com/explore", target.page.clone());
        let profile = RelayProfile {
            timings: RelayTimings::quick(),
            ..RelayProfile::default()
        };
        RelayController::new(tabs, StateCenter::new(64), profile)
    }

    async fn settle(controller: &RelayController) {
        tokio::time::timeout(Duration::from_secs(5), controller.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_is_a_no_op_while_running() {
        let source = CodeSourceFixture::inert(&[]);
        let controller = controller(&source, &TargetFixture::new(vec![]));

        assert!(controller.start());
        let run_id = controller.state().run_id;
        assert!(!controller.start());
        assert_eq!(controller.state().run_id, run_id);
        assert!(controller.is_running());

        controller.stop(StopOptions::default());
        settle(&controller).await;
        assert!(!controller.is_running());

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.last_code.is_empty());

        assert!(controller.start());
        assert_ne!(controller.state().run_id, run_id);
        controller.stop(StopOptions::default());
        settle(&controller).await;
    }

    #[tokio::test]
    async fn success_keeps_the_accepted_code() {
        let source = CodeSourceFixture::new(&["QWE789"]);
        let target = TargetFixture::new(vec![Verdict::Accept]);
        let controller = controller(&source, &target);

        assert!(controller.start());
        settle(&controller).await;

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.phase, Phase::Success);
        assert_eq!(state.last_code, "QWE789");
    }

    #[tokio::test]
    async fn preserved_stop_keeps_progress() {
        let source = CodeSourceFixture::new(&["AAA111"]);
        let target = TargetFixture::new(vec![]);
        let controller = controller(&source, &target);
        let mut updates = controller.subscribe();

        assert!(controller.start());
        tokio::time::timeout(Duration::from_secs(5), async {
            while updates.recv().await.unwrap().state.phase != Phase::UnknownWait {}
        })
        .await
        .unwrap();

        controller.stop(StopOptions::preserve());
        settle(&controller).await;

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.last_code, "AAA111");
        assert_ne!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn handles_control_messages() {
        let source = CodeSourceFixture::inert(&[]);
        let controller = controller(&source, &TargetFixture::new(vec![]));

        assert_eq!(
            controller.handle(ControlRequest::StartAutomation),
            ControlResponse::ack()
        );
        let ControlResponse::State { state } = controller.handle(ControlRequest::GetState) else {
            panic!("expected a state reply");
        };
        assert!(state.active);

        assert_eq!(
            controller.handle(ControlRequest::StopAutomation),
            ControlResponse::ack()
        );
        settle(&controller).await;
        assert!(!controller.state().active);
    }
}
