use std::sync::Arc;
use std::time::Instant;

use action_flow::RelayController;

#[derive(Clone)]
pub struct ServeState {
    pub(crate) controller: Arc<RelayController>,
    /// DevTools endpoint the relay is attached to, if any
    pub(crate) ws_url: Option<String>,
    started_at: Instant,
}

impl ServeState {
    pub fn new(controller: Arc<RelayController>, ws_url: Option<String>) -> Self {
        Self {
            controller,
            ws_url,
            started_at: Instant::now(),
        }
    }

    pub fn controller(&self) -> &Arc<RelayController> {
        &self.controller
    }

    pub(crate) fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
