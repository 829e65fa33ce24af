use relay_state_center::RunState;
use serde::{Deserialize, Serialize};

/// Control messages accepted by the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    StartAutomation,
    StopAutomation,
    GetState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Ack { success: bool },
    State { state: RunState },
}

impl ControlResponse {
    pub fn ack() -> Self {
        ControlResponse::Ack { success: true }
    }
}
