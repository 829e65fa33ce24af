use action_locator::DomError;
use relay_core_types::RelayError;
use thiserror::Error;

/// Why an invite submission could not be carried out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("no invite input on the page")]
    InviteInputNotFound,
    #[error("submission failed")]
    SubmitFailed,
    #[error("submission script failed: {0}")]
    Script(String),
}

impl SubmitError {
    /// Short code recorded as the run's last error.
    pub fn reason_code(&self) -> String {
        match self {
            SubmitError::InviteInputNotFound => "invite-input-not-found".to_string(),
            SubmitError::SubmitFailed => "submit-failed".to_string(),
            SubmitError::Script(message) => message.clone(),
        }
    }
}

impl From<DomError> for SubmitError {
    fn from(err: DomError) -> Self {
        let message = match err {
            DomError::Script(message) => message,
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            SubmitError::SubmitFailed
        } else {
            SubmitError::Script(message)
        }
    }
}

impl From<SubmitError> for RelayError {
    fn from(err: SubmitError) -> Self {
        RelayError::new(err.reason_code())
    }
}
