use std::fmt;

use action_locator::DomError;
use chromiumoxide::error::CdpError;
use relay_core_types::{RelayError, TabHandle};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("devtools connection failed")]
    Transport,
    #[error("devtools request timed out")]
    Timeout,
    #[error("tab is gone")]
    TabGone,
    #[error("page script failed")]
    Script,
    #[error("browser setup failed")]
    Setup,
}

/// Adapter failure with an optional human-readable detail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}: {}", self.kind, hint),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn tab_gone(tab: &TabHandle) -> Self {
        Self::new(AdapterErrorKind::TabGone).with_hint(tab.to_string())
    }

    /// Worth retrying the same request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::Timeout | AdapterErrorKind::Transport
        )
    }
}

impl From<CdpError> for AdapterError {
    fn from(err: CdpError) -> Self {
        let kind = match &err {
            CdpError::Timeout => AdapterErrorKind::Timeout,
            CdpError::JavascriptException(_) => AdapterErrorKind::Script,
            CdpError::NotFound | CdpError::FrameNotFound(_) => AdapterErrorKind::TabGone,
            CdpError::Serde(_) => AdapterErrorKind::Setup,
            _ => AdapterErrorKind::Transport,
        };
        AdapterError::new(kind).with_hint(err.to_string())
    }
}

impl From<AdapterError> for RelayError {
    fn from(err: AdapterError) -> Self {
        match err.kind {
            AdapterErrorKind::Script => RelayError::script(err.hint.unwrap_or_default()),
            _ => RelayError::new(err.to_string()),
        }
    }
}

impl From<AdapterError> for DomError {
    fn from(err: AdapterError) -> Self {
        match err.kind {
            AdapterErrorKind::Script => DomError::Script(err.hint.unwrap_or_default()),
            _ => DomError::Transport(err.to_string()),
        }
    }
}
