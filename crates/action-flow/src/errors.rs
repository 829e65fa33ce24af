//! Run error types

use action_locator::{DomError, LocatorError};
use relay_core_types::RelayError;
use thiserror::Error;

/// Errors that end a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// No tab could be found or opened for a site
    #[error("could not open a tab for {url}: {source}")]
    TabUnavailable { url: String, source: RelayError },

    /// Tab-level operation failed (reload, page access)
    #[error("tab operation failed: {0}")]
    Tab(#[from] RelayError),

    /// Element lookup or click failed below the locator
    #[error("page interaction failed: {0}")]
    Locator(#[from] LocatorError),

    /// A page probe could not run
    #[error("page probe failed: {0}")]
    Probe(#[from] DomError),
}

/// Recoverable acquisition failures; the loop backs off and retries.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcquireFailure {
    #[error("copy control did not appear")]
    SecondButtonNotFound,
    #[error("no fresh code was captured")]
    CodeNotCaptured,
}

impl AcquireFailure {
    pub fn reason_code(&self) -> &'static str {
        match self {
            AcquireFailure::SecondButtonNotFound => "second-button-not-found",
            AcquireFailure::CodeNotCaptured => "code-not-captured",
        }
    }
}
