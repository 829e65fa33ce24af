//! Error types for the locator system

use relay_core_types::RelayError;
use thiserror::Error;

use crate::types::NodeRef;

/// Failures reported by a [`DomPort`](crate::DomPort).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomError {
    /// The selector or path expression was rejected by the page
    #[error("invalid query '{0}'")]
    InvalidQuery(String),

    /// The node went away between lookup and use
    #[error("{0} is detached")]
    Detached(NodeRef),

    /// The page-side script threw
    #[error("script error: {0}")]
    Script(String),

    /// The browser connection failed
    #[error("transport error: {0}")]
    Transport(String),
}

impl DomError {
    /// Query errors are local to one hint and never abort a resolution.
    pub fn is_query_error(&self) -> bool {
        matches!(self, DomError::InvalidQuery(_))
    }
}

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Page access failed while resolving
    #[error("dom access failed: {0}")]
    Dom(#[from] DomError),
}

impl LocatorError {
    /// The page moved under the locator; resolving again may succeed.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            LocatorError::Dom(DomError::Detached(_) | DomError::InvalidQuery(_))
        )
    }
}

impl From<LocatorError> for RelayError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::Dom(DomError::Script(message)) => RelayError::script(message),
            other => RelayError::new(other.to_string()),
        }
    }
}

impl From<DomError> for RelayError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::Script(message) => RelayError::script(message),
            other => RelayError::new(other.to_string()),
        }
    }
}
