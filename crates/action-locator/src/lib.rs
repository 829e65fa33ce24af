//! Element location - layered resolution of page controls
//!
//! This crate turns declarative [`ElementDescriptor`]s into concrete nodes:
//! - CSS selector resolution (primary strategy)
//! - XPath fallback (structural)
//! - Keyword fallback over buttons and links (semantic matching)
//! - Candidate selection preferring clickable, rendered elements
//!
//! Page access goes through the [`DomPort`] trait so the same logic runs
//! against a live browser tab or the in-memory [`fake::FakeDom`].

pub mod dom;
pub mod errors;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use dom::*;
pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
