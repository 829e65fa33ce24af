//! Page probes - scripted checks and actions run inside a single tab
//!
//! - invite submission ([`submit_invite`])
//! - post-submission verdicts ([`classify_outcome`])
//! - lost-connection detection ([`is_disconnected`])
//! - code capture from clipboard writes and DOM scans ([`latest_code`])
//! - the page-side agent with its liveness ping ([`PageAgent`])

pub mod agent;
pub mod capture;
pub mod connectivity;
pub mod errors;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod outcome;
pub mod policy;
pub mod submit;

pub use agent::{PageAgent, PingReply};
pub use capture::{
    collect_candidates, latest_code, scan_code_candidates, ClipboardPort, CodeReport, CopiedText,
};
pub use connectivity::is_disconnected;
pub use errors::SubmitError;
pub use outcome::{classify_outcome, classify_text, Outcome, OutcomeStatus, INPUT_ABSENT_DETAIL};
pub use policy::ProbePolicy;
pub use submit::{find_invite_input, submit_invite, SubmitMethod};
