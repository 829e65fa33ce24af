//! Relay orchestration
//!
//! Drives one automation run at a time: open the code source, reveal and
//! copy a fresh code, hand it to the target site, read the verdict, and
//! retry until the target accepts a code or the run is stopped.

pub mod acquire;
pub mod controller;
pub mod errors;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod messages;
pub mod orchestrator;
pub mod poll;
pub mod ports;
pub mod profile;
pub mod submission;
pub mod timings;

pub use acquire::Acquisition;
pub use controller::RelayController;
pub use errors::{AcquireFailure, FlowError};
pub use messages::{ControlRequest, ControlResponse};
pub use orchestrator::{RelayRun, RunEnd};
pub use poll::{poll_until, sleep_or_cancel, PollBudget, PollOutcome, PollSpec, RunSignal};
pub use ports::{LoadState, TabPort};
pub use profile::RelayProfile;
pub use timings::RelayTimings;
