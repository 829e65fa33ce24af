//! Invite relay
//!
//! Moves single-use invitation codes from a code-generation site into a
//! target intake form, one code at a time, until the target accepts one.
//! The workspace crates hold the automation; this crate wires them to a
//! real browser and exposes the `run` and `serve` commands.

pub mod cli;
pub mod config;
pub mod l0_bridge;
pub mod server;

pub use config::{RelayConfig, ServeConfig};
pub use l0_bridge::CdpTabs;
pub use server::{build_router, ServeState};
