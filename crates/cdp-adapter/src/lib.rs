//! Chromium DevTools Protocol adapter for the invite relay.
//!
//! Attaches to (or launches) Chromium through `chromiumoxide`, hands out tab
//! handles, and exposes each tab as a [`DomPort`](action_locator::DomPort)
//! and a [`ClipboardPort`](page_probes::ClipboardPort) backed by page
//! scripts.

pub mod browser;
pub mod clipboard;
pub mod config;
pub mod dom;
pub mod error;
pub mod registry;
pub mod scripts;

pub use browser::ChromiumBrowser;
pub use clipboard::ChromiumClipboard;
pub use config::{detect_chrome_executable, CdpConfig};
pub use dom::ChromiumDom;
pub use error::{AdapterError, AdapterErrorKind};
pub use registry::Registry;
