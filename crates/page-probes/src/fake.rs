//! In-memory clipboard for tests.

use std::sync::Arc;

use action_locator::DomError;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capture::{ClipboardPort, CopiedText};

#[derive(Default)]
struct ClipboardState {
    installed: bool,
    installs: usize,
    last: Option<CopiedText>,
    failure: Option<DomError>,
}

/// Clipboard that only records writes once the hook is installed, like the
/// page-side sniffer.
#[derive(Clone, Default)]
pub struct FakeClipboard {
    state: Arc<Mutex<ClipboardState>>,
}

impl FakeClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page-side clipboard write. Returns whether the hook saw it.
    pub fn copy(&self, text: &str, copied_at: i64) -> bool {
        let mut state = self.state.lock();
        if !state.installed {
            return false;
        }
        state.last = Some(CopiedText {
            text: text.to_string(),
            copied_at,
        });
        true
    }

    /// Simulates a page reload: the hook and the captured text are lost.
    pub fn reload(&self) {
        let mut state = self.state.lock();
        state.installed = false;
        state.last = None;
    }

    /// Calls to `install_hook` that actually installed it.
    pub fn installs(&self) -> usize {
        self.state.lock().installs
    }

    pub fn fail_with(&self, err: DomError) {
        self.state.lock().failure = Some(err);
    }

    pub fn clear_failure(&self) {
        self.state.lock().failure = None;
    }
}

#[async_trait]
impl ClipboardPort for FakeClipboard {
    async fn install_hook(&self) -> Result<(), DomError> {
        let mut state = self.state.lock();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        if !state.installed {
            state.installed = true;
            state.installs += 1;
        }
        Ok(())
    }

    async fn last_copied(&self) -> Result<Option<CopiedText>, DomError> {
        let state = self.state.lock();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        Ok(state.last.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hook_is_idempotent_until_reload() {
        let clipboard = FakeClipboard::new();
        assert!(!clipboard.copy("EARLY1", 1));
        clipboard.install_hook().await.unwrap();
        clipboard.install_hook().await.unwrap();
        assert_eq!(clipboard.installs(), 1);
        assert!(clipboard.copy("LATE22", 2));

        clipboard.reload();
        assert!(clipboard.last_copied().await.unwrap().is_none());
        clipboard.install_hook().await.unwrap();
        assert_eq!(clipboard.installs(), 2);
    }
}
