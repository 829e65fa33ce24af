use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_locator::DomError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Handler, Page};
use futures::StreamExt;
use relay_core_types::{SiteTarget, TabHandle};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clipboard::ChromiumClipboard;
use crate::config::CdpConfig;
use crate::dom::{run_script, ChromiumDom};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::registry::Registry;
use crate::scripts;

/// One Chromium instance, attached or launched, and the tabs handed out
/// from it.
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    registry: Registry,
    handler_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    /// Launched by us rather than attached to
    launched: bool,
    deadline: Duration,
}

impl ChromiumBrowser {
    pub async fn start(cfg: CdpConfig) -> Result<Arc<Self>, AdapterError> {
        let (mut browser, handler) = match &cfg.websocket_url {
            Some(ws_url) => {
                info!(target: "cdp-browser", url = %ws_url, "attaching to chromium");
                Browser::connect(ws_url.clone()).await?
            }
            None => {
                let config = browser_config(&cfg)?;
                info!(target: "cdp-browser", headless = cfg.headless, "launching chromium");
                Browser::launch(config).await.map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Launch).with_hint(err.to_string())
                })?
            }
        };

        let closed = Arc::new(AtomicBool::new(false));
        let handler_task = spawn_handler_task(handler, Arc::clone(&closed));

        if cfg.websocket_url.is_some() {
            match browser.fetch_targets().await {
                Ok(targets) => debug!(target: "cdp-browser", count = targets.len(), "existing targets"),
                Err(err) => warn!(target: "cdp-browser", %err, "could not list existing targets"),
            }
        }

        Ok(Arc::new(Self {
            browser: Mutex::new(browser),
            registry: Registry::new(),
            handler_task,
            closed,
            launched: !cfg.is_attach(),
            deadline: Duration::from_millis(cfg.default_deadline_ms),
        }))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// First open tab whose URL matches `site`, otherwise a new tab on the
    /// site URL. The tab is brought to the front either way.
    pub async fn find_or_create(&self, site: &SiteTarget) -> Result<TabHandle, AdapterError> {
        let browser = self.browser.lock().await;
        for page in browser.pages().await? {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if !site.matches(&url) {
                continue;
            }
            let tab = handle_of(&page);
            page.bring_to_front().await?;
            debug!(target: "cdp-browser", %tab, %url, "reusing tab");
            self.registry.insert(tab.clone(), page, Some(url));
            return Ok(tab);
        }

        let page = browser.new_page(site.url.as_str()).await?;
        page.bring_to_front().await?;
        let tab = handle_of(&page);
        info!(target: "cdp-browser", %tab, url = %site.url, "opened tab");
        self.registry.insert(tab.clone(), page, Some(site.url.clone()));
        Ok(tab)
    }

    pub fn page(&self, tab: &TabHandle) -> Result<Page, AdapterError> {
        self.registry
            .page(tab)
            .ok_or_else(|| AdapterError::tab_gone(tab))
    }

    /// `document.readyState` of the tab.
    pub async fn ready_state(&self, tab: &TabHandle) -> Result<String, AdapterError> {
        let page = self.page(tab)?;
        run_script(&page, scripts::ready_state(), self.deadline)
            .await
            .map_err(|err| match err {
                DomError::Transport(message) => {
                    AdapterError::new(AdapterErrorKind::Transport).with_hint(message)
                }
                other => AdapterError::new(AdapterErrorKind::Script).with_hint(other.to_string()),
            })
    }

    pub async fn focus(&self, tab: &TabHandle) -> Result<(), AdapterError> {
        self.page(tab)?.bring_to_front().await?;
        Ok(())
    }

    pub async fn reload(&self, tab: &TabHandle) -> Result<(), AdapterError> {
        let page = self.page(tab)?;
        page.reload().await?;
        if let Ok(Some(url)) = page.url().await {
            self.registry.set_recent_url(tab, url);
        }
        Ok(())
    }

    pub fn dom(&self, tab: &TabHandle) -> Result<ChromiumDom, AdapterError> {
        Ok(ChromiumDom::new(self.page(tab)?, self.deadline))
    }

    pub fn clipboard(&self, tab: &TabHandle) -> Result<ChromiumClipboard, AdapterError> {
        Ok(ChromiumClipboard::new(self.page(tab)?, self.deadline))
    }

    /// Drop the connection. A browser launched here is closed; an attached
    /// one is left running.
    pub async fn shutdown(&self) {
        if self.launched {
            let mut browser = self.browser.lock().await;
            if let Err(err) = browser.close().await {
                debug!(target: "cdp-browser", %err, "browser close failed");
            }
        }
        self.handler_task.abort();
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

fn handle_of(page: &Page) -> TabHandle {
    TabHandle::new(page.target_id().inner().clone())
}

fn spawn_handler_task(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                warn!(target: "cdp-browser", %err, "handler event error");
            }
        }
        closed.store(true, Ordering::SeqCst);
        info!(target: "cdp-browser", "chromium connection closed");
    })
}

pub(crate) fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
        return Err(AdapterError::new(AdapterErrorKind::Launch).with_hint(format!(
            "chrome executable not found at {}; set RELAY_CHROME to the full path of chrome/chromium",
            cfg.executable.display()
        )));
    }

    let profile_dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        let cwd = std::env::current_dir().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Setup)
                .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
        })?;
        cwd.join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&profile_dir).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Setup)
            .with_hint(format!("failed to ensure user-data-dir: {err}"))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));

    if !cfg.headless {
        builder = builder.with_head();
    }

    let mut args = vec![
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--remote-allow-origins=*",
    ];
    if cfg.headless {
        args.push("--headless=new");
    }
    builder = builder.args(args);

    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder = builder.user_data_dir(profile_dir);

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Setup).with_hint(format!("browser config error: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_executable_is_a_launch_error() {
        let dir = tempdir().unwrap();
        let cfg = CdpConfig {
            executable: dir.path().join("no-such-chrome"),
            user_data_dir: dir.path().join("profile"),
            ..CdpConfig::default()
        };
        let err = browser_config(&cfg).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Launch);
        assert!(err.hint.unwrap().contains("RELAY_CHROME"));
    }

    #[test]
    fn creates_profile_dir() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("chrome");
        fs::write(&exe, b"").unwrap();
        let profile = dir.path().join("nested").join("profile");
        let cfg = CdpConfig {
            executable: exe,
            user_data_dir: profile.clone(),
            ..CdpConfig::default()
        };
        browser_config(&cfg).unwrap();
        assert!(profile.is_dir());
    }
}
