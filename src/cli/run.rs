use std::sync::Arc;
use std::time::Duration;

use action_flow::RelayController;
use anyhow::{bail, Context, Result};
use cdp_adapter::ChromiumBrowser;
use clap::Args;
use relay_state_center::{Phase, StateCenter, StopOptions};
use tokio::signal;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::l0_bridge::CdpTabs;

/// Buffered state updates per subscriber
const STATE_CHANNEL_CAPACITY: usize = 256;
const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Attach to an existing Chrome DevTools websocket
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Launch Chromium without a window
    #[arg(long)]
    pub headless: bool,
}

/// A browser connection and the controller driving it.
pub(crate) struct RelaySession {
    pub(crate) browser: Arc<ChromiumBrowser>,
    pub(crate) controller: Arc<RelayController>,
}

impl RelaySession {
    pub(crate) async fn connect(config: &RelayConfig) -> Result<Self> {
        let browser = ChromiumBrowser::start(config.browser.clone())
            .await
            .context("failed to reach chromium")?;
        let tabs = Arc::new(CdpTabs::new(Arc::clone(&browser)));
        let state = StateCenter::new(STATE_CHANNEL_CAPACITY);
        let controller = RelayController::new(tabs, state, config.profile.clone());
        Ok(Self {
            browser,
            controller,
        })
    }

    /// Stop the current run, keeping its progress, and release the browser.
    pub(crate) async fn close(self) {
        if self.controller.is_running() {
            self.controller.stop(StopOptions::preserve());
            if tokio::time::timeout(STOP_GRACE, self.controller.wait())
                .await
                .is_err()
            {
                warn!("run task did not finish within {:?}", STOP_GRACE);
            }
        }
        self.browser.shutdown().await;
    }
}

/// Command-line flags win over the configuration file.
pub(crate) fn apply_browser_flags(config: &mut RelayConfig, ws_url: Option<String>, headless: bool) {
    if let Some(ws_url) = ws_url {
        config.browser.websocket_url = Some(ws_url);
    }
    if headless {
        config.browser.headless = true;
    }
}

pub async fn cmd_run(args: RunArgs, mut config: RelayConfig) -> Result<()> {
    apply_browser_flags(&mut config, args.ws_url, args.headless);
    let session = RelaySession::connect(&config).await?;

    if !session.controller.start() {
        bail!("a relay run is already active");
    }
    info!(
        source = %config.profile.source.url,
        target = %config.profile.target.url,
        "relay running (Ctrl+C to stop)"
    );

    let interrupted = tokio::select! {
        _ = session.controller.wait() => false,
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            true
        }
    };
    if interrupted {
        info!("Interrupted; stopping relay");
    }

    let controller = Arc::clone(&session.controller);
    session.close().await;

    let state = controller.state();
    println!("{}", serde_json::to_string_pretty(&state)?);

    match state.phase {
        Phase::Success => {
            info!(code = %state.last_code, attempts = state.attempt_count, "invite code accepted");
            Ok(())
        }
        _ if interrupted => Ok(()),
        _ => bail!(
            "relay stopped without an accepted code: {}",
            state.last_error.as_deref().unwrap_or("no error recorded")
        ),
    }
}
