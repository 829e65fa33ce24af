use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::run::{apply_browser_flags, RelaySession};
use crate::config::RelayConfig;
use crate::server::{build_router, ServeState};

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Port for the control server (defaults to `serve.port` from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Attach to an existing Chrome DevTools websocket
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Launch Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Start a run as soon as the server is listening
    #[arg(long)]
    pub autostart: bool,
}

pub async fn cmd_serve(args: ServeArgs, mut config: RelayConfig) -> Result<()> {
    apply_browser_flags(&mut config, args.ws_url, args.headless);
    let port = args.port.unwrap_or(config.serve.port);
    let autostart = args.autostart || config.serve.autostart;

    let addr: SocketAddr = format!("{}:{}", config.serve.host, port)
        .parse()
        .with_context(|| format!("invalid serve address {}:{}", config.serve.host, port))?;

    let session = RelaySession::connect(&config).await?;
    let state = ServeState::new(session.controller.clone(), config.browser.websocket_url.clone());
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control server on {}", addr))?;
    info!("Control server available at http://{}", addr);
    if let Some(ws) = config.browser.websocket_url.as_deref() {
        info!("Using external DevTools endpoint: {}", ws);
    }

    if autostart && session.controller.start() {
        info!("relay autostarted");
    }

    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("control server exited unexpectedly");

    session.close().await;
    served
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(err) => {
            warn!(?err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
