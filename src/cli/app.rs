use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::env::{CliArgs, Commands};
use super::run::cmd_run;
use super::runtime::{init_logging, load_config, LoadedConfig};
use super::serve::cmd_serve;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!(
        "Starting invite-relay v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let LoadedConfig { mut config, path } = load_config(cli.config.as_ref()).await?;
    config.apply_env_overrides();
    tracing::debug!(config = %path.display(), "configuration ready");

    let outcome = match cli.command {
        Commands::Run(args) => cmd_run(args, config).await,
        Commands::Serve(args) => cmd_serve(args, config).await,
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
