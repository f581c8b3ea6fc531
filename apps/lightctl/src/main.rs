use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::error::ControllerError;
use sync_core::LightController;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vendor_adapters::{BridgeLampAdapter, CloudApiAdapter, DeviceAdapter, LocalBulbAdapter};

mod commands;
mod config;

use commands::OnceAction;
use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "lightctl", about = "Synchronized colour cycling across smart-light vendors")]
struct Cli {
    /// Settings file; `lightctl.toml` in the working directory by default.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tracing filter, e.g. `debug` or `sync_core=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the cycle and run until Ctrl-C.
    Run,
    /// Read actions from stdin.
    Interactive,
    /// Apply one fixed state and exit.
    Once {
        #[arg(value_enum)]
        action: OnceAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let settings = load_settings(cli.config.as_deref())?;
    let controller = build_controller(&settings).await?;

    match cli.command {
        Command::Run => run(&controller).await?,
        Command::Interactive => {
            let stdin = BufReader::new(tokio::io::stdin());
            commands::interactive(&controller, stdin, tokio::io::stdout())
                .await
                .context("interactive session failed")?;
            shutdown(&controller).await;
        }
        Command::Once { action } => {
            if let Err(err) = commands::apply_once(&controller, action).await {
                println!("error: {err}");
            }
        }
    }

    Ok(())
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Registers one adapter per configured vendor section.
async fn build_controller(settings: &Settings) -> Result<LightController> {
    let cycle = &settings.cycle;
    let mut builder = LightController::builder(cycle.controller_settings()).jitter_enabled(cycle.jitter);

    if let Some(section) = &settings.bridge {
        let config = section.to_config(cycle)?;
        let adapter = BridgeLampAdapter::connect(config)
            .await
            .context("failed to connect to the bridge")?;
        info!(lamps = adapter.device_count(), "bridge adapter ready");
        builder = builder.adapter(Arc::new(adapter));
    }

    if let Some(section) = &settings.local_bulb {
        let config = section.to_config(cycle)?;
        let adapter = LocalBulbAdapter::bind(config)
            .await
            .context("failed to open the LAN bulb socket")?;
        info!(
            bulbs = adapter.device_count(),
            broadcast = adapter.device_count() == 0,
            "local bulb adapter ready"
        );
        builder = builder.adapter(Arc::new(adapter));
    }

    if let Some(section) = &settings.cloud {
        let config = section.to_config()?;
        let adapter = CloudApiAdapter::connect(config)
            .await
            .context("failed to list cloud devices")?;
        info!(
            devices = adapter.device_count(),
            push_every_ticks = section.push_every_ticks,
            "cloud adapter ready"
        );
        builder = builder.throttled_adapter(Arc::new(adapter), section.push_every_ticks);
    }

    Ok(builder.build())
}

async fn run(controller: &LightController) -> Result<()> {
    match controller.start().await {
        Ok(()) => {}
        Err(ControllerError::PartialFailure(failures)) => {
            warn!(failed = failures.len(), "cycle started with failing adapters");
        }
        Err(err) => return Err(err).context("failed to start the cycle"),
    }

    info!("cycling, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    shutdown(controller).await;
    Ok(())
}

async fn shutdown(controller: &LightController) {
    if let Err(err) = controller.stop().await {
        warn!(error = %err, "stop reported failures");
    }
}
