/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Running stream monitor with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cryptowire_monitor::{Monitor, MonitorConfig};
use cryptowire_stream::CryptoWireClient;

#[derive(Parser, Debug)]
#[command(name = "cryptowire-monitor", version, about = "CryptoWire stream and snapshot monitor")]
struct Cli {
    /// YAML config file; built-in defaults are used when omitted
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Validate configuration and exit
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Run a single poll round and exit
    #[arg(long = "once")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = ?args.config_path,
        dry_run = args.dry_run,
        once = args.once,
        "starting cryptowire-monitor"
    );

    let config = load_config(args.config_path.as_deref())?;
    info!(
        endpoint = %config.client.endpoint,
        chains = ?config.chains,
        channels = ?config.channels,
        poll_interval_secs = config.poll_interval_secs,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let client = CryptoWireClient::new(config.client.clone()).context("build stream client")?;
    let monitor = Monitor::new(Arc::new(client), config);

    if args.once {
        let summary = monitor.poll_round().await;
        info!(?summary, "single poll round complete");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    info!("monitor running");
    monitor.run(shutdown).await;
    info!("monitor shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::from_file(path).context("load config"),
        None => {
            let config = MonitorConfig::default();
            config.validate().context("validate default config")?;
            Ok(config)
        }
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
