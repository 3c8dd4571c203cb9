use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clickreplay::args::{Cli, Commands, RunArgs, ServeArgs};
use clickreplay::config::Config;
use clickreplay::driver::build_driver;
use clickreplay::logging;
use clickreplay::server::{self, AppState};
use clickreplay::{ReplayEngine, Workflow};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli.common.load_config()?;

    let mut log_config = config.log.clone().with_env();
    if cli.common.verbose {
        log_config = log_config.verbose();
    }
    logging::init(&log_config);

    match cli.command {
        Commands::Serve(args) => serve(config, args).await,
        Commands::Run(args) => run(config, args).await,
    }
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<()> {
    args.apply_overrides(&mut config);

    let driver = build_driver(&config, args.dry_run)?;
    let engine = Arc::new(ReplayEngine::new(driver, config.engine_config()));
    let state = Arc::new(AppState {
        engine,
        default_url: config.engine.default_url.clone(),
        metrics: config.server.metrics,
    });

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        signal.cancel();
    });

    server::serve(&config.server.listen, state, cancel).await
}

async fn run(config: Config, args: RunArgs) -> Result<()> {
    let body = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read workflow from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("Failed to read {}", args.file.display()))?
    };

    let mut workflow = Workflow::from_json_str(&body, &config.engine.default_url)?;
    if let Some(url) = args.url {
        workflow.target = url;
    }
    if let Some(speed) = args.speed {
        workflow = workflow.with_speed(speed)?;
    }

    let driver = build_driver(&config, args.dry_run)?;
    let engine = ReplayEngine::new(driver, config.engine_config());
    let replay = engine.replay_with_teardown(&workflow).await?;

    println!("{}", serde_json::to_string_pretty(&replay.result)?);

    if let Some(teardown) = replay.teardown {
        if args.keep_open {
            let grace = engine.config().teardown_grace;
            info!(
                grace_secs = grace.as_secs(),
                "keeping page open until the grace period ends"
            );
            tokio::select! {
                _ = tokio::time::sleep(grace) => {}
                _ = tokio::signal::ctrl_c() => warn!("interrupted; closing page"),
            }
        }
        teardown.shutdown_now().await;
    }

    match replay.result.failure() {
        Some(failure) => anyhow::bail!("replay failed: {}", failure),
        None => Ok(()),
    }
}
