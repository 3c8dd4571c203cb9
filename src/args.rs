use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "clickreplay",
    version,
    about = "Replay recorded click/type workflows against a browser page"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(subcommand)]
    pub command: Commands,
}

// Global flags shared across every subcommand.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to a config.toml file
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "CLICKREPLAY_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Debug logging for replays
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Accept workflows over HTTP and replay them
    Serve(ServeArgs),
    /// Replay one workflow file and print the outcome
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Listen address (overrides server.listen)
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Replay against the scripted surface instead of a browser
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Workflow JSON file, or `-` for stdin
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Override the workflow target URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Override the playback speed
    #[arg(long, value_name = "FACTOR")]
    pub speed: Option<f64>,

    /// Replay against the scripted surface instead of a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Keep the page open for the teardown grace period before exiting
    #[arg(long)]
    pub keep_open: bool,
}

impl CommonArgs {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        Config::load(self.config.clone())
    }
}

impl ServeArgs {
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
    }
}
