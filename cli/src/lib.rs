//! Riskboard CLI
//!
//! Headless consumer of the dashboard engine.
//!
//! ## Commands
//!
//! - `riskboard snapshot <KEY>` - Resolve and print the dashboard snapshot
//! - `riskboard articles <KEY>` - Page through the article list
//! - `riskboard watch <KEY>` - Follow volatile fields via the poller
//! - `riskboard doctor` - Verify config, backend and fallback data

pub mod articles_cmd;
pub mod doctor_cmd;
pub mod snapshot_cmd;
pub mod watch_cmd;

use clap::Parser;
use clap::Subcommand;
use riskboard_sync::DashboardEngine;
use riskboard_sync::RiskboardConfig;
use std::path::Path;
use std::path::PathBuf;

pub use articles_cmd::ArticlesArgs;
pub use doctor_cmd::CheckResult;
pub use doctor_cmd::CheckStatus;
pub use doctor_cmd::DoctorArgs;
pub use snapshot_cmd::SnapshotArgs;
pub use watch_cmd::WatchArgs;

/// Risk dashboard from the terminal
#[derive(Debug, Parser)]
#[command(name = "riskboard", version)]
pub struct Cli {
    /// Config file (default: $RISKBOARD_CONFIG or ~/.config/riskboard/riskboard.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve the dashboard snapshot for a selection key
    Snapshot(SnapshotArgs),

    /// Page through the article list for a selection key
    Articles(ArticlesArgs),

    /// Resolve once, then follow volatile updates
    Watch(WatchArgs),

    /// Verify configuration, backend reachability and fallback data
    Doctor(DoctorArgs),
}

impl Cli {
    pub async fn run(self) -> i32 {
        let config_path = self.config.as_deref();
        match self.command {
            Command::Snapshot(args) => snapshot_cmd::run_snapshot(config_path, args).await,
            Command::Articles(args) => articles_cmd::run_articles(config_path, args).await,
            Command::Watch(args) => watch_cmd::run_watch(config_path, args).await,
            Command::Doctor(args) => doctor_cmd::run_doctor(config_path, args).await,
        }
    }
}

/// Config from `--config` when given, else the default resolution.
/// Environment overrides apply in both cases.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RiskboardConfig> {
    let Some(path) = path else {
        return Ok(RiskboardConfig::load()?);
    };
    let mut config = RiskboardConfig::load_from_path(path)?;
    config.apply_overrides(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

pub fn load_engine(path: Option<&Path>) -> anyhow::Result<DashboardEngine> {
    Ok(DashboardEngine::from_config(load_config(path)?)?)
}

/// Parse `name=value` for repeatable filter flags.
pub(crate) fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("filter name is empty in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
