//! goapd - GOAP orchestrator daemon
//!
//! Runs one warehouse site: a team with one agent per role, the default
//! action catalog with simulated latency, and a periodic status line until
//! interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use goap_core::{
    warehouse_actions, ActionLibrary, AgentRegistry, Orchestrator, OrchestratorConfig,
};

#[derive(Parser)]
#[command(name = "goapd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Goal-oriented action planning orchestrator", long_about = None)]
struct Cli {
    /// TOML file with orchestrator settings (defaults apply when omitted)
    #[arg(short, long, env = "GOAPD_CONFIG")]
    config: Option<PathBuf>,

    /// Site id used to name the agent team
    #[arg(short, long, env = "GOAPD_SITE", default_value = "main")]
    site: String,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Milliseconds between status lines
    #[arg(long, env = "GOAPD_STATUS_INTERVAL_MS", default_value_t = 5_000)]
    status_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    goap_core::init_tracing(cli.json, level);

    let config = match &cli.config {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };

    let library = ActionLibrary::from_actions(warehouse_actions(true))
        .context("Failed to build action catalog")?;
    let mut agents = AgentRegistry::new();
    let team = agents.create_team(&cli.site);

    let orchestrator = Orchestrator::new(config, library, agents)?;
    orchestrator.start()?;
    info!(
        version = goap_core::VERSION,
        site = %cli.site,
        agents = team.len(),
        "goapd started"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.status_interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = orchestrator.get_status()?;
                info!(status = %serde_json::to_string(&status)?, "status");
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                break;
            }
        }
    }

    let cancelled = orchestrator.stop().await?;
    info!(cancelled = cancelled.len(), "goapd stopped");
    Ok(())
}
