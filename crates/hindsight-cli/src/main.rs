//! Hindsight entry point.
//!
//! Binary name: `hindsight`
//!
//! Parses CLI arguments, loads configuration, sets up tracing, restores the
//! store from its snapshot and dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use hindsight_infra::config::load_config;
use hindsight_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config).await?;
    let config = loaded.config;

    let options = TracingOptions {
        level: cli
            .log_filter()
            .map(str::to_string)
            .unwrap_or_else(|| config.logging.level.clone()),
        json: config.logging.json,
        otel: config.logging.otel,
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
    loaded.source.log();

    let state = AppState::init(config).await;

    let result = match cli.command {
        Commands::Serve => cli::serve::serve(&state, cli.json).await,
        Commands::Inspect => cli::inspect::inspect(&state, cli.json).await,
        Commands::Window {
            agent,
            conversation,
            limit,
        } => cli::inspect::window(&state, &agent, conversation, limit, cli.json),
        Commands::Chain {
            agent,
            conversation,
            line,
            prev,
            limit,
        } => cli::inspect::chain(&state, &agent, conversation, &line, &prev, limit, cli.json),
        Commands::Sweep => cli::sweep::sweep_once(&state, cli.json).await,
    };

    shutdown_tracing();
    result
}
