//! CLI command definitions for the `hindsight` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod inspect;
pub mod serve;
pub mod sweep;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hindsight_infra::config::DEFAULT_CONFIG_FILE;

/// Conversational memory for a fleet of chat agents.
#[derive(Parser)]
#[command(name = "hindsight", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed logs (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "HINDSIGHT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record observed messages from stdin (one JSON object per line) and
    /// keep the snapshot up to date until EOF or Ctrl+C.
    Serve,

    /// Show statistics of the saved snapshot.
    Inspect,

    /// Print the recent window of one conversation from the saved snapshot.
    #[command(allow_negative_numbers = true)]
    Window {
        /// Agent id.
        agent: String,
        /// Conversation id.
        conversation: i64,
        /// Maximum number of lines (defaults to memory.window_limit).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the reply chain ending in a line, from the saved snapshot.
    #[command(allow_negative_numbers = true)]
    Chain {
        /// Agent id.
        agent: String,
        /// Conversation id.
        conversation: i64,
        /// The line the chain ends in.
        line: String,
        /// The line it replied to.
        #[arg(long, default_value = "")]
        prev: String,
        /// Maximum chain length (defaults to memory.chain_limit).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Evict expired entries from the saved snapshot once and save it.
    Sweep,
}

impl Cli {
    /// Log filter derived from `-v`, or `None` to use the configured level.
    pub fn log_filter(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info,hindsight_core=debug,hindsight_infra=debug,hindsight=debug"),
            _ => Some("trace"),
        }
    }
}
