//! CLI commands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Completeness engine CLI
#[derive(Parser)]
#[command(name = "completeness-engine")]
#[command(about = "Classify mission events by completeness and timeliness")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Store, configuration and reporting window shared by every report
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// JSON dump of the event store
    #[arg(short, long)]
    pub store: PathBuf,
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Window start (RFC 3339)
    #[arg(long)]
    pub start: Option<String>,
    /// Window stop (RFC 3339)
    #[arg(long)]
    pub stop: Option<String>,
    /// Restrict to one satellite, e.g. S2A
    #[arg(long)]
    pub satellite: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify the events of one domain
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        /// acquisition, processing, datatake, dhus or hktm
        #[arg(short, long)]
        domain: String,
    },
    /// Mean publication timeliness per datastrip
    Timeliness {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Cumulative data volume
    Volume {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Macro-step segments of processed products
    MacroSteps {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Validate a configuration file
    CheckConfig {
        /// TOML configuration file
        config: PathBuf,
    },
}
