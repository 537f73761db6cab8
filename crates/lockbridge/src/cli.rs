//! Clap derive structures for the `lockbridge` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lockbridge -- host bridge for BLE smart-lock provisioning
#[derive(Debug, Parser)]
#[command(
    name = "lockbridge",
    version,
    about = "Pair, provision and enroll keys on BLE smart locks",
    long_about = "Exposes the lock session layer as a JSON-lines protocol on stdio.\n\n\
        Requests arrive on stdin as {\"id\", \"method\", \"args\"}; responses and\n\
        session events are written to stdout, logs to stderr.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "LOCKBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr (overrides the config file)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the JSON-lines bridge on stdin/stdout
    Serve(ServeArgs),

    /// Manage the configuration file
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Serve ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Simulated link latency per exchange, in milliseconds
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Simulated adapter state (on, off, unavailable, unauthorized, unsupported)
    #[arg(long)]
    pub radio_state: Option<lockbridge_core::RadioState>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file populated with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved configuration as TOML
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value
    Set {
        /// Dotted key, e.g. "bridge.pairing_timeout_secs"
        key: String,

        /// Value to set
        value: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
