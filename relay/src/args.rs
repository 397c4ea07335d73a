use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Relay LLM client
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Run a prompt against any configured LLM provider")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,

    /// Provider to use; defaults to the first configured one
    #[arg(short, long, env = "RELAY_PROVIDER")]
    pub provider: Option<String>,

    /// Path to a prompt JSON document
    #[arg(long)]
    pub prompt: PathBuf,

    /// Stream the response, printing text as it arrives
    #[arg(long)]
    pub stream: bool,

    /// Give up on a request after this many seconds
    #[arg(long, env = "RELAY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Operation to perform
    #[arg(long, value_enum, default_value_t = Command::Generate)]
    pub command: Command,

    /// Override the configured log filter
    #[arg(long, env = "RELAY_LOG")]
    pub log: Option<String>,
}

/// What to do with the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Command {
    /// Generate a response
    Generate,
    /// Count input tokens
    CountTokens,
    /// List models served by the provider
    ListModels,
}
