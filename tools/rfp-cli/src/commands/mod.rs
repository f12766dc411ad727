//! CLI command implementations.

pub mod config;
pub mod probe;
pub mod smoke;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the current configuration.
    Show,
    /// Validate the configuration.
    Validate {
        /// Treat advisories as errors.
        #[arg(long)]
        strict: bool,
    },
}

/// Arguments for the probe command.
#[derive(Args)]
pub struct ProbeArgs {
    /// Exit non-zero unless the status is healthy.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the smoke command.
#[derive(Args)]
pub struct SmokeArgs {
    /// Logical storage key to write.
    #[arg(short, long, default_value = "smoke/check.bin")]
    pub key: String,

    /// Payload size in bytes.
    #[arg(short, long, default_value = "1024")]
    pub bytes: usize,

    /// Leave the object in storage afterwards.
    #[arg(long)]
    pub keep: bool,
}
