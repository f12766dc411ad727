//! RFP CLI - Operator tool for the RFP invocation adapter.
//!
//! Commands:
//! - `rfp config show` - Show the resolved configuration (secrets redacted)
//! - `rfp config validate` - Validate configuration and list advisories
//! - `rfp probe` - Run the health probe
//! - `rfp smoke` - Write in one invocation, read back in another

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ConfigArgs, ProbeArgs, SmokeArgs};

/// RFP CLI - Inspect and verify the invocation adapter's backends
#[derive(Parser)]
#[command(name = "rfp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path (TOML or JSON); defaults to the environment
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect configuration
    Config(ConfigArgs),

    /// Check database and storage reachability
    Probe(ProbeArgs),

    /// Verify cross-invocation durability end to end
    Smoke(SmokeArgs),
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let output = output::Output::new(cli.verbose, cli.json);

    let ctx = match context::Context::load(cli.config.as_deref(), output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Probe(args) => commands::probe::run(args, &ctx).await,
        Commands::Smoke(args) => commands::smoke::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
