//! fgt-cli - FortiGate SD-WAN provisioning and fleet firmware upgrades
//!
//! `provision` configures one appliance interactively; `upgrade` walks an
//! inventory file and pushes a firmware image to every listed firewall.

mod commands;
mod config;
mod output;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::{ProvisionArgs, UpgradeArgs, EXIT_INVALID_INPUT};
use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};
use crate::prompt::ConsolePrompter;

#[derive(Parser)]
#[command(name = "fgt-cli")]
#[command(author, version, about = "FortiGate SD-WAN provisioning and firmware upgrade CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FGT_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Accept invalid or self-signed TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Management HTTPS port when not 443
    #[arg(long)]
    port: Option<u16>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the Internet SD-WAN zone, attach the WAN interface and set the default route
    Provision(ProvisionArgs),

    /// Back up and upload a firmware image to every firewall in the inventory
    Upgrade(UpgradeArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_INVALID_INPUT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    commands::exit_code(run(cli).await)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // Load config file
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(cli.insecure, cli.port, cli.output, cli.no_color)?;
    if merged.insecure {
        tracing::warn!("TLS certificate verification disabled");
    }

    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);
    let client_config = merged.client_config();
    let mut prompter = ConsolePrompter::new(merged.output);

    match cli.command {
        Commands::Provision(args) => {
            commands::provision(args, &client_config, &ctx, &mut prompter).await
        }
        Commands::Upgrade(args) => {
            commands::upgrade(args, &merged, &client_config, &ctx, &mut prompter).await
        }
    }
}
