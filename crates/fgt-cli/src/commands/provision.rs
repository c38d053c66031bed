//! Provision command - SD-WAN zone, WAN member and default route

use anyhow::{Context, Result};
use fgt_client::provision::StageStatus;
use fgt_client::{
    ClientConfig, FgtClient, Prompter, ProvisionInput, ProvisionOptions, ProvisioningWorkflow,
};
use std::net::Ipv4Addr;
use std::process::ExitCode;

use super::EXIT_PARTIAL_FAILURE;
use crate::output::{OutputContext, StageRow};

/// Arguments of `fgt-cli provision`
#[derive(Debug, clap::Args)]
pub struct ProvisionArgs {
    /// FortiGate management IPv4 address (prompted when omitted)
    #[arg(long)]
    pub address: Option<Ipv4Addr>,

    /// Primary WAN interface name (prompted when omitted)
    #[arg(long)]
    pub wan_interface: Option<String>,

    /// Internet gateway IPv4 address (prompted when omitted)
    #[arg(long)]
    pub gateway: Option<Ipv4Addr>,

    /// REST API administrator token
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub token: Option<String>,

    /// Stop at the first failed stage instead of attempting the rest
    #[arg(long)]
    pub halt_on_error: bool,
}

/// Provision a single FortiGate
pub async fn provision(
    args: ProvisionArgs,
    client_config: &ClientConfig,
    ctx: &OutputContext,
    prompter: &mut dyn Prompter,
) -> Result<ExitCode> {
    let token = args
        .token
        .filter(|t| !t.trim().is_empty())
        .context("API token missing: set API_KEY or pass --token")?;

    let input = ProvisionInput::collect(prompter, args.address, args.wan_interface, args.gateway)
        .context("Invalid provisioning input")?;

    let client = FgtClient::new(input.management_address, &token, client_config)
        .context("Failed to create FortiGate client")?;

    ctx.info(&format!(
        "Provisioning {} (WAN {}, gateway {})",
        input.management_address, input.wan_interface, input.gateway
    ));

    let options = ProvisionOptions {
        halt_on_error: args.halt_on_error,
    };
    let report = ProvisioningWorkflow::new(&client, &input, options)
        .run(prompter)
        .await;

    for stage in &report.stages {
        match &stage.status {
            StageStatus::Succeeded(msg) => ctx.success(msg),
            StageStatus::Failed(failure) => {
                ctx.error(&format!("{} failed: {}", stage.stage, failure))
            }
            StageStatus::Skipped => ctx.warn(&format!("{} skipped", stage.stage)),
        }
    }

    if ctx.is_structured() {
        let rows: Vec<StageRow> = report.stages.iter().map(StageRow::from).collect();
        ctx.print(&rows)?;
    }

    if report.has_failures() {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    } else {
        ctx.success("\nProvisioning completed");
        Ok(ExitCode::SUCCESS)
    }
}
