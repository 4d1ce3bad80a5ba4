//! VM power status checks
//!
//! Runs the power status runbook once per VM, concurrently, on one session.

use anyhow::{Context as AnyhowContext, Result};
use clap::Args;

use crate::commands::job::report;
use crate::config::Context;

/// Parameter the power status runbook reads the VM name from
const VM_NAME_PARAMETER: &str = "VMName";

#[derive(Args)]
pub struct VmPowerStatusArgs {
    /// VM to check; repeat for more than one
    #[arg(long = "vm", value_name = "NAME", required = true)]
    pub vms: Vec<String>,

    /// Runbook to start
    #[arg(long, default_value = "VMPowerStatus")]
    pub runbook: String,
}

pub async fn handle_vm_power_status(args: VmPowerStatusArgs, ctx: &Context) -> Result<()> {
    if args.vms.iter().any(|vm| vm.trim().is_empty()) {
        anyhow::bail!("VM names must not be empty");
    }

    let requests = args
        .vms
        .iter()
        .map(|vm| {
            ctx.request(&args.runbook)
                .with_parameter(VM_NAME_PARAMETER, vm.trim())
        })
        .collect();

    let results = ctx
        .orchestrator
        .trigger_many(requests, ctx.strategy, &ctx.cancel)
        .await
        .context("Failed to start VM power status checks")?;

    report(results, ctx.json)
}
