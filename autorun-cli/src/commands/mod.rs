//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod trigger;
mod vm;

pub use trigger::TriggerArgs;
pub use vm::VmPowerStatusArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Context;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a runbook and wait for it to finish
    Trigger(TriggerArgs),
    /// Run the VM power status runbook for one or more VMs
    VmPowerStatus(VmPowerStatusArgs),
}

/// Routes the command to its handler
pub async fn handle_command(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Trigger(args) => trigger::handle_trigger(args, ctx).await,
        Commands::VmPowerStatus(args) => vm::handle_vm_power_status(args, ctx).await,
    }
}
