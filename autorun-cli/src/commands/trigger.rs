//! Generic runbook trigger

use anyhow::{Context as AnyhowContext, Result};
use clap::Args;

use crate::commands::job::report;
use crate::config::Context;

#[derive(Args)]
pub struct TriggerArgs {
    /// Name of the runbook to start
    pub runbook: String,

    /// Runbook parameter; repeat for more than one
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

pub async fn handle_trigger(args: TriggerArgs, ctx: &Context) -> Result<()> {
    let mut request = ctx.request(&args.runbook);
    request.parameters.extend(args.params);

    let result = ctx
        .orchestrator
        .trigger_and_monitor(request, ctx.strategy, &ctx.cancel)
        .await
        .with_context(|| format!("Failed to run runbook '{}'", args.runbook))?;

    report(vec![Ok(result)], ctx.json)
}

/// Parses `KEY=VALUE`; the value may itself contain `=`
fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("parameter name missing in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
