//! Autorun CLI
//!
//! Command-line interface for triggering Azure Automation runbooks and
//! following them to completion.

mod commands;
mod config;

use anyhow::{Context as AnyhowContext, Result};
use autorun_client::AutomationClient;
use autorun_core::AuthStrategy;
use autorun_runner::{AuthConfig, AzureCredentialFactory, Config, CredentialSessionProvider, Orchestrator};
use clap::Parser;
use commands::{Commands, handle_command};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Context, resolve_scope};

#[derive(Parser)]
#[command(name = "autorun")]
#[command(about = "Trigger Azure Automation runbooks and monitor them to completion", long_about = None)]
struct Cli {
    /// Subscription of the automation account
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription: Option<String>,

    /// Resource group of the automation account
    #[arg(long, env = "AUTORUN_RESOURCE_GROUP")]
    resource_group: String,

    /// Automation account name
    #[arg(long, env = "AUTORUN_AUTOMATION_ACCOUNT")]
    automation_account: String,

    /// Authentication strategy: default, spn or identity
    #[arg(long, env = "AUTORUN_AUTH", default_value = "default")]
    auth: String,

    /// Monitoring budget per job, in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Wait between two status checks, in seconds
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads the environment
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout only carries results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autorun_runner=info,autorun_client=info,autorun_cli=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let strategy: AuthStrategy = cli.auth.parse()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let scope = resolve_scope(
        cli.subscription.or_else(|| config.subscription_id.clone()),
        &cli.resource_group,
        &cli.automation_account,
    )?;
    info!("Using automation account {}", scope);

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let control_plane = Arc::new(AutomationClient::with_client(
        config.management_endpoint.clone(),
        http.clone(),
    ));
    let sessions = Arc::new(CredentialSessionProvider::new(
        AuthConfig::from_env(),
        AzureCredentialFactory::new(http, config.authority_host.clone()),
    ));
    let orchestrator = Orchestrator::new(sessions, control_plane, config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping monitoring; remote jobs keep running");
            on_interrupt.cancel();
        }
    });

    let ctx = Context {
        orchestrator,
        scope,
        strategy,
        timeout: cli.timeout.map(Duration::from_secs),
        poll_interval: cli.poll_interval.map(Duration::from_secs),
        json: cli.json,
        cancel,
    };

    handle_command(cli.command, &ctx).await
}
