//! # azdisk
//!
//! Reconciles one managed disk, and its attachment to a virtual machine,
//! against a declarative request. Prints `{"changed": ..., "state": ...}`
//! on stdout and exits non-zero on any fatal error.
//!
//! ## Usage
//! ```bash
//! azdisk disk.yaml --check
//! azdisk disk.yaml --config /etc/azdisk/config.yaml
//! azdisk disk.yaml --dev --fixture seed.yaml
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use azdisk_reconciler::{
    ComputeProvider, DiskRequest, DiskSpec, MockFixture, MockProvider, ReconcileOutcome, Reconciler,
};

mod cli;
mod config;

use cli::Args;
use config::{Config, ProviderBackend, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    azdisk_common::init_logging(&args.log_level, args.log_format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting azdisk");

    let config = load_config(&args)?;
    let spec = load_request(&args.request)?;

    info!(
        resource_group = %spec.resource_group,
        disk = %spec.name,
        backend = ?config.provider.backend,
        check = args.check,
        "Disk request loaded"
    );

    let result = match config.provider.backend {
        ProviderBackend::Mock => run(mock_provider(&config)?, &spec, args.check).await,
        ProviderBackend::Azure => run(azure_provider(&config, &args)?, &spec, args.check).await,
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Reconciliation failed");
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(config_path) => {
            // Explicit config file provided
            let cfg = Config::load(config_path)?;
            info!(config_path = %config_path, "Configuration loaded");
            Ok(cfg.with_cli_overrides(args))
        }
        None => match Config::load(DEFAULT_CONFIG_PATH) {
            Ok(cfg) => {
                info!(config_path = %DEFAULT_CONFIG_PATH, "Configuration loaded from default location");
                Ok(cfg.with_cli_overrides(args))
            }
            Err(_) => {
                info!("No config file found, using CLI arguments and defaults");
                Ok(Config::default().with_cli_overrides(args))
            }
        },
    }
}

fn load_request(path: &str) -> Result<DiskSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read disk request: {}", path))?;
    let request: DiskRequest = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse disk request: {}", path))?;
    Ok(DiskSpec::from(request))
}

fn mock_provider(config: &Config) -> Result<MockProvider> {
    let fixture = match &config.mock.fixture {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mock fixture: {}", path))?;
            serde_yaml::from_str::<MockFixture>(&content)
                .with_context(|| format!("Failed to parse mock fixture: {}", path))?
        }
        None => MockFixture::default(),
    };
    Ok(MockProvider::from_fixture(fixture))
}

#[cfg(feature = "azure")]
fn azure_provider(config: &Config, args: &Args) -> Result<azdisk_reconciler::AzureProvider> {
    use azdisk_reconciler::AzureConfig;

    let subscription_id = config
        .azure
        .subscription_id
        .clone()
        .context("Azure subscription id is not configured (azure.subscription_id or AZURE_SUBSCRIPTION_ID)")?;
    let access_token = args
        .access_token
        .clone()
        .context("Azure access token is not set (AZURE_ACCESS_TOKEN)")?;

    let mut azure = AzureConfig::new(subscription_id, access_token);
    azure.endpoint = config.azure.endpoint.clone();
    azure.compute_api_version = config.azure.compute_api_version.clone();
    azure.resources_api_version = config.azure.resources_api_version.clone();
    azure.poll_interval = config.poll_interval();

    Ok(azdisk_reconciler::AzureProvider::new(azure))
}

#[cfg(not(feature = "azure"))]
fn azure_provider(_config: &Config, _args: &Args) -> Result<MockProvider> {
    Err(anyhow::anyhow!(
        "azdisk was built without the azure feature; use --dev for the mock provider"
    ))
}

async fn run<P: ComputeProvider>(provider: P, spec: &DiskSpec, check: bool) -> Result<ReconcileOutcome> {
    let reconciler = Reconciler::new(provider).with_dry_run(check);
    let outcome = reconciler.reconcile(spec).await?;
    Ok(outcome)
}
