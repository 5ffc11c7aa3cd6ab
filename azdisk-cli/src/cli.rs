//! Command-line argument parsing.

use azdisk_common::LogFormat;
use clap::Parser;

/// azdisk - Reconcile a managed disk against its declared state
#[derive(Parser, Debug)]
#[command(name = "azdisk")]
#[command(about = "azdisk - Reconcile a managed disk against its declared state")]
#[command(version)]
pub struct Args {
    /// Path to the disk request (YAML)
    pub request: String,

    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Log output format (pretty, json)
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Report what would change without changing anything
    #[arg(long)]
    pub check: bool,

    /// Use the in-memory mock provider instead of Azure
    #[arg(long)]
    pub dev: bool,

    /// Fixture file seeding the mock provider (implies --dev)
    #[arg(long)]
    pub fixture: Option<String>,

    /// Azure subscription id
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Bearer token for the Azure management endpoint
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}
