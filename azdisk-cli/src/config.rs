//! Configuration management for the azdisk tool.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/azdisk/config.yaml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider selection and polling
    pub provider: ProviderConfig,
    /// Azure connection settings
    pub azure: AzureSettings,
    /// Mock provider settings
    pub mock: MockSettings,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if args.dev || args.fixture.is_some() {
            self.provider.backend = ProviderBackend::Mock;
        }

        if let Some(ref fixture) = args.fixture {
            self.mock.fixture = Some(fixture.clone());
        }

        if let Some(ref subscription_id) = args.subscription_id {
            self.azure.subscription_id = Some(subscription_id.clone());
        }

        self
    }

    /// Long-running operation poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.provider.poll_interval_secs.max(1))
    }
}

/// Provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Backend type
    pub backend: ProviderBackend,
    /// Seconds between operation polls when the provider sends no Retry-After
    pub poll_interval_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: ProviderBackend::Azure,
            poll_interval_secs: 5,
        }
    }
}

/// Provider backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    /// Azure Resource Manager
    #[default]
    Azure,
    /// In-memory mock for testing/development
    Mock,
}

/// Azure connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    /// Subscription id (also AZURE_SUBSCRIPTION_ID)
    pub subscription_id: Option<String>,
    /// Management endpoint
    pub endpoint: String,
    /// API version for disks and virtual machines
    pub compute_api_version: String,
    /// API version for resource groups
    pub resources_api_version: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            subscription_id: None,
            endpoint: "https://management.azure.com".to_string(),
            compute_api_version: "2019-07-01".to_string(),
            resources_api_version: "2019-10-01".to_string(),
        }
    }
}

/// Mock provider settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// YAML fixture seeding resource groups, disks and vms
    pub fixture: Option<String>,
}
