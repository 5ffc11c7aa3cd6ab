//! Declarative disk request, as supplied by the enclosing automation.

use serde::Deserialize;
use std::collections::HashMap;

use crate::types::{CreateMode, DesiredState, DiskSpec, ManagedBy, OsType, StorageTier};

/// Input record of one invocation.
///
/// Field names follow the automation interface; [`DiskSpec`] is the typed
/// form used by the reconciler.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskRequest {
    pub resource_group: String,
    pub name: String,
    #[serde(default)]
    pub state: DesiredState,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub storage_account_type: Option<StorageTier>,
    #[serde(default)]
    pub create_option: Option<CreateMode>,
    #[serde(default, alias = "source_resource_uri")]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub os_type: Option<OsType>,
    #[serde(default)]
    pub disk_size_gb: Option<u32>,
    /// Vm name; `""` detaches, absent leaves the attachment alone
    #[serde(default)]
    pub managed_by: Option<String>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

impl From<DiskRequest> for DiskSpec {
    fn from(request: DiskRequest) -> Self {
        Self {
            resource_group: request.resource_group,
            name: request.name,
            state: request.state,
            location: request.location,
            storage_tier: request.storage_account_type,
            create_mode: request.create_option,
            source: request.source_uri,
            os_type: request.os_type,
            disk_size_gb: request.disk_size_gb,
            tags: request.tags,
            managed_by: request.managed_by.map(ManagedBy::from_field),
        }
    }
}
