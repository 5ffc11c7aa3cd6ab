//! Snapshot reader: fetches the live disk and normalizes it.

use tracing::{debug, instrument};

use crate::error::{ReconcileError, Result};
use crate::traits::ComputeProvider;
use crate::types::{Disk, DiskState, OsType};

impl From<Disk> for DiskState {
    fn from(disk: Disk) -> Self {
        let creation = disk.creation_data;
        Self {
            id: disk.id,
            name: disk.name,
            location: disk.location,
            tags: disk.tags,
            create_option: creation.create_option.to_ascii_lowercase(),
            source_uri: creation.source_uri.or(creation.source_resource_id),
            disk_size_gb: disk.disk_size_gb,
            os_type: disk.os_type.as_deref().and_then(OsType::from_provider),
            storage_account_type: disk.sku.map(|sku| sku.name),
            managed_by: disk.managed_by,
        }
    }
}

/// Read the current state of a disk.
///
/// Returns `Ok(None)` when the provider reports the disk as absent. Any other
/// provider failure aborts the reconciliation.
#[instrument(skip(provider), fields(resource_group = %resource_group, disk = %name))]
pub async fn read<P>(provider: &P, resource_group: &str, name: &str) -> Result<Option<DiskState>>
where
    P: ComputeProvider + ?Sized,
{
    match provider.get_disk(resource_group, name).await {
        Ok(disk) => {
            debug!(disk_id = %disk.id, "Found managed disk");
            Ok(Some(DiskState::from(disk)))
        }
        Err(e) if e.is_not_found() => {
            debug!("Did not find managed disk");
            Ok(None)
        }
        Err(e) => Err(ReconcileError::provider(
            "getting managed disk",
            resource_group,
            name,
            e,
        )),
    }
}
