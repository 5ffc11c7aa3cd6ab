//! Apply executor: issues disk create/update/delete calls and waits for them.

use tracing::{info, instrument};

use crate::error::{ProviderError, ReconcileError, Result};
use crate::traits::ComputeProvider;
use crate::types::{DiskParameters, DiskState, OperationOutput};

/// Create or update the disk and return its final normalized state.
#[instrument(skip(provider, target), fields(resource_group = %resource_group, disk = %name))]
pub async fn create_or_update<P>(
    provider: &P,
    resource_group: &str,
    name: &str,
    target: &DiskParameters,
) -> Result<DiskState>
where
    P: ComputeProvider + ?Sized,
{
    const ACTION: &str = "creating the managed disk";

    info!(
        create_option = target.creation_data.create_mode().as_str(),
        disk_size_gb = ?target.disk_size_gb,
        "Creating or updating managed disk"
    );

    let operation = provider
        .begin_create_or_update_disk(resource_group, name, target)
        .await
        .map_err(|e| ReconcileError::apply(ACTION, resource_group, name, &e))?;

    let output = provider
        .wait_for_completion(operation)
        .await
        .map_err(|e| ReconcileError::apply(ACTION, resource_group, name, &e))?;

    match output {
        OperationOutput::Disk(disk) => {
            info!(disk_id = %disk.id, "Managed disk created or updated");
            Ok(DiskState::from(disk))
        }
        other => Err(ReconcileError::apply(
            ACTION,
            resource_group,
            name,
            &ProviderError::InvalidResponse(format!(
                "expected a disk from the operation, got {:?}",
                other
            )),
        )),
    }
}

/// Delete the disk.
#[instrument(skip(provider), fields(resource_group = %resource_group, disk = %name))]
pub async fn delete<P>(provider: &P, resource_group: &str, name: &str) -> Result<()>
where
    P: ComputeProvider + ?Sized,
{
    const ACTION: &str = "deleting the managed disk";

    info!("Deleting managed disk");

    let operation = provider
        .begin_delete_disk(resource_group, name)
        .await
        .map_err(|e| ReconcileError::apply(ACTION, resource_group, name, &e))?;

    provider
        .wait_for_completion(operation)
        .await
        .map_err(|e| ReconcileError::apply(ACTION, resource_group, name, &e))?;

    info!("Managed disk deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CallKind, MockProvider};
    use crate::types::CreationData;

    fn target(size: u32) -> DiskParameters {
        DiskParameters {
            location: "eastus".to_string(),
            tags: None,
            sku: None,
            disk_size_gb: Some(size),
            os_type: None,
            creation_data: CreationData::Empty,
        }
    }

    #[tokio::test]
    async fn test_create_returns_normalized_state() {
        let provider = MockProvider::new().with_resource_group("rg1", "eastus");

        let state = create_or_update(&provider, "rg1", "d1", &target(4)).await.unwrap();

        assert_eq!(state.name, "d1");
        assert_eq!(state.disk_size_gb, Some(4));
        assert_eq!(state.create_option, "empty");
        assert!(provider.disk("rg1", "d1").is_some());
    }

    #[tokio::test]
    async fn test_failed_operation_is_wrapped() {
        let provider = MockProvider::new().with_resource_group("rg1", "eastus");
        provider.fail_on(CallKind::CreateOrUpdateDisk, "quota exceeded");

        let err = create_or_update(&provider, "rg1", "d1", &target(4)).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Apply { .. }));
        let message = err.to_string();
        assert!(message.contains("creating the managed disk"));
        assert!(message.contains("rg1/d1"));
        assert!(message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_delete_removes_disk() {
        let provider = MockProvider::new().with_resource_group("rg1", "eastus");
        create_or_update(&provider, "rg1", "d1", &target(4)).await.unwrap();

        delete(&provider, "rg1", "d1").await.unwrap();

        assert!(provider.disk("rg1", "d1").is_none());
    }
}
