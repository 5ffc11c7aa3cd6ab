//! Cloud provider collaborator trait.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::types::*;

/// Compute provider abstraction.
///
/// This trait is the only way the reconciler talks to the cloud. Mutating
/// calls return an [`OperationHandle`]; the reconciler always follows them
/// with [`wait_for_completion`](ComputeProvider::wait_for_completion) before
/// taking the next step.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    // =========================================================================
    // Resource groups
    // =========================================================================

    /// Get a resource group.
    async fn get_resource_group(&self, resource_group: &str) -> ProviderResult<ResourceGroup>;

    // =========================================================================
    // Disks
    // =========================================================================

    /// Get a disk. Absence is reported as [`ProviderError::NotFound`](crate::ProviderError::NotFound).
    async fn get_disk(&self, resource_group: &str, name: &str) -> ProviderResult<Disk>;

    /// Start creating or updating a disk.
    async fn begin_create_or_update_disk(
        &self,
        resource_group: &str,
        name: &str,
        parameters: &DiskParameters,
    ) -> ProviderResult<OperationHandle>;

    /// Start deleting a disk.
    async fn begin_delete_disk(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<OperationHandle>;

    // =========================================================================
    // Virtual machines
    // =========================================================================

    /// Get a vm including its instance view.
    async fn get_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<VirtualMachine>;

    /// Start writing back a full vm resource.
    async fn begin_create_or_update_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ProviderResult<OperationHandle>;

    // =========================================================================
    // Long-running operations
    // =========================================================================

    /// Block until the operation reaches a terminal state.
    async fn wait_for_completion(&self, operation: OperationHandle) -> ProviderResult<OperationOutput>;
}
