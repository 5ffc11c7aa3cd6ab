//! Attachment reconciler: moves a disk between virtual machines.
//!
//! Each vm change is a read-modify-write of the whole vm resource. Detach
//! always runs before attach so the attach side sees the disk released.

use tracing::{debug, info, instrument};

use crate::error::{ProviderError, ReconcileError, Result};
use crate::resource_id::ResourceId;
use crate::snapshot;
use crate::traits::ComputeProvider;
use crate::types::{DataDisk, DiskState, ManagedBy, ManagedDiskReference, VirtualMachine};

/// A virtual machine addressed by resource group and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub resource_group: String,
    pub name: String,
}

/// The vm writes needed to reach the desired attachment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachmentPlan {
    /// Vm to remove the disk from
    pub detach_from: Option<VmRef>,
    /// Vm to add the disk to
    pub attach_to: Option<VmRef>,
}

impl AttachmentPlan {
    /// Whether the current attachment already matches.
    pub fn is_noop(&self) -> bool {
        self.detach_from.is_none() && self.attach_to.is_none()
    }
}

/// The vm a disk is currently attached to, if any.
///
/// The vm's resource group comes from its resource id, falling back to the
/// disk's own group.
pub fn current_vm(resource_group: &str, disk: Option<&DiskState>) -> Option<VmRef> {
    let id = disk?.managed_by.as_deref()?;
    let parsed = ResourceId::parse(id)?;
    Some(VmRef {
        resource_group: parsed
            .resource_group
            .unwrap_or_else(|| resource_group.to_string()),
        name: parsed.name,
    })
}

/// Decide which vm writes move the disk from its current vm to `desired`.
///
/// Vm names compare case-insensitively, as the provider treats them.
pub fn plan(resource_group: &str, disk: Option<&DiskState>, desired: &ManagedBy) -> AttachmentPlan {
    let current = current_vm(resource_group, disk);
    let current_name = current.as_ref().map(|vm| vm.name.as_str()).unwrap_or("");

    if desired.vm_name().eq_ignore_ascii_case(current_name) {
        return AttachmentPlan::default();
    }

    AttachmentPlan {
        detach_from: current,
        attach_to: match desired {
            ManagedBy::Detached => None,
            ManagedBy::Vm(name) => Some(VmRef {
                resource_group: resource_group.to_string(),
                name: name.clone(),
            }),
        },
    }
}

/// One greater than the highest lun in use, or 0 for a vm without data disks.
pub fn next_lun(data_disks: &[DataDisk]) -> u32 {
    data_disks
        .iter()
        .map(|d| d.lun)
        .max()
        .map_or(0, |lun| lun.saturating_add(1))
}

/// Remove every data-disk entry named `disk_name`. Returns whether any was removed.
pub fn remove_data_disk(vm: &mut VirtualMachine, disk_name: &str) -> bool {
    let before = vm.data_disks.len();
    vm.data_disks.retain(|d| !d.has_name(disk_name));
    vm.data_disks.len() != before
}

/// Reconcile the disk's attachment against `desired`.
///
/// Returns the re-read disk when anything changed, otherwise `disk` unchanged.
pub async fn reconcile_attachment<P>(
    provider: &P,
    resource_group: &str,
    disk: &DiskState,
    desired: &ManagedBy,
) -> Result<DiskState>
where
    P: ComputeProvider + ?Sized,
{
    let plan = plan(resource_group, Some(disk), desired);
    if plan.is_noop() {
        debug!(disk = %disk.name, "Attachment already matches");
        return Ok(disk.clone());
    }
    execute(provider, resource_group, disk, &plan).await
}

/// Carry out `plan`: detach, then attach, then re-read the disk.
#[instrument(skip(provider, disk, plan), fields(resource_group = %resource_group, disk = %disk.name))]
pub async fn execute<P>(
    provider: &P,
    resource_group: &str,
    disk: &DiskState,
    plan: &AttachmentPlan,
) -> Result<DiskState>
where
    P: ComputeProvider + ?Sized,
{
    if let Some(vm) = &plan.detach_from {
        detach(provider, vm, disk).await?;
    }
    if let Some(vm) = &plan.attach_to {
        attach(provider, vm, disk).await?;
    }

    snapshot::read(provider, resource_group, &disk.name)
        .await?
        .ok_or_else(|| {
            ReconcileError::provider(
                "re-reading managed disk",
                resource_group,
                &disk.name,
                ProviderError::NotFound(disk.id.clone()),
            )
        })
}

/// Remove the disk from `vm`'s data disks and write the vm back.
#[instrument(skip(provider, disk), fields(vm = %vm.name, disk = %disk.name))]
pub async fn detach<P>(provider: &P, vm: &VmRef, disk: &DiskState) -> Result<()>
where
    P: ComputeProvider + ?Sized,
{
    info!("Detaching managed disk from virtual machine");

    let mut machine = get_vm(provider, vm).await?;
    if !remove_data_disk(&mut machine, &disk.name) {
        return Err(ReconcileError::Attachment {
            resource_group: vm.resource_group.clone(),
            name: vm.name.clone(),
            message: format!("No disk with the name '{}' was found", disk.name),
        });
    }

    update_vm(provider, vm, &machine).await?;
    info!("Managed disk detached");
    Ok(())
}

/// Append the disk to `vm`'s data disks at the next free lun and write the vm back.
#[instrument(skip(provider, disk), fields(vm = %vm.name, disk = %disk.name))]
pub async fn attach<P>(provider: &P, vm: &VmRef, disk: &DiskState) -> Result<u32>
where
    P: ComputeProvider + ?Sized,
{
    let mut machine = get_vm(provider, vm).await?;
    let lun = next_lun(&machine.data_disks);

    info!(lun, "Attaching managed disk to virtual machine");

    machine.data_disks.push(DataDisk::attach(
        lun,
        disk.name.clone(),
        ManagedDiskReference {
            id: disk.id.clone(),
            storage_account_type: disk.storage_account_type.clone(),
        },
    ));

    update_vm(provider, vm, &machine).await?;
    info!(lun, "Managed disk attached");
    Ok(lun)
}

async fn get_vm<P>(provider: &P, vm: &VmRef) -> Result<VirtualMachine>
where
    P: ComputeProvider + ?Sized,
{
    provider
        .get_virtual_machine(&vm.resource_group, &vm.name)
        .await
        .map_err(|e| {
            ReconcileError::provider("getting virtual machine", &vm.resource_group, &vm.name, e)
        })
}

async fn update_vm<P>(provider: &P, vm: &VmRef, machine: &VirtualMachine) -> Result<()>
where
    P: ComputeProvider + ?Sized,
{
    const ACTION: &str = "updating virtual machine";

    let operation = provider
        .begin_create_or_update_virtual_machine(&vm.resource_group, &vm.name, machine)
        .await
        .map_err(|e| ReconcileError::apply(ACTION, &vm.resource_group, &vm.name, &e))?;

    provider
        .wait_for_completion(operation)
        .await
        .map_err(|e| ReconcileError::apply(ACTION, &vm.resource_group, &vm.name, &e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply;
    use crate::mock::MockProvider;
    use crate::types::{CreationData, DataDiskCreateOption, DiskParameters};

    fn data_disk(lun: u32, name: &str) -> DataDisk {
        DataDisk {
            lun,
            name: Some(name.to_string()),
            create_option: DataDiskCreateOption::Empty,
            managed_disk: None,
            document: None,
        }
    }

    fn disk(managed_by: Option<&str>) -> DiskState {
        DiskState {
            id: "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/disks/d1".to_string(),
            name: "d1".to_string(),
            location: "eastus".to_string(),
            tags: None,
            create_option: "empty".to_string(),
            source_uri: None,
            disk_size_gb: Some(4),
            os_type: None,
            storage_account_type: Some("Standard_LRS".to_string()),
            managed_by: managed_by.map(str::to_string),
        }
    }

    const VM_A: &str =
        "/subscriptions/s/resourceGroups/rg-vms/providers/Microsoft.Compute/virtualMachines/vm-a";

    #[test]
    fn test_next_lun() {
        assert_eq!(next_lun(&[]), 0);
        assert_eq!(next_lun(&[data_disk(0, "a")]), 1);
        assert_eq!(next_lun(&[data_disk(3, "a"), data_disk(1, "b")]), 4);
    }

    #[test]
    fn test_remove_data_disk_is_case_insensitive() {
        let mut vm = VirtualMachine {
            id: VM_A.to_string(),
            name: "vm-a".to_string(),
            location: "eastus".to_string(),
            data_disks: vec![data_disk(0, "D1"), data_disk(1, "other")],
            document: None,
        };

        assert!(remove_data_disk(&mut vm, "d1"));
        assert_eq!(vm.data_disks.len(), 1);
        assert!(!remove_data_disk(&mut vm, "d1"));
    }

    #[test]
    fn test_plan_same_vm_is_noop() {
        let plan = plan("rg1", Some(&disk(Some(VM_A))), &ManagedBy::Vm("VM-A".to_string()));
        assert!(plan.is_noop());

        let plan = plan_detached(None);
        assert!(plan.is_noop());
    }

    fn plan_detached(managed_by: Option<&str>) -> AttachmentPlan {
        plan("rg1", Some(&disk(managed_by)), &ManagedBy::Detached)
    }

    #[test]
    fn test_plan_move_detaches_then_attaches() {
        let plan = plan("rg1", Some(&disk(Some(VM_A))), &ManagedBy::Vm("vm-b".to_string()));

        assert_eq!(
            plan.detach_from,
            Some(VmRef { resource_group: "rg-vms".to_string(), name: "vm-a".to_string() })
        );
        assert_eq!(
            plan.attach_to,
            Some(VmRef { resource_group: "rg1".to_string(), name: "vm-b".to_string() })
        );
    }

    #[test]
    fn test_plan_detach_only() {
        let plan = plan_detached(Some(VM_A));
        assert!(plan.detach_from.is_some());
        assert!(plan.attach_to.is_none());
    }

    #[test]
    fn test_plan_for_missing_disk_attaches_only() {
        let plan = plan("rg1", None, &ManagedBy::Vm("vm-b".to_string()));
        assert!(plan.detach_from.is_none());
        assert_eq!(plan.attach_to.map(|vm| vm.name), Some("vm-b".to_string()));
    }

    async fn seeded_disk(provider: &MockProvider) -> DiskState {
        let target = DiskParameters {
            location: "eastus".to_string(),
            tags: None,
            sku: None,
            disk_size_gb: Some(4),
            os_type: None,
            creation_data: CreationData::Empty,
        };
        apply::create_or_update(provider, "rg1", "d1", &target).await.unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_attachment_attaches_and_rereads() {
        let provider = MockProvider::new()
            .with_subscription("sub-1")
            .with_resource_group("rg1", "eastus")
            .with_virtual_machine("rg1", "vm-a", "eastus", vec![data_disk(2, "scratch")]);
        let disk = seeded_disk(&provider).await;

        let state = reconcile_attachment(&provider, "rg1", &disk, &ManagedBy::Vm("vm-a".to_string()))
            .await
            .unwrap();

        let vm_id = provider.vm_id("rg1", "vm-a");
        assert!(vm_id.starts_with("/subscriptions/sub-1/"));
        assert_eq!(state.managed_by.as_deref(), Some(vm_id.as_str()));

        let vm = provider.virtual_machine("rg1", "vm-a").unwrap();
        let entry = vm.data_disks.iter().find(|d| d.has_name("d1")).unwrap();
        assert_eq!(entry.lun, 3);
    }

    #[tokio::test]
    async fn test_reconcile_attachment_noop_issues_no_calls() {
        let provider = MockProvider::new().with_resource_group("rg1", "eastus");
        let disk = seeded_disk(&provider).await;
        provider.clear_calls();

        let state = reconcile_attachment(&provider, "rg1", &disk, &ManagedBy::Detached)
            .await
            .unwrap();

        assert_eq!(state, disk);
        assert!(provider.calls().is_empty());
    }
}
