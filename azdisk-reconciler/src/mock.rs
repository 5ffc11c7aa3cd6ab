//! Mock compute provider for testing and development.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, instrument};

use crate::error::{ProviderError, ProviderResult};
use crate::resource_id::ResourceId;
use crate::traits::ComputeProvider;
use crate::types::*;

/// Subscription id used when none is configured.
pub const MOCK_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Kind of provider call, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    GetResourceGroup,
    GetDisk,
    CreateOrUpdateDisk,
    DeleteDisk,
    GetVirtualMachine,
    UpdateVirtualMachine,
}

/// A call received by the mock, recorded in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    GetResourceGroup { resource_group: String },
    GetDisk { resource_group: String, name: String },
    CreateOrUpdateDisk { resource_group: String, name: String, parameters: DiskParameters },
    DeleteDisk { resource_group: String, name: String },
    GetVirtualMachine { resource_group: String, name: String },
    UpdateVirtualMachine { resource_group: String, name: String, data_disks: Vec<DataDisk> },
    WaitForCompletion { operation_id: String },
}

impl ProviderCall {
    /// Whether the call changes provider state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ProviderCall::CreateOrUpdateDisk { .. }
                | ProviderCall::DeleteDisk { .. }
                | ProviderCall::UpdateVirtualMachine { .. }
        )
    }
}

/// Seed data for a mock provider, loadable from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MockFixture {
    pub subscription_id: Option<String>,
    pub resource_groups: Vec<ResourceGroup>,
    pub disks: Vec<FixtureDisk>,
    pub virtual_machines: Vec<FixtureVm>,
}

/// A disk in a [`MockFixture`].
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDisk {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub disk_size_gb: u32,
    #[serde(default)]
    pub storage_account_type: Option<StorageTier>,
    #[serde(default)]
    pub os_type: Option<OsType>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

/// A vm in a [`MockFixture`]. Disks listed here are attached at luns 0, 1, ...
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureVm {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub disks: Vec<String>,
}

type Key = (String, String);

fn key(resource_group: &str, name: &str) -> Key {
    (resource_group.to_ascii_lowercase(), name.to_ascii_lowercase())
}

#[derive(Default)]
struct MockState {
    resource_groups: HashMap<String, ResourceGroup>,
    disks: HashMap<Key, Disk>,
    vms: HashMap<Key, VirtualMachine>,
    operations: HashMap<String, ProviderResult<OperationOutput>>,
    failures: HashMap<CallKind, String>,
    calls: Vec<ProviderCall>,
}

impl MockState {
    /// Injected failure for `kind`, if any.
    fn failure(&self, kind: CallKind) -> Option<ProviderError> {
        self.failures.get(&kind).map(|message| ProviderError::Request {
            status: 500,
            message: message.clone(),
        })
    }

    fn find_disk_by_id(&self, id: &str) -> Option<&Disk> {
        self.disks.values().find(|d| d.id.eq_ignore_ascii_case(id))
    }

    fn start_operation(
        &mut self,
        target: OperationTarget,
        result: ProviderResult<OperationOutput>,
    ) -> OperationHandle {
        let id = uuid::Uuid::new_v4().to_string();
        self.operations.insert(id.clone(), result);
        OperationHandle {
            id,
            target,
            status_url: None,
        }
    }
}

/// Mock compute provider.
///
/// Holds resource groups, disks and vms in memory and mimics the provider
/// rules the reconciler depends on:
/// - vm writes update `managed_by` on the disks they reference
/// - a disk may be referenced by one vm only
/// - copies may not be smaller than their source, disks may not shrink
/// - attached disks cannot be deleted
///
/// Every call is recorded so tests can assert on what was issued and in
/// which order.
pub struct MockProvider {
    subscription_id: String,
    state: RwLock<MockState>,
}

impl MockProvider {
    /// Create an empty mock provider.
    pub fn new() -> Self {
        info!("Creating mock compute provider");
        Self {
            subscription_id: MOCK_SUBSCRIPTION_ID.to_string(),
            state: RwLock::new(MockState::default()),
        }
    }

    /// Create a mock provider seeded from a fixture.
    pub fn from_fixture(fixture: MockFixture) -> Self {
        let mut provider = Self::new();
        if let Some(sub) = fixture.subscription_id {
            provider.subscription_id = sub;
        }
        for group in fixture.resource_groups {
            provider = provider.with_resource_group(group.name, group.location);
        }
        for disk in fixture.disks {
            let resource_group = disk.resource_group.clone();
            let seeded = Disk {
                id: provider.disk_id(&disk.resource_group, &disk.name),
                name: disk.name,
                location: disk.location,
                tags: disk.tags,
                sku: Some(DiskSku {
                    name: disk
                        .storage_account_type
                        .unwrap_or(StorageTier::StandardHdd)
                        .sku_name()
                        .to_string(),
                }),
                creation_data: DiskCreationData {
                    create_option: "Empty".to_string(),
                    source_uri: None,
                    source_resource_id: None,
                },
                disk_size_gb: Some(disk.disk_size_gb),
                os_type: disk.os_type.map(provider_os_name),
                managed_by: None,
            };
            provider = provider.with_disk(&resource_group, seeded);
        }
        for vm in fixture.virtual_machines {
            let vm_id = provider.vm_id(&vm.resource_group, &vm.name);
            let mut data_disks = Vec::new();
            for (lun, disk_name) in (0u32..).zip(vm.disks.iter()) {
                let disk_id = provider.disk_id(&vm.resource_group, disk_name);
                if let Ok(state) = provider.state.get_mut() {
                    if let Some(disk) = state.disks.get_mut(&key(&vm.resource_group, disk_name)) {
                        disk.managed_by = Some(vm_id.clone());
                    }
                }
                data_disks.push(DataDisk::attach(
                    lun,
                    disk_name.clone(),
                    ManagedDiskReference { id: disk_id, storage_account_type: None },
                ));
            }
            provider = provider.with_virtual_machine(&vm.resource_group, &vm.name, &vm.location, data_disks);
        }
        provider
    }

    /// Use a specific subscription id for generated resource ids.
    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = subscription_id.into();
        self
    }

    /// Add a resource group.
    pub fn with_resource_group(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        let group = ResourceGroup { name: name.into(), location: location.into() };
        if let Ok(state) = self.state.get_mut() {
            state.resource_groups.insert(group.name.to_ascii_lowercase(), group);
        }
        self
    }

    /// Add a disk as-is.
    pub fn with_disk(mut self, resource_group: &str, disk: Disk) -> Self {
        if let Ok(state) = self.state.get_mut() {
            state.disks.insert(key(resource_group, &disk.name), disk);
        }
        self
    }

    /// Add a vm with the given data disks.
    pub fn with_virtual_machine(
        mut self,
        resource_group: &str,
        name: &str,
        location: &str,
        data_disks: Vec<DataDisk>,
    ) -> Self {
        let vm = VirtualMachine {
            id: self.vm_id(resource_group, name),
            name: name.to_string(),
            location: location.to_string(),
            data_disks,
            document: None,
        };
        if let Ok(state) = self.state.get_mut() {
            state.vms.insert(key(resource_group, name), vm);
        }
        self
    }

    /// Resource id the mock assigns to a disk.
    pub fn disk_id(&self, resource_group: &str, name: &str) -> String {
        ResourceId::compute(&self.subscription_id, resource_group, "disks", name).to_string()
    }

    /// Resource id the mock assigns to a vm.
    pub fn vm_id(&self, resource_group: &str, name: &str) -> String {
        ResourceId::compute(&self.subscription_id, resource_group, "virtualMachines", name)
            .to_string()
    }

    /// Make every later call of `kind` fail with `message`.
    ///
    /// Reads fail immediately; mutating calls fail when awaited.
    pub fn fail_on(&self, kind: CallKind, message: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.failures.insert(kind, message.into());
        }
    }

    /// Current copy of a disk.
    pub fn disk(&self, resource_group: &str, name: &str) -> Option<Disk> {
        self.state.read().ok()?.disks.get(&key(resource_group, name)).cloned()
    }

    /// Current copy of a vm.
    pub fn virtual_machine(&self, resource_group: &str, name: &str) -> Option<VirtualMachine> {
        self.state.read().ok()?.vms.get(&key(resource_group, name)).cloned()
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.read().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Mutating calls received so far.
    pub fn mutating_calls(&self) -> Vec<ProviderCall> {
        self.calls().into_iter().filter(ProviderCall::is_mutating).collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.write() {
            state.calls.clear();
        }
    }

    fn lock(&self) -> ProviderResult<RwLockWriteGuard<'_, MockState>> {
        self.state
            .write()
            .map_err(|_| ProviderError::Internal("Lock poisoned".to_string()))
    }

    fn build_disk(
        &self,
        state: &MockState,
        resource_group: &str,
        name: &str,
        parameters: &DiskParameters,
    ) -> ProviderResult<Disk> {
        if let Some(existing) = state.disks.get(&key(resource_group, name)) {
            if let (Some(new), Some(old)) = (parameters.disk_size_gb, existing.disk_size_gb) {
                if new < old {
                    return Err(bad_request(format!(
                        "Disk size cannot be reduced from {} GB to {} GB",
                        old, new
                    )));
                }
            }

            let mut updated = existing.clone();
            updated.tags = parameters.tags.clone();
            if let Some(tier) = parameters.sku {
                updated.sku = Some(DiskSku { name: tier.sku_name().to_string() });
            }
            if let Some(size) = parameters.disk_size_gb {
                updated.disk_size_gb = Some(size);
            }
            if let Some(os_type) = parameters.os_type {
                updated.os_type = Some(provider_os_name(os_type));
            }
            return Ok(updated);
        }

        let (creation_data, disk_size_gb) = match &parameters.creation_data {
            CreationData::Empty => {
                let size = parameters.disk_size_gb.ok_or_else(|| {
                    bad_request("diskSizeGB is required for an empty disk".to_string())
                })?;
                let data = DiskCreationData {
                    create_option: "Empty".to_string(),
                    source_uri: None,
                    source_resource_id: None,
                };
                (data, Some(size))
            }
            CreationData::Import { source_uri } => {
                let data = DiskCreationData {
                    create_option: "Import".to_string(),
                    source_uri: Some(source_uri.clone()),
                    source_resource_id: None,
                };
                (data, parameters.disk_size_gb)
            }
            CreationData::Copy { source_resource_id } => {
                let source = state.find_disk_by_id(source_resource_id).ok_or_else(|| {
                    ProviderError::NotFound(source_resource_id.clone())
                })?;
                if let (Some(new), Some(source_size)) = (parameters.disk_size_gb, source.disk_size_gb) {
                    if new < source_size {
                        return Err(bad_request(format!(
                            "Disk size {} GB is smaller than source disk size {} GB",
                            new, source_size
                        )));
                    }
                }
                let data = DiskCreationData {
                    create_option: "Copy".to_string(),
                    source_uri: None,
                    source_resource_id: Some(source_resource_id.clone()),
                };
                (data, parameters.disk_size_gb.or(source.disk_size_gb))
            }
        };

        let tier = parameters.sku.unwrap_or(StorageTier::StandardHdd);
        Ok(Disk {
            id: self.disk_id(resource_group, name),
            name: name.to_string(),
            location: parameters.location.clone(),
            tags: parameters.tags.clone(),
            sku: Some(DiskSku { name: tier.sku_name().to_string() }),
            creation_data,
            disk_size_gb,
            os_type: parameters.os_type.map(provider_os_name),
            managed_by: None,
        })
    }

    fn write_vm(
        state: &mut MockState,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ProviderResult<VirtualMachine> {
        let vm_key = key(resource_group, name);
        let existing = state
            .vms
            .get(&vm_key)
            .ok_or_else(|| ProviderError::NotFound(format!("{}/{}", resource_group, name)))?;
        let vm_id = existing.id.clone();

        let mut luns = std::collections::HashSet::new();
        let mut data_disks = Vec::with_capacity(vm.data_disks.len());
        for entry in &vm.data_disks {
            if !luns.insert(entry.lun) {
                return Err(bad_request(format!("Lun {} is already in use", entry.lun)));
            }
            let mut entry = entry.clone();
            if let Some(reference) = &entry.managed_disk {
                let disk = state
                    .find_disk_by_id(&reference.id)
                    .ok_or_else(|| ProviderError::NotFound(reference.id.clone()))?;
                if let Some(owner) = &disk.managed_by {
                    if !owner.eq_ignore_ascii_case(&vm_id) {
                        return Err(ProviderError::Request {
                            status: 409,
                            message: format!("Disk {} is already attached to {}", disk.name, owner),
                        });
                    }
                }
                if entry.name.is_none() {
                    entry.name = Some(disk.name.clone());
                }
            }
            data_disks.push(entry);
        }

        for disk in state.disks.values_mut() {
            let referenced = data_disks.iter().any(|d| {
                d.managed_disk
                    .as_ref()
                    .is_some_and(|r| r.id.eq_ignore_ascii_case(&disk.id))
            });
            let owned = disk
                .managed_by
                .as_deref()
                .is_some_and(|owner| owner.eq_ignore_ascii_case(&vm_id));
            if referenced {
                disk.managed_by = Some(vm_id.clone());
            } else if owned {
                disk.managed_by = None;
            }
        }

        let stored = state
            .vms
            .get_mut(&vm_key)
            .ok_or_else(|| ProviderError::NotFound(format!("{}/{}", resource_group, name)))?;
        stored.data_disks = data_disks;
        Ok(stored.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn bad_request(message: String) -> ProviderError {
    ProviderError::Request { status: 400, message }
}

fn provider_os_name(os_type: OsType) -> String {
    match os_type {
        OsType::Linux => "Linux".to_string(),
        OsType::Windows => "Windows".to_string(),
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    async fn get_resource_group(&self, resource_group: &str) -> ProviderResult<ResourceGroup> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::GetResourceGroup {
            resource_group: resource_group.to_string(),
        });
        if let Some(err) = state.failure(CallKind::GetResourceGroup) {
            return Err(err);
        }

        state
            .resource_groups
            .get(&resource_group.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("resource group {}", resource_group)))
    }

    #[instrument(skip(self), fields(resource_group = %resource_group, disk = %name))]
    async fn get_disk(&self, resource_group: &str, name: &str) -> ProviderResult<Disk> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::GetDisk {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = state.failure(CallKind::GetDisk) {
            return Err(err);
        }

        state
            .disks
            .get(&key(resource_group, name))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("{}/{}", resource_group, name)))
    }

    #[instrument(skip(self, parameters), fields(resource_group = %resource_group, disk = %name))]
    async fn begin_create_or_update_disk(
        &self,
        resource_group: &str,
        name: &str,
        parameters: &DiskParameters,
    ) -> ProviderResult<OperationHandle> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::CreateOrUpdateDisk {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            parameters: parameters.clone(),
        });

        if !state.resource_groups.contains_key(&resource_group.to_ascii_lowercase()) {
            return Err(ProviderError::NotFound(format!("resource group {}", resource_group)));
        }

        let result = match state.failure(CallKind::CreateOrUpdateDisk) {
            Some(err) => Err(ProviderError::OperationFailed(err.to_string())),
            None => self.build_disk(&state, resource_group, name, parameters),
        };
        let result = result.map(|disk| {
            state.disks.insert(key(resource_group, name), disk.clone());
            OperationOutput::Disk(disk)
        });

        debug!(ok = result.is_ok(), "Mock disk operation started");
        let target = OperationTarget::Disk {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        };
        Ok(state.start_operation(target, result))
    }

    #[instrument(skip(self), fields(resource_group = %resource_group, disk = %name))]
    async fn begin_delete_disk(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<OperationHandle> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::DeleteDisk {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        });

        let disk_key = key(resource_group, name);
        let result = match state.failure(CallKind::DeleteDisk) {
            Some(err) => Err(ProviderError::OperationFailed(err.to_string())),
            None => match state.disks.get(&disk_key).and_then(|d| d.managed_by.clone()) {
                Some(owner) => Err(ProviderError::Request {
                    status: 409,
                    message: format!("Disk {} is attached to {}", name, owner),
                }),
                None => {
                    state.disks.remove(&disk_key);
                    Ok(OperationOutput::Deleted)
                }
            },
        };

        let target = OperationTarget::DiskDeletion {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        };
        Ok(state.start_operation(target, result))
    }

    #[instrument(skip(self), fields(resource_group = %resource_group, vm = %name))]
    async fn get_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<VirtualMachine> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::GetVirtualMachine {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = state.failure(CallKind::GetVirtualMachine) {
            return Err(err);
        }

        state
            .vms
            .get(&key(resource_group, name))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("{}/{}", resource_group, name)))
    }

    #[instrument(skip(self, vm), fields(resource_group = %resource_group, vm = %name))]
    async fn begin_create_or_update_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ProviderResult<OperationHandle> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::UpdateVirtualMachine {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            data_disks: vm.data_disks.clone(),
        });

        let result = match state.failure(CallKind::UpdateVirtualMachine) {
            Some(err) => Err(ProviderError::OperationFailed(err.to_string())),
            None => Self::write_vm(&mut state, resource_group, name, vm)
                .map(OperationOutput::VirtualMachine),
        };

        let target = OperationTarget::VirtualMachine {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        };
        Ok(state.start_operation(target, result))
    }

    async fn wait_for_completion(&self, operation: OperationHandle) -> ProviderResult<OperationOutput> {
        let mut state = self.lock()?;
        state.calls.push(ProviderCall::WaitForCompletion {
            operation_id: operation.id.clone(),
        });

        state
            .operations
            .remove(&operation.id)
            .unwrap_or_else(|| {
                Err(ProviderError::Internal(format!("Unknown operation {}", operation.id)))
            })
    }
}
