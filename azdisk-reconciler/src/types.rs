//! Type definitions for desired state, observed state and provider models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// DESIRED STATE
// =============================================================================

/// Storage tier of a managed disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageTier {
    /// Standard HDD
    #[serde(rename = "Standard_LRS")]
    StandardHdd,
    /// Standard SSD
    #[serde(rename = "StandardSSD_LRS")]
    StandardSsd,
    /// Premium SSD
    #[serde(rename = "Premium_LRS")]
    PremiumSsd,
    /// Ultra SSD
    #[serde(rename = "UltraSSD_LRS")]
    UltraSsd,
}

impl StorageTier {
    /// Get the provider sku name.
    pub fn sku_name(&self) -> &'static str {
        match self {
            StorageTier::StandardHdd => "Standard_LRS",
            StorageTier::StandardSsd => "StandardSSD_LRS",
            StorageTier::PremiumSsd => "Premium_LRS",
            StorageTier::UltraSsd => "UltraSSD_LRS",
        }
    }

    /// Parse a provider sku name.
    pub fn from_sku_name(name: &str) -> Option<Self> {
        [
            StorageTier::StandardHdd,
            StorageTier::StandardSsd,
            StorageTier::PremiumSsd,
            StorageTier::UltraSsd,
        ]
        .into_iter()
        .find(|tier| tier.sku_name().eq_ignore_ascii_case(name))
    }
}

/// How a new disk gets its initial content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateMode {
    /// New blank disk
    #[default]
    Empty,
    /// Imported from a VHD blob
    Import,
    /// Copied from another managed disk
    Copy,
}

impl CreateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreateMode::Empty => "empty",
            CreateMode::Import => "import",
            CreateMode::Copy => "copy",
        }
    }
}

/// Operating system type recorded on a disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Linux,
    Windows,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Linux => "linux",
            OsType::Windows => "windows",
        }
    }

    /// Parse the provider's os type name (case-insensitive).
    pub fn from_provider(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("linux") {
            Some(OsType::Linux)
        } else if value.eq_ignore_ascii_case("windows") {
            Some(OsType::Windows)
        } else {
            None
        }
    }
}

/// Whether the disk should exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

/// Explicitly requested attachment of the disk.
///
/// An unset attachment is modelled as `None` on [`DiskSpec::managed_by`],
/// so "leave unchanged" can never be confused with "detach".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedBy {
    /// The disk must not be attached to any vm
    Detached,
    /// The disk must be attached to the named vm
    Vm(String),
}

impl ManagedBy {
    /// Build from the raw field value, where `""` means detach.
    pub fn from_field(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            ManagedBy::Detached
        } else {
            ManagedBy::Vm(value)
        }
    }

    /// The desired vm name, empty when detached.
    pub fn vm_name(&self) -> &str {
        match self {
            ManagedBy::Detached => "",
            ManagedBy::Vm(name) => name,
        }
    }
}

/// Desired state of a managed disk.
///
/// Constructed once per invocation and passed immutably through the
/// reconciliation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSpec {
    /// Resource group containing the disk
    pub resource_group: String,
    /// Disk name
    pub name: String,
    /// Present or absent
    pub state: DesiredState,
    /// Location (defaults to the resource group's location)
    pub location: Option<String>,
    /// Storage tier
    pub storage_tier: Option<StorageTier>,
    /// Creation mode (empty when unset)
    pub create_mode: Option<CreateMode>,
    /// Blob URI for import, disk resource id for copy
    pub source: Option<String>,
    /// OS type (write-once on the provider side)
    pub os_type: Option<OsType>,
    /// Size in GB
    pub disk_size_gb: Option<u32>,
    /// Tags; `Some(empty)` is a declared empty tag set
    pub tags: Option<HashMap<String, String>>,
    /// Attachment; `None` leaves the current attachment untouched
    pub managed_by: Option<ManagedBy>,
}

impl DiskSpec {
    /// Create a spec for a present disk with nothing else declared.
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            state: DesiredState::Present,
            location: None,
            storage_tier: None,
            create_mode: None,
            source: None,
            os_type: None,
            disk_size_gb: None,
            tags: None,
            managed_by: None,
        }
    }

    /// Mark the disk as absent.
    pub fn absent(mut self) -> Self {
        self.state = DesiredState::Absent;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_storage_tier(mut self, tier: StorageTier) -> Self {
        self.storage_tier = Some(tier);
        self
    }

    /// Set the creation mode and its source reference.
    pub fn with_create_mode(mut self, mode: CreateMode, source: Option<String>) -> Self {
        self.create_mode = Some(mode);
        self.source = source;
        self
    }

    pub fn with_os_type(mut self, os_type: OsType) -> Self {
        self.os_type = Some(os_type);
        self
    }

    pub fn with_size_gb(mut self, size_gb: u32) -> Self {
        self.disk_size_gb = Some(size_gb);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_managed_by(mut self, managed_by: ManagedBy) -> Self {
        self.managed_by = Some(managed_by);
        self
    }

    /// The creation mode that applies when the disk is created.
    pub fn effective_create_mode(&self) -> CreateMode {
        self.create_mode.unwrap_or_default()
    }
}

// =============================================================================
// OBSERVED STATE
// =============================================================================

/// Normalized view of a disk as observed on the provider.
///
/// Serialized with the provider-facing field names used in result documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskState {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Option<HashMap<String, String>>,
    /// Lowercased creation option reported by the provider
    pub create_option: String,
    /// Import blob URI or copy source resource id
    pub source_uri: Option<String>,
    pub disk_size_gb: Option<u32>,
    pub os_type: Option<OsType>,
    /// Sku name of the storage tier
    pub storage_account_type: Option<String>,
    /// Resource id of the vm the disk is attached to
    pub managed_by: Option<String>,
}

// =============================================================================
// PROVIDER MODELS
// =============================================================================

/// Resource group as reported by the provider. Also a mock fixture entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub location: String,
}

/// Disk sku.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSku {
    pub name: String,
}

/// Creation data of an existing disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCreationData {
    /// Provider creation option name (e.g. "Empty", "Import", "Copy")
    pub create_option: String,
    pub source_uri: Option<String>,
    pub source_resource_id: Option<String>,
}

/// A managed disk resource as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Option<HashMap<String, String>>,
    pub sku: Option<DiskSku>,
    pub creation_data: DiskCreationData,
    pub disk_size_gb: Option<u32>,
    pub os_type: Option<String>,
    pub managed_by: Option<String>,
}

/// Creation instruction sent with a create/update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationData {
    Empty,
    Import { source_uri: String },
    Copy { source_resource_id: String },
}

impl CreationData {
    pub fn create_mode(&self) -> CreateMode {
        match self {
            CreationData::Empty => CreateMode::Empty,
            CreationData::Import { .. } => CreateMode::Import,
            CreationData::Copy { .. } => CreateMode::Copy,
        }
    }
}

/// Full normalized desired disk, sent as-is on every create/update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskParameters {
    pub location: String,
    pub tags: Option<HashMap<String, String>>,
    pub sku: Option<StorageTier>,
    pub disk_size_gb: Option<u32>,
    pub os_type: Option<OsType>,
    pub creation_data: CreationData,
}

/// Creation option of a vm data-disk entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDiskCreateOption {
    Attach,
    Empty,
    FromImage,
    Other(String),
}

impl DataDiskCreateOption {
    /// Provider name of the option.
    pub fn as_str(&self) -> &str {
        match self {
            DataDiskCreateOption::Attach => "Attach",
            DataDiskCreateOption::Empty => "Empty",
            DataDiskCreateOption::FromImage => "FromImage",
            DataDiskCreateOption::Other(other) => other,
        }
    }

    pub fn from_provider(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "attach" => DataDiskCreateOption::Attach,
            "empty" => DataDiskCreateOption::Empty,
            "fromimage" => DataDiskCreateOption::FromImage,
            _ => DataDiskCreateOption::Other(value.to_string()),
        }
    }
}

/// Reference from a vm data-disk entry to a managed disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDiskReference {
    pub id: String,
    pub storage_account_type: Option<String>,
}

/// One entry of a vm's data-disk list.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDisk {
    pub lun: u32,
    pub name: Option<String>,
    pub create_option: DataDiskCreateOption,
    pub managed_disk: Option<ManagedDiskReference>,
    /// Provider document this entry was read from, written back unchanged
    pub document: Option<serde_json::Value>,
}

impl DataDisk {
    /// New entry attaching an existing managed disk at `lun`.
    pub fn attach(lun: u32, name: impl Into<String>, managed_disk: ManagedDiskReference) -> Self {
        Self {
            lun,
            name: Some(name.into()),
            create_option: DataDiskCreateOption::Attach,
            managed_disk: Some(managed_disk),
            document: None,
        }
    }

    /// Whether this entry carries the given disk name (case-insensitive).
    pub fn has_name(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(name))
    }
}

/// A virtual machine as far as disk attachment is concerned.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub location: String,
    pub data_disks: Vec<DataDisk>,
    /// Full provider document, carried through read-modify-write untouched
    pub document: Option<serde_json::Value>,
}

// =============================================================================
// LONG-RUNNING OPERATIONS
// =============================================================================

/// Resource a long-running operation acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationTarget {
    /// Disk create or update
    Disk { resource_group: String, name: String },
    /// Disk deletion
    DiskDeletion { resource_group: String, name: String },
    /// Virtual machine update
    VirtualMachine { resource_group: String, name: String },
}

/// Handle to a pending long-running provider operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// Provider-assigned operation id
    pub id: String,
    pub target: OperationTarget,
    /// Where to poll for completion; `None` when already complete
    pub status_url: Option<String>,
}

/// Terminal result of a long-running operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Disk(Disk),
    VirtualMachine(VirtualMachine),
    Deleted,
}
