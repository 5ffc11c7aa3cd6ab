//! Translation between provider models and Azure Resource Manager documents.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::{ProviderError, ProviderResult};
use crate::types::*;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sku: Option<SkuDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    managed_by: Option<String>,
    properties: DiskPropertiesDocument,
}

#[derive(Debug, Serialize, Deserialize)]
struct SkuDocument {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskPropertiesDocument {
    creation_data: CreationDataDocument,
    #[serde(rename = "diskSizeGB", default, skip_serializing_if = "Option::is_none")]
    disk_size_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    os_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreationDataDocument {
    create_option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_resource_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceGroupDocument {
    name: String,
    location: String,
}

fn invalid(what: &str, e: impl std::fmt::Display) -> ProviderError {
    ProviderError::InvalidResponse(format!("{}: {}", what, e))
}

/// Parse a resource group document.
pub fn resource_group_from_document(document: Value) -> ProviderResult<ResourceGroup> {
    let doc: ResourceGroupDocument =
        serde_json::from_value(document).map_err(|e| invalid("resource group", e))?;
    Ok(ResourceGroup {
        name: doc.name,
        location: doc.location,
    })
}

/// Parse a disk document.
pub fn disk_from_document(document: Value) -> ProviderResult<Disk> {
    let doc: DiskDocument = serde_json::from_value(document).map_err(|e| invalid("disk", e))?;
    let creation = doc.properties.creation_data;
    Ok(Disk {
        id: doc.id.unwrap_or_default(),
        name: doc.name.unwrap_or_default(),
        location: doc.location,
        tags: doc.tags,
        sku: doc.sku.map(|sku| DiskSku { name: sku.name }),
        creation_data: DiskCreationData {
            create_option: creation.create_option,
            source_uri: creation.source_uri,
            source_resource_id: creation.source_resource_id,
        },
        disk_size_gb: doc.properties.disk_size_gb,
        os_type: doc.properties.os_type,
        managed_by: doc.managed_by,
    })
}

/// Build the PUT body for a disk.
pub fn disk_document(parameters: &DiskParameters) -> ProviderResult<Value> {
    let creation_data = match &parameters.creation_data {
        CreationData::Empty => CreationDataDocument {
            create_option: "Empty".to_string(),
            source_uri: None,
            source_resource_id: None,
        },
        CreationData::Import { source_uri } => CreationDataDocument {
            create_option: "Import".to_string(),
            source_uri: Some(source_uri.clone()),
            source_resource_id: None,
        },
        CreationData::Copy { source_resource_id } => CreationDataDocument {
            create_option: "Copy".to_string(),
            source_uri: None,
            source_resource_id: Some(source_resource_id.clone()),
        },
    };

    let doc = DiskDocument {
        id: None,
        name: None,
        location: parameters.location.clone(),
        tags: parameters.tags.clone(),
        sku: parameters.sku.map(|tier| SkuDocument {
            name: tier.sku_name().to_string(),
        }),
        managed_by: None,
        properties: DiskPropertiesDocument {
            creation_data,
            disk_size_gb: parameters.disk_size_gb,
            os_type: parameters.os_type.map(|os| match os {
                OsType::Linux => "Linux".to_string(),
                OsType::Windows => "Windows".to_string(),
            }),
        },
    };

    serde_json::to_value(doc).map_err(|e| ProviderError::Internal(e.to_string()))
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn data_disk_from_document(entry: &Value) -> ProviderResult<DataDisk> {
    let lun = entry
        .get("lun")
        .and_then(Value::as_u64)
        .and_then(|lun| u32::try_from(lun).ok())
        .ok_or_else(|| invalid("data disk", "missing lun"))?;

    let managed_disk = entry.get("managedDisk").and_then(|md| {
        str_field(md, "id").map(|id| ManagedDiskReference {
            id,
            storage_account_type: str_field(md, "storageAccountType"),
        })
    });

    Ok(DataDisk {
        lun,
        name: str_field(entry, "name"),
        create_option: DataDiskCreateOption::from_provider(
            entry.get("createOption").and_then(Value::as_str).unwrap_or("Attach"),
        ),
        managed_disk,
        document: Some(entry.clone()),
    })
}

/// Parse a vm document, keeping the whole document for the write back.
pub fn vm_from_document(document: Value) -> ProviderResult<VirtualMachine> {
    let data_disks = match document.pointer("/properties/storageProfile/dataDisks") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(data_disk_from_document)
            .collect::<ProviderResult<Vec<_>>>()?,
        _ => Vec::new(),
    };

    Ok(VirtualMachine {
        id: str_field(&document, "id").unwrap_or_default(),
        name: str_field(&document, "name").ok_or_else(|| invalid("virtual machine", "missing name"))?,
        location: str_field(&document, "location").unwrap_or_default(),
        data_disks,
        document: Some(document),
    })
}

fn data_disk_document(disk: &DataDisk) -> Value {
    if let Some(document) = &disk.document {
        return document.clone();
    }

    let mut entry = Map::new();
    entry.insert("lun".to_string(), json!(disk.lun));
    if let Some(name) = &disk.name {
        entry.insert("name".to_string(), json!(name));
    }
    entry.insert("createOption".to_string(), json!(disk.create_option.as_str()));
    if let Some(managed) = &disk.managed_disk {
        let mut reference = Map::new();
        reference.insert("id".to_string(), json!(managed.id));
        if let Some(tier) = &managed.storage_account_type {
            reference.insert("storageAccountType".to_string(), json!(tier));
        }
        entry.insert("managedDisk".to_string(), Value::Object(reference));
    }
    Value::Object(entry)
}

/// Build the PUT body for a vm: the document as read, minus read-only
/// sections, with its data-disk list replaced.
pub fn vm_document(vm: &VirtualMachine) -> Value {
    let mut document = vm
        .document
        .clone()
        .unwrap_or_else(|| json!({ "location": vm.location }));

    if let Some(root) = document.as_object_mut() {
        root.remove("resources");
        let properties = root
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(properties) = properties.as_object_mut() {
            properties.remove("instanceView");
            let profile = properties
                .entry("storageProfile")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(profile) = profile.as_object_mut() {
                profile.insert(
                    "dataDisks".to_string(),
                    Value::Array(vm.data_disks.iter().map(data_disk_document).collect()),
                );
            }
        }
    }

    document
}
