//! Desired-state normalizer.
//!
//! Turns a [`DiskSpec`] into the full [`DiskParameters`] object sent to the
//! provider. Pure: no provider access.

use crate::error::{ReconcileError, Result};
use crate::types::{CreateMode, CreationData, DesiredState, DiskParameters, DiskSpec, ManagedBy};

/// Check that the spec is self-consistent.
///
/// Runs before any provider call.
pub fn validate(spec: &DiskSpec) -> Result<()> {
    let fail = |message: &str| -> Result<()> {
        Err(ReconcileError::validation(&spec.resource_group, &spec.name, message))
    };

    if spec.resource_group.trim().is_empty() {
        return fail("resource_group must not be empty");
    }
    if spec.name.trim().is_empty() {
        return fail("name must not be empty");
    }

    match spec.create_mode {
        Some(CreateMode::Import) | Some(CreateMode::Copy) if spec.source.is_none() => {
            return fail("source_uri is required when create_option is import or copy");
        }
        Some(CreateMode::Empty) if spec.disk_size_gb.is_none() => {
            return fail("disk_size_gb is required when create_option is empty");
        }
        _ => {}
    }

    if spec.state == DesiredState::Absent && matches!(spec.managed_by, Some(ManagedBy::Vm(_))) {
        return fail("managed_by can only name a vm when state is present");
    }

    Ok(())
}

/// Build the normalized target for `spec` at `location`.
pub fn normalize(spec: &DiskSpec, location: &str) -> Result<DiskParameters> {
    validate(spec)?;

    let creation_data = match (spec.effective_create_mode(), spec.source.as_ref()) {
        (CreateMode::Empty, _) => CreationData::Empty,
        (CreateMode::Import, Some(uri)) => CreationData::Import {
            source_uri: uri.clone(),
        },
        (CreateMode::Copy, Some(id)) => CreationData::Copy {
            source_resource_id: id.clone(),
        },
        (mode, None) => {
            return Err(ReconcileError::validation(
                &spec.resource_group,
                &spec.name,
                format!("create_option {} requires a source reference", mode.as_str()),
            ));
        }
    };

    Ok(DiskParameters {
        location: location.to_string(),
        tags: spec.tags.clone(),
        sku: spec.storage_tier,
        disk_size_gb: spec.disk_size_gb,
        os_type: spec.os_type,
        creation_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OsType, StorageTier};

    #[test]
    fn test_defaults_to_empty_creation() {
        let spec = DiskSpec::new("rg1", "d1").with_size_gb(4);
        let target = normalize(&spec, "eastus").unwrap();

        assert_eq!(target.location, "eastus");
        assert_eq!(target.creation_data, CreationData::Empty);
        assert_eq!(target.disk_size_gb, Some(4));
        assert!(target.sku.is_none());
        assert!(target.os_type.is_none());
        assert!(target.tags.is_none());
    }

    #[test]
    fn test_import_populates_source_uri() {
        let spec = DiskSpec::new("rg1", "d1").with_create_mode(
            CreateMode::Import,
            Some("https://acct.blob.core.windows.net/vhds/os.vhd".to_string()),
        );
        let target = normalize(&spec, "westus").unwrap();

        assert_eq!(
            target.creation_data,
            CreationData::Import {
                source_uri: "https://acct.blob.core.windows.net/vhds/os.vhd".to_string()
            }
        );
    }

    #[test]
    fn test_copy_populates_source_resource_id() {
        let spec = DiskSpec::new("rg1", "d1")
            .with_create_mode(CreateMode::Copy, Some("/subscriptions/s/disks/src".to_string()))
            .with_storage_tier(StorageTier::PremiumSsd)
            .with_os_type(OsType::Linux);
        let target = normalize(&spec, "westus").unwrap();

        assert_eq!(
            target.creation_data,
            CreationData::Copy {
                source_resource_id: "/subscriptions/s/disks/src".to_string()
            }
        );
        assert_eq!(target.sku, Some(StorageTier::PremiumSsd));
        assert_eq!(target.os_type, Some(OsType::Linux));
    }

    #[test]
    fn test_import_without_source_is_rejected() {
        let spec = DiskSpec::new("rg1", "d1").with_create_mode(CreateMode::Import, None);
        let err = normalize(&spec, "eastus").unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
    }

    #[test]
    fn test_explicit_empty_without_size_is_rejected() {
        let spec = DiskSpec::new("rg1", "d1").with_create_mode(CreateMode::Empty, None);
        assert!(matches!(
            validate(&spec),
            Err(ReconcileError::Validation { .. })
        ));
    }

    #[test]
    fn test_attach_with_absent_is_rejected() {
        let spec = DiskSpec::new("rg1", "d1")
            .absent()
            .with_managed_by(ManagedBy::Vm("vm-a".to_string()));
        assert!(validate(&spec).is_err());

        let detach = DiskSpec::new("rg1", "d1")
            .absent()
            .with_managed_by(ManagedBy::Detached);
        assert!(validate(&detach).is_ok());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let spec = DiskSpec::new("rg1", " ");
        let err = validate(&spec).unwrap_err();
        assert!(err.to_string().contains("name must not be empty"));
    }
}
