//! Diff engine: decides whether the live disk needs a create/update call.
//!
//! Only fields the target declares are compared. Undeclared fields never
//! trigger a change, even though the apply call sends the whole target.
//! Creation data and attachment are never compared here.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{DiskParameters, DiskState};

/// Whether `current` differs from `target` on any declared field.
pub fn is_different(current: &DiskState, target: &DiskParameters) -> bool {
    let mut different = false;

    if let Some(size) = target.disk_size_gb {
        if current.disk_size_gb != Some(size) {
            debug!(current = ?current.disk_size_gb, desired = size, "disk_size_gb differs");
            different = true;
        }
    }

    if let Some(os_type) = target.os_type {
        if current.os_type != Some(os_type) {
            debug!(current = ?current.os_type, desired = ?os_type, "os_type differs");
            different = true;
        }
    }

    if let Some(tier) = target.sku {
        if current.storage_account_type.as_deref() != Some(tier.sku_name()) {
            debug!(
                current = ?current.storage_account_type,
                desired = tier.sku_name(),
                "storage_account_type differs"
            );
            different = true;
        }
    }

    if let Some(tags) = &target.tags {
        if !tags_equal(current.tags.as_ref(), tags) {
            debug!("tags differ");
            different = true;
        }
    }

    different
}

/// Whether an apply call is needed. An absent disk always needs one.
pub fn needs_apply(current: Option<&DiskState>, target: &DiskParameters) -> bool {
    match current {
        None => true,
        Some(state) => is_different(state, target),
    }
}

/// Order-independent tag comparison; a missing tag set equals an empty one.
fn tags_equal(current: Option<&HashMap<String, String>>, desired: &HashMap<String, String>) -> bool {
    match current {
        Some(current) => current == desired,
        None => desired.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CreationData, OsType, StorageTier};

    fn current() -> DiskState {
        DiskState {
            id: "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Compute/disks/d1".to_string(),
            name: "d1".to_string(),
            location: "eastus".to_string(),
            tags: Some(HashMap::from([
                ("env".to_string(), "prod".to_string()),
                ("team".to_string(), "storage".to_string()),
            ])),
            create_option: "empty".to_string(),
            source_uri: None,
            disk_size_gb: Some(4),
            os_type: Some(OsType::Linux),
            storage_account_type: Some("Standard_LRS".to_string()),
            managed_by: None,
        }
    }

    fn target() -> DiskParameters {
        DiskParameters {
            location: "eastus".to_string(),
            tags: None,
            sku: None,
            disk_size_gb: None,
            os_type: None,
            creation_data: CreationData::Empty,
        }
    }

    #[test]
    fn test_nothing_declared_is_not_different() {
        assert!(!is_different(&current(), &target()));
    }

    #[test]
    fn test_matching_fields_are_not_different() {
        let target = DiskParameters {
            disk_size_gb: Some(4),
            os_type: Some(OsType::Linux),
            sku: Some(StorageTier::StandardHdd),
            tags: Some(HashMap::from([
                ("team".to_string(), "storage".to_string()),
                ("env".to_string(), "prod".to_string()),
            ])),
            ..target()
        };
        assert!(!is_different(&current(), &target));
    }

    #[test]
    fn test_each_field_triggers_change() {
        let size = DiskParameters { disk_size_gb: Some(8), ..target() };
        let os = DiskParameters { os_type: Some(OsType::Windows), ..target() };
        let sku = DiskParameters { sku: Some(StorageTier::PremiumSsd), ..target() };
        let tags = DiskParameters {
            tags: Some(HashMap::from([("env".to_string(), "dev".to_string())])),
            ..target()
        };

        for t in [size, os, sku, tags] {
            assert!(is_different(&current(), &t), "expected change for {:?}", t);
        }
    }

    #[test]
    fn test_declared_empty_tags_clear_existing() {
        let t = DiskParameters { tags: Some(HashMap::new()), ..target() };
        assert!(is_different(&current(), &t));

        let mut untagged = current();
        untagged.tags = None;
        assert!(!is_different(&untagged, &t));
    }

    #[test]
    fn test_creation_data_is_ignored() {
        let t = DiskParameters {
            creation_data: CreationData::Import { source_uri: "https://x/y.vhd".to_string() },
            ..target()
        };
        assert!(!is_different(&current(), &t));
    }

    #[test]
    fn test_absent_disk_needs_apply() {
        assert!(needs_apply(None, &target()));
        assert!(!needs_apply(Some(&current()), &target()));
    }
}
