//! Parsing of provider resource ids.
//!
//! Ids look like
//! `/subscriptions/{sub}/resourceGroups/{group}/providers/{namespace}/{type}/{name}`.

use std::fmt;

/// The parts of a resource id needed to address a resource again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription: Option<String>,
    pub resource_group: Option<String>,
    pub namespace: Option<String>,
    pub resource_type: Option<String>,
    pub name: String,
}

impl ResourceId {
    /// Parse a resource id. Returns `None` for an empty or nameless id.
    pub fn parse(id: &str) -> Option<Self> {
        let segments: Vec<&str> = id.split('/').filter(|s| !s.is_empty()).collect();
        let name = segments.last()?.to_string();

        let value_after = |key: &str| {
            segments
                .iter()
                .position(|s| s.eq_ignore_ascii_case(key))
                .and_then(|idx| segments.get(idx + 1))
                .map(|v| v.to_string())
        };

        let namespace = value_after("providers");
        let resource_type = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case("providers"))
            .and_then(|idx| segments.get(idx + 2))
            .map(|v| v.to_string());

        Some(Self {
            subscription: value_after("subscriptions"),
            resource_group: value_after("resourceGroups"),
            namespace,
            resource_type,
            name,
        })
    }

    /// Build a compute resource id.
    pub fn compute(
        subscription: &str,
        resource_group: &str,
        resource_type: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription: Some(subscription.to_string()),
            resource_group: Some(resource_group.to_string()),
            namespace: Some("Microsoft.Compute".to_string()),
            resource_type: Some(resource_type.to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sub) = &self.subscription {
            write!(f, "/subscriptions/{}", sub)?;
        }
        if let Some(group) = &self.resource_group {
            write!(f, "/resourceGroups/{}", group)?;
        }
        if let (Some(ns), Some(ty)) = (&self.namespace, &self.resource_type) {
            write!(f, "/providers/{}/{}", ns, ty)?;
        }
        write!(f, "/{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_id() {
        let id = ResourceId::parse(
            "/subscriptions/sub-1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/vm-a",
        )
        .unwrap();

        assert_eq!(id.subscription.as_deref(), Some("sub-1"));
        assert_eq!(id.resource_group.as_deref(), Some("RG1"));
        assert_eq!(id.namespace.as_deref(), Some("Microsoft.Compute"));
        assert_eq!(id.resource_type.as_deref(), Some("virtualMachines"));
        assert_eq!(id.name, "vm-a");
    }

    #[test]
    fn test_parse_bare_name() {
        let id = ResourceId::parse("vm-a").unwrap();
        assert_eq!(id.name, "vm-a");
        assert!(id.resource_group.is_none());
    }

    #[test]
    fn test_parse_empty() {
        assert!(ResourceId::parse("").is_none());
        assert!(ResourceId::parse("/").is_none());
    }

    #[test]
    fn test_display_matches_parse() {
        let id = ResourceId::compute("sub-1", "rg1", "disks", "d1");
        let text = id.to_string();
        assert_eq!(
            text,
            "/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.Compute/disks/d1"
        );
        assert_eq!(ResourceId::parse(&text), Some(id));
    }
}
