//! Reconciliation pipeline.
//!
//! Normalizer → snapshot reader → diff engine → apply executor →
//! attachment reconciler. In dry-run mode every decision is still made but
//! no mutating provider call is issued.

use serde::Serialize;
use tracing::{info, instrument};

use crate::apply;
use crate::attachment;
use crate::diff;
use crate::error::{ReconcileError, Result};
use crate::normalize;
use crate::snapshot;
use crate::traits::ComputeProvider;
use crate::types::{CreateMode, DesiredState, DiskSpec, DiskState};

/// Resulting resource representation reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportedState {
    /// The disk as last read from the provider
    Disk(DiskState),
    /// Stand-in when no resource object is available (dry-run, deletion)
    Placeholder(bool),
}

impl ReportedState {
    /// The disk, when one is reported.
    pub fn disk(&self) -> Option<&DiskState> {
        match self {
            ReportedState::Disk(disk) => Some(disk),
            ReportedState::Placeholder(_) => None,
        }
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    pub changed: bool,
    pub state: Option<ReportedState>,
}

impl ReconcileOutcome {
    /// The reported disk, if any.
    pub fn disk(&self) -> Option<&DiskState> {
        self.state.as_ref().and_then(ReportedState::disk)
    }
}

/// Reconciles one managed disk against a provider.
pub struct Reconciler<P> {
    provider: P,
    dry_run: bool,
}

impl<P: ComputeProvider> Reconciler<P> {
    /// Create a reconciler that applies changes.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            dry_run: false,
        }
    }

    /// Only report predicted changes, never mutate.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Bring the disk in line with `spec`.
    #[instrument(
        skip(self, spec),
        fields(resource_group = %spec.resource_group, disk = %spec.name, dry_run = self.dry_run)
    )]
    pub async fn reconcile(&self, spec: &DiskSpec) -> Result<ReconcileOutcome> {
        normalize::validate(spec)?;

        let group = spec.resource_group.as_str();
        let name = spec.name.as_str();

        let current = snapshot::read(&self.provider, group, name).await?;
        let mut changed = false;
        let mut latest = current.clone();
        let mut reported = current.clone().map(ReportedState::Disk);

        if spec.state == DesiredState::Present {
            let location = self.resolve_location(spec).await?;
            let target = normalize::normalize(spec, &location)?;

            if diff::needs_apply(current.as_ref(), &target) {
                if current.is_none()
                    && spec.effective_create_mode() == CreateMode::Empty
                    && target.disk_size_gb.is_none()
                {
                    return Err(ReconcileError::validation(
                        group,
                        name,
                        "disk_size_gb is required to create an empty disk",
                    ));
                }

                changed = true;
                if self.dry_run {
                    info!(exists = current.is_some(), "Would create or update managed disk");
                    reported = Some(ReportedState::Placeholder(true));
                } else {
                    let state = apply::create_or_update(&self.provider, group, name, &target).await?;
                    latest = Some(state.clone());
                    reported = Some(ReportedState::Disk(state));
                }
            }
        }

        if let Some(desired) = &spec.managed_by {
            let plan = attachment::plan(group, latest.as_ref(), desired);
            if !plan.is_noop() {
                changed = true;
                if self.dry_run {
                    info!(
                        detach_from = ?plan.detach_from.as_ref().map(|vm| &vm.name),
                        attach_to = ?plan.attach_to.as_ref().map(|vm| &vm.name),
                        "Would change disk attachment"
                    );
                } else {
                    let disk = latest.as_ref().ok_or_else(|| ReconcileError::Attachment {
                        resource_group: group.to_string(),
                        name: name.to_string(),
                        message: "cannot change the attachment of a disk that does not exist"
                            .to_string(),
                    })?;
                    let state =
                        attachment::reconcile_attachment(&self.provider, group, disk, desired).await?;
                    reported = Some(ReportedState::Disk(state));
                }
            }
        }

        if spec.state == DesiredState::Absent && current.is_some() {
            changed = true;
            if self.dry_run {
                info!("Would delete managed disk");
            } else {
                apply::delete(&self.provider, group, name).await?;
            }
            reported = Some(ReportedState::Placeholder(true));
        }

        info!(changed, "Reconciliation complete");
        Ok(ReconcileOutcome {
            changed,
            state: reported,
        })
    }

    /// The declared location, or the resource group's location.
    async fn resolve_location(&self, spec: &DiskSpec) -> Result<String> {
        if let Some(location) = &spec.location {
            return Ok(location.clone());
        }

        let group = self
            .provider
            .get_resource_group(&spec.resource_group)
            .await
            .map_err(|e| {
                ReconcileError::provider("getting resource group", &spec.resource_group, &spec.name, e)
            })?;
        Ok(group.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    #[tokio::test]
    async fn test_location_defaults_to_resource_group() {
        let provider = MockProvider::new().with_resource_group("rg1", "westeurope");
        let reconciler = Reconciler::new(provider);

        let outcome = reconciler
            .reconcile(&DiskSpec::new("rg1", "d1").with_size_gb(4))
            .await
            .unwrap();

        assert_eq!(outcome.disk().unwrap().location, "westeurope");
    }

    #[tokio::test]
    async fn test_missing_resource_group_is_fatal() {
        let reconciler = Reconciler::new(MockProvider::new());

        let err = reconciler
            .reconcile(&DiskSpec::new("nope", "d1").with_size_gb(4))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Provider { .. }));
        assert!(err.to_string().contains("getting resource group"));
    }

    #[tokio::test]
    async fn test_create_without_size_is_rejected_before_apply() {
        let provider = MockProvider::new().with_resource_group("rg1", "eastus");
        let reconciler = Reconciler::new(provider);

        let err = reconciler.reconcile(&DiskSpec::new("rg1", "d1")).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(reconciler.provider().mutating_calls().is_empty());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ReconcileOutcome {
            changed: true,
            state: Some(ReportedState::Placeholder(true)),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({ "changed": true, "state": true }));

        let absent = ReconcileOutcome { changed: false, state: None };
        let json = serde_json::to_value(&absent).unwrap();
        assert_eq!(json, serde_json::json!({ "changed": false, "state": null }));
    }
}
