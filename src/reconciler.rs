//! Per-resource reconciliation.
//!
//! This module implements the create-or-update decision for a single
//! decoded resource: look the object up, create it when it is missing, and
//! otherwise apply the update strategy configured for its kind.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::cluster::ClusterApi;
use crate::error::{ClusterError, PatchError, ReconcileError};
use crate::manifest::{ResourceDescriptor, ResourceKind};
use crate::planner::{KindTable, PatchComputer, UpdateStrategy};

/// Action taken (or, in dry-run mode, that would be taken) for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    /// The object did not exist and was created.
    Created,
    /// The object was fully replaced.
    Updated,
    /// A merge patch was applied.
    Patched,
    /// Nothing needed to be sent.
    NoOp,
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Patched => "patched",
            Self::NoOp => "unchanged",
        };
        write!(f, "{s}")
    }
}

impl ReconcileAction {
    /// Describes the action, as planned when `dry_run` is set.
    #[must_use]
    pub const fn describe(self, dry_run: bool) -> &'static str {
        match (self, dry_run) {
            (Self::Created, false) => "created",
            (Self::Created, true) => "would create",
            (Self::Updated, false) => "updated",
            (Self::Updated, true) => "would update",
            (Self::Patched, false) => "patched",
            (Self::Patched, true) => "would patch",
            (Self::NoOp, _) => "unchanged",
        }
    }
}

/// Result of reconciling one resource.
///
/// Exactly one of `action` and `error` is set.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Kind of the resource.
    pub kind: ResourceKind,
    /// Object name.
    pub name: String,
    /// Namespace used for the API calls.
    pub namespace: String,
    /// Action taken on success.
    pub action: Option<ReconcileAction>,
    /// Failure detail.
    pub error: Option<ReconcileError>,
    /// Whether mutating calls were suppressed.
    pub dry_run: bool,
}

impl ReconcileOutcome {
    /// Returns true if the resource reconciled without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `kind/namespace/name`.
    #[must_use]
    pub fn resource(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Reconciles resources against a cluster, one at a time.
pub struct Reconciler<'a, C: ClusterApi + ?Sized> {
    /// Cluster API client.
    client: &'a C,
    /// Update strategy per kind.
    kinds: &'a KindTable,
    /// Merge-patch calculator.
    patcher: PatchComputer,
    /// Whether mutating calls are suppressed.
    dry_run: bool,
}

impl<'a, C: ClusterApi + ?Sized> Reconciler<'a, C> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(client: &'a C, kinds: &'a KindTable) -> Self {
        Self {
            client,
            kinds,
            patcher: PatchComputer::new(),
            dry_run: false,
        }
    }

    /// Enables or disables dry-run mode.
    ///
    /// In dry-run mode lookups and patch computation still run, but no
    /// create, update, or patch call is issued.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reconciles one resource.
    ///
    /// Issues at most one mutating call. Errors are not retried; they are
    /// returned in the outcome.
    pub async fn reconcile(&self, resource: &ResourceDescriptor) -> ReconcileOutcome {
        let namespace = resource.effective_namespace().to_string();
        let result = self.try_reconcile(resource, &namespace).await;

        let (action, error) = match result {
            Ok(action) => (Some(action), None),
            Err(e) => {
                error!("{e}");
                (None, Some(e))
            }
        };

        ReconcileOutcome {
            kind: resource.kind,
            name: resource.name.clone(),
            namespace,
            action,
            error,
            dry_run: self.dry_run,
        }
    }

    async fn try_reconcile(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
    ) -> Result<ReconcileAction, ReconcileError> {
        let kind = resource.kind;
        let name = resource.name.as_str();

        debug!("Looking up {kind} '{namespace}/{name}'");
        let existing = match self.client.get(kind, name, namespace).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => return self.create(resource, namespace).await,
            Err(source) => {
                return Err(ReconcileError::Lookup {
                    kind,
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    source,
                });
            }
        };

        match self.kinds.strategy(kind) {
            UpdateStrategy::Replace => self.replace(resource, namespace, &existing).await,
            UpdateStrategy::MergePatch => self.patch(resource, namespace, &existing).await,
            UpdateStrategy::CreateOnly => {
                info!("{kind} '{namespace}/{name}' exists, leaving it untouched");
                Ok(ReconcileAction::NoOp)
            }
        }
    }

    async fn create(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
    ) -> Result<ReconcileAction, ReconcileError> {
        if !self.dry_run {
            self.client
                .create(resource.kind, namespace, &resource.desired_state)
                .await
                .map_err(|source| mutation_error("create", resource, namespace, source))?;
        }

        Ok(self.applied(ReconcileAction::Created, resource, namespace))
    }

    async fn replace(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
        existing: &Value,
    ) -> Result<ReconcileAction, ReconcileError> {
        if !self.dry_run {
            let body = with_resource_version(&resource.desired_state, existing);
            self.client
                .update(resource.kind, namespace, &body)
                .await
                .map_err(|source| mutation_error("update", resource, namespace, source))?;
        }

        Ok(self.applied(ReconcileAction::Updated, resource, namespace))
    }

    async fn patch(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
        existing: &Value,
    ) -> Result<ReconcileAction, ReconcileError> {
        let patch_error = |source: PatchError| ReconcileError::Patch {
            kind: resource.kind,
            name: resource.name.clone(),
            namespace: namespace.to_string(),
            source,
        };

        let merge_keys = &self.kinds.profile(resource.kind).merge_keys;
        let patch = self
            .patcher
            .compute_patch_value(existing, &resource.raw_text, merge_keys)
            .map_err(patch_error)?;

        if patch.as_object().is_some_and(serde_json::Map::is_empty) {
            debug!(
                "{} '{namespace}/{}' already matches its manifest",
                resource.kind, resource.name
            );
            return Ok(ReconcileAction::NoOp);
        }

        let bytes = serde_json::to_vec(&patch).map_err(|e| {
            patch_error(PatchError::Serialize {
                message: e.to_string(),
            })
        })?;
        debug!("Merge patch for {resource} is {} bytes", bytes.len());

        if !self.dry_run {
            self.client
                .patch(resource.kind, namespace, &resource.name, &bytes)
                .await
                .map_err(|source| mutation_error("patch", resource, namespace, source))?;
        }

        Ok(self.applied(ReconcileAction::Patched, resource, namespace))
    }

    fn applied(&self, action: ReconcileAction, resource: &ResourceDescriptor, namespace: &str) -> ReconcileAction {
        info!(
            "{} '{namespace}/{}': {}",
            resource.kind,
            resource.name,
            action.describe(self.dry_run)
        );
        action
    }
}

fn mutation_error(
    operation: &'static str,
    resource: &ResourceDescriptor,
    namespace: &str,
    source: ClusterError,
) -> ReconcileError {
    ReconcileError::Mutation {
        operation,
        kind: resource.kind,
        name: resource.name.clone(),
        namespace: namespace.to_string(),
        source,
    }
}

/// Copies `metadata.resourceVersion` from `existing` when `desired` has none.
fn with_resource_version(desired: &Value, existing: &Value) -> Value {
    let mut body = desired.clone();

    let version = existing.pointer("/metadata/resourceVersion").cloned();
    if let (Some(version), Some(metadata)) = (
        version,
        body.get_mut("metadata").and_then(Value::as_object_mut),
    ) {
        metadata.entry("resourceVersion").or_insert(version);
    }

    body
}
