//! Deployment run orchestration.
//!
//! Drives one run over the resource groups in fixed order (workload, then
//! network-service, then ingress): render the group's template, decode it
//! lazily, and reconcile each resource as it is decoded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cluster::ClusterApi;
use crate::config::DeployConfig;
use crate::error::{ConfigError, Result, Stage};
use crate::manifest::{ManifestDecoder, ManifestRenderer, ResourceKind};
use crate::reconciler::{ReconcileAction, ReconcileOutcome, Reconciler};

/// Runs the reconciliation engine over every configured resource group.
pub struct Orchestrator<'a, C: ClusterApi + ?Sized> {
    /// Cluster API client.
    client: &'a C,
    /// Template renderer.
    renderer: &'a ManifestRenderer,
    /// Whether mutating calls are suppressed.
    dry_run: bool,
    /// Whether to keep going after a failure.
    continue_on_error: bool,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Every configured group reconciled without error.
    Succeeded,
    /// At least one failure was recorded.
    Failed,
}

/// The failure that decided a run's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    /// Group the failure happened in.
    pub kind: ResourceKind,
    /// Stage that failed.
    pub stage: Stage,
    /// `kind/namespace/name` of the failing resource, when known.
    pub resource: Option<String>,
    /// Error message.
    pub message: String,
}

/// Aggregate result of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Whether mutating calls were suppressed.
    pub dry_run: bool,
    /// Per-resource outcomes, in the order resources were reconciled.
    pub outcomes: Vec<ReconcileOutcome>,
    /// Optional groups skipped because no manifest was configured.
    pub skipped: Vec<ResourceKind>,
    /// First failure of the run.
    pub failure: Option<RunFailure>,
    /// True iff no failure was recorded.
    pub success: bool,
}

impl<'a, C: ClusterApi + ?Sized> Orchestrator<'a, C> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(client: &'a C, renderer: &'a ManifestRenderer) -> Self {
        Self {
            client,
            renderer,
            dry_run: false,
            continue_on_error: false,
        }
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets whether to continue after failures.
    ///
    /// The configuration's `continue_on_error` also enables this.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Executes one deployment run.
    ///
    /// Per-resource and per-group failures are recorded in the result, not
    /// returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error, before any cluster call, if no workload manifest
    /// is configured.
    pub async fn run(&self, config: &DeployConfig) -> Result<RunResult> {
        if config.manifests.source(ResourceKind::Workload).is_none() {
            return Err(ConfigError::missing("KUBE_TEMPLATE").into());
        }

        let continue_on_error = self.continue_on_error || config.continue_on_error;
        let kinds = config.kind_table();
        let reconciler = Reconciler::new(self.client, &kinds).with_dry_run(self.dry_run);
        let mut run = RunResult::start(self.dry_run);

        info!(
            "Starting deployment run {} in namespace '{}'{}",
            run.run_id,
            config.namespace(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        'groups: for kind in ResourceKind::ALL {
            let group = kind.group_name();
            let Some(path) = config.manifests.source(kind) else {
                debug!("No {group} manifest configured, skipping group");
                run.skipped.push(kind);
                continue;
            };

            info!("Applying {group} group from {}", path.display());

            let text = match self.renderer.render_file(path) {
                Ok(text) => text,
                Err(e) => {
                    run.record_failure(RunFailure {
                        kind,
                        stage: Stage::Render,
                        resource: None,
                        message: e.to_string(),
                    });
                    if continue_on_error {
                        continue;
                    }
                    break;
                }
            };

            let mut applied = 0_usize;
            let decoder = ManifestDecoder::new(&text, kind).with_default_namespace(config.namespace());
            for decoded in decoder {
                let resource = match decoded {
                    Ok(resource) => resource,
                    Err(e) => {
                        run.record_failure(RunFailure {
                            kind,
                            stage: Stage::Decode,
                            resource: None,
                            message: e.to_string(),
                        });
                        if continue_on_error {
                            continue 'groups;
                        }
                        break 'groups;
                    }
                };

                let outcome = reconciler.reconcile(&resource).await;
                let failure = outcome.error.as_ref().map(|e| RunFailure {
                    kind,
                    stage: e.stage(),
                    resource: Some(e.resource()),
                    message: e.to_string(),
                });
                run.outcomes.push(outcome);

                if let Some(failure) = failure {
                    run.record_failure(failure);
                    if !continue_on_error {
                        break 'groups;
                    }
                } else {
                    applied += 1;
                }
            }

            info!("Finished {group} group: {applied} resource(s) reconciled");
        }

        run.finish();
        info!("{run}");
        Ok(run)
    }
}

impl RunResult {
    fn start(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            dry_run,
            outcomes: Vec::new(),
            skipped: Vec::new(),
            failure: None,
            success: true,
        }
    }

    /// Keeps the first failure; later ones are only logged.
    fn record_failure(&mut self, failure: RunFailure) {
        error!("{failure}");
        self.success = false;
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Returns the terminal state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        if self.success {
            RunState::Succeeded
        } else {
            RunState::Failed
        }
    }

    /// Number of outcomes with the given action.
    #[must_use]
    pub fn count(&self, action: ReconcileAction) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == Some(action))
            .count()
    }

    /// Number of resources that failed to reconcile.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} group failed at {} stage", self.kind.group_name(), self.stage)?;
        if let Some(resource) = &self.resource {
            write!(f, " for {resource}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run {}: {} created, {} updated, {} patched, {} unchanged, {} failed",
            match self.state() {
                RunState::Succeeded => "succeeded",
                RunState::Failed => "failed",
            },
            self.count(ReconcileAction::Created),
            self.count(ReconcileAction::Updated),
            self.count(ReconcileAction::Patched),
            self.count(ReconcileAction::NoOp),
            self.failed_count()
        )
    }
}
