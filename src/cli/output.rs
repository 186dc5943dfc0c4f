//! Output formatting for CLI commands.
//!
//! This module renders run results and validation reports as a coloured
//! table for humans or as JSON for scripts.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::error::DeployError;
use crate::orchestrator::{RunFailure, RunResult, RunState};
use crate::reconciler::{ReconcileAction, ReconcileOutcome};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Outcome row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of a run.
    #[must_use]
    pub fn format_run(&self, run: &RunResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&RunJson::from(run)).unwrap_or_default(),
            OutputFormat::Text => Self::format_run_text(run),
        }
    }

    fn format_run_text(run: &RunResult) -> String {
        let mut output = String::new();

        let title = if run.dry_run { "Deployment plan" } else { "Deployment run" };
        let _ = writeln!(output, "\n{title} {}\n", run.run_id.to_string().dimmed());

        if run.outcomes.is_empty() {
            output.push_str("   No resources reconciled.\n");
        } else {
            let rows: Vec<OutcomeRow> = run
                .outcomes
                .iter()
                .enumerate()
                .map(|(i, o)| OutcomeRow {
                    index: i + 1,
                    kind: o.kind.to_string(),
                    namespace: o.namespace.clone(),
                    name: o.name.clone(),
                    result: Self::format_result(o),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        for kind in &run.skipped {
            let _ = writeln!(
                output,
                "   {} {} group skipped (no manifest configured)",
                "-".dimmed(),
                kind.group_name()
            );
        }

        let created = run.count(ReconcileAction::Created).to_string();
        let updated = (run.count(ReconcileAction::Updated) + run.count(ReconcileAction::Patched)).to_string();
        let unchanged = run.count(ReconcileAction::NoOp).to_string();
        let failed = run.failed_count().to_string();
        let verb = if run.dry_run { "to " } else { "" };

        let _ = writeln!(
            output,
            "\n{}: {} {verb}create, {} {verb}update, {} unchanged, {} failed ({} ms)",
            match run.state() {
                RunState::Succeeded => "Succeeded".green().bold(),
                RunState::Failed => "Failed".red().bold(),
            },
            created.green(),
            updated.yellow(),
            unchanged.dimmed(),
            failed.red(),
            run.duration().num_milliseconds()
        );

        if let Some(failure) = &run.failure {
            let _ = writeln!(output, "\n{} {failure}", "✗".red());
        }

        output
    }

    fn format_result(outcome: &ReconcileOutcome) -> String {
        match (&outcome.action, &outcome.error) {
            (_, Some(error)) => format!("{} ({})", "failed".red(), error.stage()),
            (Some(action), None) => {
                let label = action.describe(outcome.dry_run);
                match action {
                    ReconcileAction::Created => label.green().to_string(),
                    ReconcileAction::Updated | ReconcileAction::Patched => label.yellow().to_string(),
                    ReconcileAction::NoOp => label.dimmed().to_string(),
                }
            }
            (None, None) => String::new(),
        }
    }

    /// Formats a validation report.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = ValidationJson {
                    valid: result.is_valid(),
                    errors: result.errors.iter().map(ToString::to_string).collect(),
                    warnings: if show_warnings {
                        result.warnings.clone()
                    } else {
                        Vec::new()
                    },
                };
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    format!(
                        "{} Configuration has {} error(s)\n",
                        "✗".red(),
                        result.error_count()
                    )
                };

                for error in &result.errors {
                    let _ = writeln!(output, "   - {error}");
                }

                if show_warnings && result.warning_count() > 0 {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats an error that ended the command.
    #[must_use]
    pub fn format_error(&self, error: &DeployError) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "status": "error",
                    "stage": error.stage(),
                    "message": error.to_string(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {error}", "✗".red()),
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct RunJson {
    run_id: String,
    state: RunState,
    dry_run: bool,
    started_at: String,
    finished_at: String,
    duration_ms: i64,
    created: usize,
    updated: usize,
    patched: usize,
    unchanged: usize,
    failed: usize,
    skipped: Vec<&'static str>,
    failure: Option<RunFailure>,
    outcomes: Vec<OutcomeJson>,
}

#[derive(Serialize)]
struct OutcomeJson {
    kind: String,
    namespace: String,
    name: String,
    action: Option<ReconcileAction>,
    error: Option<String>,
    dry_run: bool,
}

#[derive(Serialize)]
struct ValidationJson {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl From<&RunResult> for RunJson {
    fn from(run: &RunResult) -> Self {
        Self {
            run_id: run.run_id.to_string(),
            state: run.state(),
            dry_run: run.dry_run,
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.to_rfc3339(),
            duration_ms: run.duration().num_milliseconds(),
            created: run.count(ReconcileAction::Created),
            updated: run.count(ReconcileAction::Updated),
            patched: run.count(ReconcileAction::Patched),
            unchanged: run.count(ReconcileAction::NoOp),
            failed: run.failed_count(),
            skipped: run.skipped.iter().map(|k| k.group_name()).collect(),
            failure: run.failure.clone(),
            outcomes: run.outcomes.iter().map(OutcomeJson::from).collect(),
        }
    }
}

impl From<&ReconcileOutcome> for OutcomeJson {
    fn from(outcome: &ReconcileOutcome) -> Self {
        Self {
            kind: outcome.kind.to_string(),
            namespace: outcome.namespace.clone(),
            name: outcome.name.clone(),
            action: outcome.action,
            error: outcome.error.as_ref().map(ToString::to_string),
            dry_run: outcome.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValidator, DeployConfig};
    use crate::error::{ClusterError, ReconcileError, Stage};
    use crate::manifest::ResourceKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_run() -> RunResult {
        let error = ReconcileError::Lookup {
            kind: ResourceKind::Workload,
            name: String::from("worker"),
            namespace: String::from("default"),
            source: ClusterError::network("connection refused"),
        };
        let now = Utc::now();

        RunResult {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            dry_run: false,
            outcomes: vec![
                ReconcileOutcome {
                    kind: ResourceKind::Workload,
                    name: String::from("web"),
                    namespace: String::from("default"),
                    action: Some(ReconcileAction::Created),
                    error: None,
                    dry_run: false,
                },
                ReconcileOutcome {
                    kind: ResourceKind::Workload,
                    name: String::from("worker"),
                    namespace: String::from("default"),
                    action: None,
                    error: Some(error.clone()),
                    dry_run: false,
                },
            ],
            skipped: vec![ResourceKind::Ingress],
            failure: Some(RunFailure {
                kind: ResourceKind::Workload,
                stage: Stage::Lookup,
                resource: Some(error.resource()),
                message: error.to_string(),
            }),
            success: false,
        }
    }

    #[test]
    fn test_run_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_run(&sample_run())).expect("valid JSON");

        assert_eq!(json["state"], "failed");
        assert_eq!(json["created"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["skipped"][0], "ingress");
        assert_eq!(json["failure"]["stage"], "lookup");
        assert_eq!(json["failure"]["resource"], "deployment/default/worker");
        assert_eq!(json["outcomes"][0]["action"], "created");
        assert_eq!(json["outcomes"][0]["dry_run"], false);
        assert!(json["outcomes"][1]["action"].is_null());
    }

    #[test]
    fn test_plan_output_flags_each_outcome() {
        let mut run = sample_run();
        run.dry_run = true;
        run.outcomes.truncate(1);
        run.outcomes[0].dry_run = true;
        run.failure = None;
        run.success = true;

        let json: serde_json::Value = serde_json::from_str(
            &OutputFormatter::new(OutputFormat::Json).format_run(&run),
        )
        .expect("valid JSON");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["outcomes"][0]["dry_run"], true);
        assert_eq!(json["outcomes"][0]["action"], "created");

        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_run(&run);
        assert!(text.contains("would create"));
    }

    #[test]
    fn test_run_text_names_failure() {
        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_run(&sample_run());

        assert!(text.contains("Failed: 1 create, 0 update, 0 unchanged, 1 failed"));
        assert!(text.contains("workload group failed at lookup stage for deployment/default/worker"));
        assert!(text.contains("ingress group skipped"));
    }

    #[test]
    fn test_validation_output() {
        let result = ConfigValidator::new().check(&DeployConfig::default());

        let json: serde_json::Value = serde_json::from_str(
            &OutputFormatter::new(OutputFormat::Json).format_validation(&result, false),
        )
        .expect("valid JSON");
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0], "KUBE_SERVER is not defined");
    }
}
