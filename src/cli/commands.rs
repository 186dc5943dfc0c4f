//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.
//! Every cluster and manifest flag falls back to the matching environment
//! variable, so the tool runs unchanged as a CI pipeline step.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;
use crate::planner::StrategyOverride;

/// kube-deploy - Render manifests and reconcile them against a Kubernetes cluster.
#[derive(Parser, Debug)]
#[command(name = "kube-deploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long, global = true, env = "KUBE_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Cluster and manifest settings.
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Subcommand to execute (defaults to `apply`).
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Cluster connection and manifest settings.
#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Kubernetes API server URL.
    #[arg(long, global = true, env = "KUBE_SERVER")]
    pub server: Option<String>,

    /// Bearer token for the API server.
    #[arg(long, global = true, env = "KUBE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base64-encoded PEM certificate authority of the API server.
    #[arg(long, global = true, env = "KUBE_CA", hide_env_values = true)]
    pub ca: Option<String>,

    /// Namespace for manifests that do not set one.
    #[arg(short, long, global = true, env = "KUBE_NAMESPACE")]
    pub namespace: Option<String>,

    /// Deployment manifest template.
    #[arg(long, global = true, env = "KUBE_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Service manifest template.
    #[arg(long, global = true, env = "KUBE_SERVICE")]
    pub service: Option<PathBuf>,

    /// Ingress manifest template.
    #[arg(long, global = true, env = "KUBE_INGRESS")]
    pub ingress: Option<PathBuf>,

    /// Update strategy override, e.g. `service=replace` (repeatable).
    #[arg(long = "strategy", value_name = "KIND=STRATEGY", global = true)]
    pub strategies: Vec<StrategyOverride>,

    /// Keep reconciling remaining resources after a failure.
    #[arg(long, global = true)]
    pub continue_on_error: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Render, decode, and reconcile every configured manifest.
    Apply,

    /// Show what `apply` would do without changing the cluster.
    Plan,

    /// Validate the configuration.
    Validate {
        /// Show warnings as well as errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Print the rendered manifests.
    Render,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Returns the command to run, defaulting to `apply`.
    #[must_use]
    pub fn selected_command(&self) -> Commands {
        self.command.unwrap_or(Commands::Apply)
    }
}

impl DeployArgs {
    /// Converts the arguments into configuration overrides.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server: self.server.clone(),
            token: self.token.clone(),
            ca: self.ca.clone(),
            namespace: self.namespace.clone(),
            template: self.template.clone(),
            service: self.service.clone(),
            ingress: self.ingress.clone(),
            strategies: self.strategies.clone(),
            continue_on_error: self.continue_on_error,
        }
    }
}
