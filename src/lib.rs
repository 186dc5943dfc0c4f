// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # kube-deploy
//!
//! A one-shot deployment tool that applies a Deployment, and optionally a
//! Service and an Ingress, to a Kubernetes cluster from CI.
//!
//! ## Overview
//!
//! Each run renders the configured manifest templates with CI metadata,
//! decodes them into typed resource descriptors, and reconciles each one
//! against the cluster:
//!
//! - Missing objects are created
//! - Existing objects are replaced or merge-patched, per kind
//! - Unchanged objects are left alone
//!
//! Groups are applied in a fixed order: workload, service, ingress. The first
//! failure stops the run unless `continue_on_error` is set.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, overrides, and validation
//! - [`manifest`]: Template rendering, decoding, and the resource model
//! - [`cluster`]: Kubernetes API client
//! - [`planner`]: Per-kind update strategies and merge patch computation
//! - [`reconciler`]: Create/update/patch decision for a single resource
//! - [`orchestrator`]: Ordered execution of a whole run
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```bash
//! export KUBE_SERVER=https://k8s.example:6443
//! export KUBE_TOKEN=...
//! export KUBE_CA=$(base64 -w0 ca.crt)
//! export KUBE_TEMPLATE=deploy/deployment.yaml
//! export KUBE_SERVICE=deploy/service.yaml
//!
//! kube-deploy plan
//! kube-deploy apply
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod planner;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use cluster::{ClusterApi, KubeClient};
pub use config::{ConfigParser, ConfigValidator, DeployConfig};
pub use error::{DeployError, Result};
pub use manifest::{ManifestDecoder, ManifestRenderer, ResourceDescriptor, ResourceKind};
pub use orchestrator::{Orchestrator, RunResult};
pub use planner::{KindTable, PatchComputer};
pub use reconciler::{ReconcileAction, ReconcileOutcome, Reconciler};
