//! Configuration module for the deployment tool.
//!
//! This module handles all configuration-related functionality:
//! - Loading the optional YAML configuration file and `.env` file
//! - Merging command-line and environment overrides
//! - Validation before any cluster contact

mod parser;
mod spec;
mod validator;

pub use parser::{ConfigOverrides, ConfigParser};
pub use spec::{ClusterConfig, DeployConfig, ManifestSources};
pub use validator::{ConfigValidator, ValidationResult};
