//! CLI module for the deployment tool.
//!
//! This module provides the command-line interface: argument parsing with
//! environment fallbacks, and output formatting.

mod commands;
mod output;

pub use commands::{Cli, Commands, DeployArgs, OutputFormat};
pub use output::OutputFormatter;
