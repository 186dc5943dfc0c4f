//! kube-deploy CLI entrypoint.
//!
//! This is the main entrypoint for the kube-deploy command-line tool.

use std::io::Write;
use std::process::ExitCode;

use kube_deploy::cli::{Cli, Commands, OutputFormatter};
use kube_deploy::cluster::KubeClient;
use kube_deploy::config::{ConfigParser, ConfigValidator, DeployConfig};
use kube_deploy::error::Result;
use kube_deploy::manifest::{ManifestRenderer, RenderContext, ResourceKind};
use kube_deploy::orchestrator::Orchestrator;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Values from .env must be visible to clap's env fallbacks.
    let dotenv = ConfigParser::new().load_dotenv();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = dotenv {
        warn!("{e}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);

    match runtime.block_on(run(&cli, &formatter)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag. Logs go to stderr so
/// that stdout carries only command output.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: &Cli, formatter: &OutputFormatter) -> Result<bool> {
    let config = ConfigParser::new().load(cli.config.as_deref(), &cli.deploy.overrides())?;

    match cli.selected_command() {
        Commands::Apply => cmd_apply(&config, false, formatter).await,
        Commands::Plan => cmd_apply(&config, true, formatter).await,
        Commands::Validate { warnings } => cmd_validate(&config, warnings, formatter),
        Commands::Render => cmd_render(&config),
    }
}

/// Reconcile every configured manifest, or only report the changes.
async fn cmd_apply(config: &DeployConfig, dry_run: bool, formatter: &OutputFormatter) -> Result<bool> {
    let validation = ConfigValidator::new().validate(config)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let client = KubeClient::from_config(&config.cluster)?;
    debug!("Using API server {}", client.server());

    let renderer = ManifestRenderer::new(&RenderContext::from_env());
    let run = Orchestrator::new(&client, &renderer)
        .with_dry_run(dry_run)
        .with_continue_on_error(config.continue_on_error)
        .run(config)
        .await?;

    write_stdout(&formatter.format_run(&run))?;

    if let Some(failure) = &run.failure {
        eprintln!("Error: {failure}");
    }

    Ok(run.success)
}

/// Validate configuration.
fn cmd_validate(config: &DeployConfig, show_warnings: bool, formatter: &OutputFormatter) -> Result<bool> {
    let result = ConfigValidator::new().check(config);

    write_stdout(&formatter.format_validation(&result, show_warnings))?;

    Ok(result.is_valid())
}

/// Print every configured manifest after placeholder substitution.
fn cmd_render(config: &DeployConfig) -> Result<bool> {
    let renderer = ManifestRenderer::new(&RenderContext::from_env());

    let mut rendered = Vec::new();
    for kind in ResourceKind::ALL {
        if let Some(path) = config.manifests.source(kind) {
            info!("Rendering {} manifest {}", kind.group_name(), path.display());
            rendered.push(renderer.render_file(path)?);
        }
    }

    if rendered.is_empty() {
        warn!("No manifests configured");
        return Ok(false);
    }

    let mut output = rendered.join("\n---\n");
    if !output.ends_with('\n') {
        output.push('\n');
    }
    write_stdout(&output)?;

    Ok(true)
}

fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
