//! Configuration loading.
//!
//! Configuration comes from an optional YAML file, then a `.env` file, then
//! command-line flags with environment fallbacks. Later sources win; blank
//! values never override.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::manifest::ResourceKind;
use crate::planner::StrategyOverride;

use super::spec::DeployConfig;

/// Values given on the command line (or their environment fallbacks).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// API server URL.
    pub server: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Base64 CA bundle.
    pub ca: Option<String>,
    /// Default namespace.
    pub namespace: Option<String>,
    /// Workload manifest path.
    pub template: Option<PathBuf>,
    /// Service manifest path.
    pub service: Option<PathBuf>,
    /// Ingress manifest path.
    pub ingress: Option<PathBuf>,
    /// Per-kind strategy overrides.
    pub strategies: Vec<StrategyOverride>,
    /// Keep going after per-resource failures.
    pub continue_on_error: bool,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory the `.env` file is looked up in.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is looked up in.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Builds the run configuration from an optional file and overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(&self, file: Option<&Path>, overrides: &ConfigOverrides) -> Result<DeployConfig> {
        let mut config = match file {
            Some(path) => self.load_file(path)?,
            None => DeployConfig::default(),
        };
        Self::apply_overrides(&mut config, overrides);
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// Relative manifest paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        let mut config = self.parse_yaml(&content, Some(path))?;

        if let Some(dir) = path.parent() {
            for kind in ResourceKind::ALL {
                let source = config.manifests.source_mut(kind);
                let resolved = source
                    .as_ref()
                    .filter(|p| p.is_relative())
                    .map(|p| dir.join(p));
                if resolved.is_some() {
                    *source = resolved;
                }
            }
        }

        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML configuration");

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            }
        })?;

        Ok(config)
    }

    /// Applies command-line overrides. Blank values are ignored.
    pub fn apply_overrides(config: &mut DeployConfig, overrides: &ConfigOverrides) {
        fn set(target: &mut String, value: Option<&String>, name: &str) {
            if let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
                debug!("Overriding {name} from command line or environment");
                value.clone_into(target);
            }
        }

        set(&mut config.cluster.server, overrides.server.as_ref(), "server");
        set(&mut config.cluster.token, overrides.token.as_ref(), "token");
        set(&mut config.cluster.ca, overrides.ca.as_ref(), "ca");
        set(&mut config.namespace, overrides.namespace.as_ref(), "namespace");

        let paths = [
            (ResourceKind::Workload, &overrides.template),
            (ResourceKind::NetworkService, &overrides.service),
            (ResourceKind::Ingress, &overrides.ingress),
        ];
        for (kind, path) in paths {
            if let Some(path) = path
                .as_ref()
                .filter(|p| !p.to_string_lossy().trim().is_empty())
            {
                debug!("Overriding {} manifest path", kind.group_name());
                *config.manifests.source_mut(kind) = Some(path.clone());
            }
        }

        for strategy in &overrides.strategies {
            config.strategies.insert(strategy.kind, strategy.strategy);
        }

        if overrides.continue_on_error {
            config.continue_on_error = true;
        }
    }

    /// Loads the `.env` file if present.
    ///
    /// Variables already set in the environment are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}
