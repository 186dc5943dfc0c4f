//! Configuration validation.
//!
//! Checks that everything a run needs is present and usable before any
//! cluster contact. Problems that would only fail later (a manifest path
//! that does not exist yet) are reported as warnings.

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::manifest::ResourceKind;

use super::spec::{ClusterConfig, DeployConfig};

/// Validator for run configurations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

/// All problems found in a configuration.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Fatal problems, in check order.
    pub errors: Vec<ConfigError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found.
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        let mut result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            Err(result.errors.remove(0).into())
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &DeployConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::check_cluster(&config.cluster, &mut result);
        Self::check_namespace(&config.namespace, &mut result);
        Self::check_manifests(config, &mut result);

        result
    }

    fn check_cluster(cluster: &ClusterConfig, result: &mut ValidationResult) {
        let server = cluster.server.trim();
        if server.is_empty() {
            result.errors.push(ConfigError::missing("KUBE_SERVER"));
        } else {
            match reqwest::Url::parse(server) {
                Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                    result.errors.push(ConfigError::invalid(
                        "KUBE_SERVER",
                        format!("unsupported scheme '{}', expected http or https", url.scheme()),
                    ));
                }
                Ok(url) if url.host_str().is_none_or(str::is_empty) => {
                    result
                        .errors
                        .push(ConfigError::invalid("KUBE_SERVER", "URL has no host"));
                }
                Ok(url) => {
                    if url.scheme() == "http" {
                        result.warnings.push(format!(
                            "KUBE_SERVER: '{server}' is plain http, the token will be sent unencrypted"
                        ));
                    }
                }
                Err(e) => {
                    result
                        .errors
                        .push(ConfigError::invalid("KUBE_SERVER", e.to_string()));
                }
            }
        }

        if cluster.token.trim().is_empty() {
            result.errors.push(ConfigError::missing("KUBE_TOKEN"));
        }

        match cluster.ca_pem() {
            Ok(None) => result.errors.push(ConfigError::missing("KUBE_CA")),
            Ok(Some(pem)) => {
                if !String::from_utf8_lossy(&pem).contains("-----BEGIN CERTIFICATE-----") {
                    result
                        .warnings
                        .push(String::from("KUBE_CA: decoded data does not look like a PEM certificate"));
                }
            }
            Err(e) => result.errors.push(e),
        }
    }

    fn check_namespace(namespace: &str, result: &mut ValidationResult) {
        let namespace = namespace.trim();
        if !namespace.is_empty() && !is_valid_label(namespace) {
            result.errors.push(ConfigError::invalid(
                "KUBE_NAMESPACE",
                format!(
                    "'{namespace}' is not a valid namespace. Must be lowercase alphanumeric with hyphens."
                ),
            ));
        }
    }

    fn check_manifests(config: &DeployConfig, result: &mut ValidationResult) {
        if config.manifests.source(ResourceKind::Workload).is_none() {
            result.errors.push(ConfigError::missing("KUBE_TEMPLATE"));
        }

        for kind in ResourceKind::ALL {
            if let Some(path) = config.manifests.source(kind) {
                if !path.exists() {
                    result.warnings.push(format!(
                        "{} manifest '{}' does not exist",
                        kind.group_name(),
                        path.display()
                    ));
                }
            }
        }
    }
}

/// Whether `name` is a DNS label: lowercase alphanumerics and hyphens,
/// starting and ending with an alphanumeric, at most 63 characters.
fn is_valid_label(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let alphanumeric = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    name.chars().all(|c| alphanumeric(c) || c == '-')
        && name.starts_with(alphanumeric)
        && name.ends_with(alphanumeric)
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}
