//! Configuration types for a deployment run.
//!
//! These types map to the optional YAML configuration file and are filled
//! in from command-line flags and environment variables.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::manifest::{ResourceKind, effective_namespace};
use crate::planner::{KindTable, UpdateStrategy};

/// The root configuration of a deployment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Cluster connection settings.
    pub cluster: ClusterConfig,
    /// Default namespace for manifests that do not set one.
    pub namespace: String,
    /// Manifest template per resource group.
    pub manifests: ManifestSources,
    /// Update strategy overrides per kind.
    pub strategies: BTreeMap<ResourceKind, UpdateStrategy>,
    /// Keep reconciling after a per-resource failure.
    pub continue_on_error: bool,
}

/// Cluster connection settings.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClusterConfig {
    /// API server URL.
    pub server: String,
    /// Bearer token.
    pub token: String,
    /// Base64-encoded PEM certificate authority.
    pub ca: String,
}

/// Manifest template paths, one per resource group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManifestSources {
    /// Deployment manifest (required).
    pub workload: Option<PathBuf>,
    /// Service manifest.
    pub service: Option<PathBuf>,
    /// Ingress manifest.
    pub ingress: Option<PathBuf>,
}

impl DeployConfig {
    /// Returns the namespace, or `"default"` when blank.
    #[must_use]
    pub fn namespace(&self) -> &str {
        effective_namespace(&self.namespace)
    }

    /// Builds the kind table with this configuration's overrides applied.
    #[must_use]
    pub fn kind_table(&self) -> KindTable {
        self.strategies
            .iter()
            .fold(KindTable::new(), |table, (kind, strategy)| {
                table.with_strategy(*kind, *strategy)
            })
    }
}

impl ClusterConfig {
    /// Decodes the CA bundle.
    ///
    /// Returns `None` when no CA is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA data is not valid base64.
    pub fn ca_pem(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let encoded: String = self.ca.chars().filter(|c| !c.is_whitespace()).collect();
        if encoded.is_empty() {
            return Ok(None);
        }

        STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| ConfigError::invalid("KUBE_CA", format!("not valid base64: {e}")))
    }
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ClusterConfig")
            .field("server", &self.server)
            .field("token", &token)
            .field("ca", &format_args!("<{} bytes>", self.ca.len()))
            .finish()
    }
}

impl ManifestSources {
    /// Returns the manifest path of `kind`, treating blank paths as unset.
    #[must_use]
    pub fn source(&self, kind: ResourceKind) -> Option<&Path> {
        let path = match kind {
            ResourceKind::Workload => self.workload.as_deref(),
            ResourceKind::NetworkService => self.service.as_deref(),
            ResourceKind::Ingress => self.ingress.as_deref(),
        };
        path.filter(|p| !p.to_string_lossy().trim().is_empty())
    }

    pub(crate) fn source_mut(&mut self, kind: ResourceKind) -> &mut Option<PathBuf> {
        match kind {
            ResourceKind::Workload => &mut self.workload,
            ResourceKind::NetworkService => &mut self.service,
            ResourceKind::Ingress => &mut self.ingress,
        }
    }
}
