//! Resource model shared by every manifest kind.
//!
//! A [`ResourceDescriptor`] is the kind-agnostic unit the reconciler works
//! on: identity (kind, name, namespace), the decoded desired state, and the
//! document text it was decoded from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Namespace used when neither the manifest nor the configuration sets one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kinds of cluster objects the tool deploys.
///
/// Each kind is also a resource group of a run; [`ResourceKind::ALL`] is the
/// order groups are applied in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// `apps/v1` Deployment.
    Workload,
    /// `v1` Service.
    NetworkService,
    /// `networking.k8s.io/v1` Ingress.
    Ingress,
}

impl ResourceKind {
    /// All kinds, in run order.
    pub const ALL: [Self; 3] = [Self::Workload, Self::NetworkService, Self::Ingress];

    /// The `kind` field value of manifests of this kind.
    #[must_use]
    pub const fn manifest_kind(self) -> &'static str {
        match self {
            Self::Workload => "Deployment",
            Self::NetworkService => "Service",
            Self::Ingress => "Ingress",
        }
    }

    /// API path prefix for the kind's group/version.
    #[must_use]
    pub const fn api_prefix(self) -> &'static str {
        match self {
            Self::Workload => "/apis/apps/v1",
            Self::NetworkService => "/api/v1",
            Self::Ingress => "/apis/networking.k8s.io/v1",
        }
    }

    /// Plural resource name used in API paths.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Workload => "deployments",
            Self::NetworkService => "services",
            Self::Ingress => "ingresses",
        }
    }

    /// Name of the resource group in logs and output.
    #[must_use]
    pub const fn group_name(self) -> &'static str {
        match self {
            Self::Workload => "workload",
            Self::NetworkService => "network-service",
            Self::Ingress => "ingress",
        }
    }

    /// Position of the kind in [`ResourceKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Workload => 0,
            Self::NetworkService => 1,
            Self::Ingress => 2,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Workload => "deployment",
            Self::NetworkService => "service",
            Self::Ingress => "ingress",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workload" | "deployment" => Ok(Self::Workload),
            "network-service" | "service" => Ok(Self::NetworkService),
            "ingress" => Ok(Self::Ingress),
            other => Err(format!(
                "unknown resource kind '{other}' (expected workload, service, or ingress)"
            )),
        }
    }
}

/// One decoded manifest unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Kind of the object.
    pub kind: ResourceKind,
    /// `metadata.name`, never empty.
    pub name: String,
    /// Namespace the object is reconciled in.
    pub namespace: String,
    /// Decoded manifest body.
    pub desired_state: Value,
    /// Rendered text of this document alone.
    pub raw_text: String,
    /// 1-based position of the document in its stream.
    pub document: usize,
}

impl ResourceDescriptor {
    /// Namespace to use for API calls; blank falls back to `"default"`.
    #[must_use]
    pub fn effective_namespace(&self) -> &str {
        effective_namespace(&self.namespace)
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.effective_namespace(), self.name)
    }
}

/// Returns `namespace`, or `"default"` when it is blank.
#[must_use]
pub fn effective_namespace(namespace: &str) -> &str {
    let trimmed = namespace.trim();
    if trimmed.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        trimmed
    }
}
