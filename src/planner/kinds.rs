//! Per-kind update strategies.
//!
//! The [`KindTable`] maps each resource kind to the operations used when the
//! object already exists, plus the list fields that merge element-wise
//! during a merge patch.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::manifest::ResourceKind;

/// How an existing object is brought to the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// Full replace with the desired object.
    Replace,
    /// JSON merge patch computed against the existing object.
    MergePatch,
    /// Existing objects are left untouched.
    CreateOnly,
}

impl std::fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Replace => "replace",
            Self::MergePatch => "merge-patch",
            Self::CreateOnly => "create-only",
        };
        write!(f, "{s}")
    }
}

impl FromStr for UpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" | "update" => Ok(Self::Replace),
            "patch" | "merge-patch" | "merge" => Ok(Self::MergePatch),
            "create-only" | "create" | "none" => Ok(Self::CreateOnly),
            other => Err(format!(
                "unknown update strategy '{other}' (expected replace, patch, or create-only)"
            )),
        }
    }
}

/// A list field whose elements are matched by `key` instead of replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeKey {
    /// Dotted field path, list positions omitted (`spec.ports`).
    pub path: String,
    /// Element field identifying list items (`port`).
    pub key: String,
}

impl MergeKey {
    /// Creates a merge key.
    #[must_use]
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

/// Update behaviour of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindProfile {
    /// Strategy for objects that already exist.
    pub strategy: UpdateStrategy,
    /// List fields merged element-wise.
    pub merge_keys: Vec<MergeKey>,
}

impl KindProfile {
    /// Built-in profile for `kind`.
    #[must_use]
    pub fn builtin(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Workload => Self {
                strategy: UpdateStrategy::Replace,
                merge_keys: workload_merge_keys(),
            },
            // Full replace of a Service trips over server-assigned fields
            // such as spec.clusterIP.
            ResourceKind::NetworkService => Self {
                strategy: UpdateStrategy::MergePatch,
                merge_keys: vec![MergeKey::new("spec.ports", "port")],
            },
            ResourceKind::Ingress => Self {
                strategy: UpdateStrategy::Replace,
                merge_keys: vec![],
            },
        }
    }
}

fn workload_merge_keys() -> Vec<MergeKey> {
    const POD_SPEC: &str = "spec.template.spec";

    let mut keys = Vec::new();
    for containers in ["containers", "initContainers"] {
        let base = format!("{POD_SPEC}.{containers}");
        keys.push(MergeKey::new(&base, "name"));
        keys.push(MergeKey::new(format!("{base}.env"), "name"));
        keys.push(MergeKey::new(format!("{base}.ports"), "containerPort"));
        keys.push(MergeKey::new(format!("{base}.volumeMounts"), "mountPath"));
    }
    keys.push(MergeKey::new(format!("{POD_SPEC}.volumes"), "name"));
    keys.push(MergeKey::new(format!("{POD_SPEC}.imagePullSecrets"), "name"));
    keys
}

/// A `KIND=STRATEGY` override from the command line or config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyOverride {
    /// Kind being overridden.
    pub kind: ResourceKind,
    /// Strategy to use for it.
    pub strategy: UpdateStrategy,
}

impl FromStr for StrategyOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, strategy) = s
            .split_once('=')
            .ok_or_else(|| format!("expected KIND=STRATEGY, got '{s}'"))?;

        Ok(Self {
            kind: kind.parse()?,
            strategy: strategy.parse()?,
        })
    }
}

/// Kind-to-operations table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindTable {
    /// One profile per kind, indexed by [`ResourceKind::index`].
    profiles: [KindProfile; 3],
}

impl Default for KindTable {
    fn default() -> Self {
        Self {
            profiles: ResourceKind::ALL.map(KindProfile::builtin),
        }
    }
}

impl KindTable {
    /// Creates the built-in table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the update strategy of one kind.
    #[must_use]
    pub fn with_strategy(mut self, kind: ResourceKind, strategy: UpdateStrategy) -> Self {
        self.profiles[kind.index()].strategy = strategy;
        self
    }

    /// Returns the profile of `kind`.
    #[must_use]
    pub const fn profile(&self, kind: ResourceKind) -> &KindProfile {
        &self.profiles[kind.index()]
    }

    /// Returns the update strategy of `kind`.
    #[must_use]
    pub const fn strategy(&self, kind: ResourceKind) -> UpdateStrategy {
        self.profiles[kind.index()].strategy
    }
}
