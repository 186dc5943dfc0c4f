//! Error types for the deployment tool.
//!
//! `DeployError` covers failures that end a command. Decode, patch, and
//! reconciliation errors stay attached to the group or resource they belong
//! to and are reported through the run result.

use std::path::PathBuf;
use thiserror::Error;

use crate::manifest::ResourceKind;

/// The main error type for the deployment tool.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template rendering errors.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Kubernetes API errors.
    #[error("Cluster API error: {0}")]
    Cluster(#[from] ClusterError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required option was not provided.
    #[error("{name} is not defined")]
    MissingValue {
        /// Name of the missing option (environment variable spelling).
        name: String,
    },

    /// An option was provided but is unusable.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Name of the offending option.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },
}

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("Failed to read template {path}: {source}")]
    Read {
        /// Path of the template.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Manifest decoding errors.
///
/// `document` is the 1-based position of the document in the stream,
/// counting only non-empty documents.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The document is not well-formed YAML or JSON.
    #[error("document {document} is malformed: {message}")]
    Malformed {
        /// Document position.
        document: usize,
        /// Parser message.
        message: String,
    },

    /// The document does not fit the schema of the target kind.
    #[error("document {document} does not match the {kind} schema: {message}")]
    Schema {
        /// Document position.
        document: usize,
        /// Target kind.
        kind: ResourceKind,
        /// Projection failure detail.
        message: String,
    },

    /// The document has no `metadata.name`.
    #[error("document {document} has no metadata.name")]
    MissingName {
        /// Document position.
        document: usize,
    },

    /// The document declares a different `kind` than the group expects.
    #[error("document {document} has kind '{found}', expected '{expected}'")]
    KindMismatch {
        /// Document position.
        document: usize,
        /// Kind expected for the group.
        expected: String,
        /// Kind declared in the document.
        found: String,
    },
}

/// Kubernetes API errors.
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// The requested object does not exist.
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        /// Resource kind.
        kind: ResourceKind,
        /// Object name.
        name: String,
        /// Namespace searched.
        namespace: String,
    },

    /// The credentials were rejected.
    #[error("Kubernetes API rejected credentials ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Any other non-success API response.
    #[error("Kubernetes API request failed: {status} {reason} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// `Status.reason` if the server sent one.
        reason: String,
        /// Error message from the API.
        message: String,
    },

    /// Transport failure.
    #[error("Network error communicating with Kubernetes: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The response body could not be understood.
    #[error("Invalid response from Kubernetes API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The request could not be built from the given object.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What is wrong with the request.
        message: String,
    },
}

/// Which side of a patch computation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSide {
    /// The object currently stored in the cluster.
    Existing,
    /// The desired manifest.
    Desired,
}

impl std::fmt::Display for PatchSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Desired => write!(f, "desired"),
        }
    }
}

/// Merge-patch computation errors.
#[derive(Debug, Clone, Error)]
pub enum PatchError {
    /// One side could not be parsed.
    #[error("failed to parse {side} document: {message}")]
    Parse {
        /// Failing side.
        side: PatchSide,
        /// Parser message.
        message: String,
    },

    /// One side is not a mapping at the top level.
    #[error("{side} document is not an object")]
    NotAnObject {
        /// Failing side.
        side: PatchSide,
    },

    /// The two documents describe different kinds.
    #[error("cannot patch a '{existing}' with a '{desired}' manifest")]
    IncompatibleKinds {
        /// Kind of the stored object.
        existing: String,
        /// Kind of the desired manifest.
        desired: String,
    },

    /// The patch could not be serialized.
    #[error("failed to serialize patch: {message}")]
    Serialize {
        /// Serializer message.
        message: String,
    },
}

/// The phase of a run in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Reading and substituting the template.
    Render,
    /// Splitting and projecting manifest documents.
    Decode,
    /// Existence check against the cluster.
    Lookup,
    /// Merge-patch computation.
    Patch,
    /// Create, update, or patch call.
    Mutation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Render => "render",
            Self::Decode => "decode",
            Self::Lookup => "lookup",
            Self::Patch => "patch",
            Self::Mutation => "mutation",
        };
        write!(f, "{s}")
    }
}

/// Per-resource reconciliation errors.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The existence check failed with something other than not-found.
    #[error("lookup of {kind} '{namespace}/{name}' failed: {source}")]
    Lookup {
        /// Resource kind.
        kind: ResourceKind,
        /// Object name.
        name: String,
        /// Effective namespace.
        namespace: String,
        /// Underlying API error.
        source: ClusterError,
    },

    /// A create, update, or patch call failed.
    #[error("{operation} of {kind} '{namespace}/{name}' failed: {source}")]
    Mutation {
        /// Which call was issued (`create`, `update`, `patch`).
        operation: &'static str,
        /// Resource kind.
        kind: ResourceKind,
        /// Object name.
        name: String,
        /// Effective namespace.
        namespace: String,
        /// Underlying API error.
        source: ClusterError,
    },

    /// The merge patch could not be computed; no call was issued.
    #[error("patch computation for {kind} '{namespace}/{name}' failed: {source}")]
    Patch {
        /// Resource kind.
        kind: ResourceKind,
        /// Object name.
        name: String,
        /// Effective namespace.
        namespace: String,
        /// Underlying patch error.
        source: PatchError,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Returns the run stage this error belongs to, when it has one.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Render(_) => Some(Stage::Render),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a missing-value error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingValue { name: name.into() }
    }

    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ClusterError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Returns true if the object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl ReconcileError {
    /// Returns the stage the error was raised in.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Lookup { .. } => Stage::Lookup,
            Self::Mutation { .. } => Stage::Mutation,
            Self::Patch { .. } => Stage::Patch,
        }
    }

    /// Returns `kind/namespace/name` of the resource that failed.
    #[must_use]
    pub fn resource(&self) -> String {
        match self {
            Self::Lookup {
                kind,
                name,
                namespace,
                ..
            }
            | Self::Mutation {
                kind,
                name,
                namespace,
                ..
            }
            | Self::Patch {
                kind,
                name,
                namespace,
                ..
            } => format!("{kind}/{namespace}/{name}"),
        }
    }
}
