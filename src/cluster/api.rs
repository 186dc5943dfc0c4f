//! Cluster API trait definition.
//!
//! The reconciler only talks to the cluster through [`ClusterApi`], so tests
//! can substitute a mock or an in-memory cluster for the HTTP client.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClusterError;
use crate::manifest::ResourceKind;

/// Single-object CRUD operations against a cluster.
///
/// Objects travel as JSON values; the trait does not interpret them beyond
/// what each call needs to address the object.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetches one object.
    ///
    /// Returns [`ClusterError::NotFound`] when the object does not exist.
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Value, ClusterError>;

    /// Creates an object in `namespace`.
    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        object: &Value,
    ) -> Result<Value, ClusterError>;

    /// Replaces an existing object. The name is taken from `metadata.name`.
    async fn update(
        &self,
        kind: ResourceKind,
        namespace: &str,
        object: &Value,
    ) -> Result<Value, ClusterError>;

    /// Applies a JSON merge patch to an existing object.
    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &[u8],
    ) -> Result<Value, ClusterError>;
}
