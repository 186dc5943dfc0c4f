//! Cluster access.
//!
//! This module provides the [`ClusterApi`] seam the reconciler calls and
//! its Kubernetes REST implementation.

mod api;
mod client;

#[cfg(test)]
pub(crate) mod fake;

pub use api::ClusterApi;
pub use client::KubeClient;

#[cfg(test)]
pub(crate) use api::MockClusterApi;
