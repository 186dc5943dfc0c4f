//! Manifest handling.
//!
//! This module covers everything between a template file on disk and the
//! typed descriptors the reconciler consumes:
//! - Rendering template placeholders from CI metadata
//! - Splitting and decoding multi-document manifests
//! - The kind-agnostic resource model

mod decoder;
mod render;
mod resource;

pub use decoder::{ManifestDecoder, decode};
pub use render::{Build, Job, ManifestRenderer, RenderContext, Repo};
pub use resource::{DEFAULT_NAMESPACE, ResourceDescriptor, ResourceKind, effective_namespace};
