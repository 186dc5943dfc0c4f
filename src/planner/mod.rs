//! Update planning for existing objects.
//!
//! This module decides how an object that already exists in the cluster is
//! brought to its desired state, and computes merge patches when that
//! decision is to patch.

mod kinds;
mod patch;

pub use kinds::{KindProfile, KindTable, MergeKey, StrategyOverride, UpdateStrategy};
pub use patch::PatchComputer;
