//! # Fusion Module
//!
//! Merges the per-source field sets into one snapshot per poll cycle.
//!
//! - `snapshot`: the flat field set and its persisted column order
//! - `source`: the `FieldSource` seam every sensor implements
//! - `manager`: the poll cycle and merge policy

pub mod manager;
pub mod snapshot;
pub mod source;

pub use manager::FusionManager;
pub use snapshot::{Snapshot, COLUMNS};
pub use source::{FieldSource, Unavailable};

#[cfg(test)]
pub use source::MockFieldSource;
