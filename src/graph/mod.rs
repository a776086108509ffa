//! Partitioned graph representation module

pub mod builder;
pub mod loader;
pub mod partition;

pub use builder::PartitionBuilder;
pub use partition::{GraphPartition, Partitioner};

/// Globally unique vertex identifier, dense in `[0, N)`.
pub type VertexId = u64;

/// Edge weight; edges loaded without an explicit weight default to 1.0.
pub type EdgeWeight = f32;
