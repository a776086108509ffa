//! Fixed run parameters for the built-in algorithms

use crate::graph::VertexId;

/// Default arguments and caps; the command line overrides only the ones
/// each algorithm exposes.
pub struct Defaults {
    /// BFS source vertex
    pub bfs_source: VertexId,

    /// Sweep cap for the convergence-driven algorithms (BFS, CC)
    pub max_sweeps: usize,

    /// PageRank damping factor
    pub pr_damping: f64,

    /// PageRank iteration count
    pub pr_iterations: usize,

    /// Label propagation iteration count
    pub lpa_iterations: usize,

    /// Steps taken by each random walk
    pub walk_length: usize,

    /// Walks spawned per owned vertex
    pub walks_per_vertex: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            bfs_source: 0,
            max_sweeps: 100,
            pr_damping: 0.85,
            pr_iterations: 10,
            lpa_iterations: 5,
            walk_length: 10,
            walks_per_vertex: 5,
        }
    }
}
