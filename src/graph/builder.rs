//! Partition construction module

use crate::graph::partition::{GraphPartition, Partitioner};
use crate::graph::{EdgeWeight, VertexId};

/// Builder for incrementally ingesting edges into one rank's partition.
///
/// Edges whose source falls outside the rank's owned range are dropped, so
/// every rank can be fed the full edge stream and keep only its own rows.
pub struct PartitionBuilder {
    part: Partitioner,
    rank: usize,

    /// Owned range `[start, end)` in global ids
    start: VertexId,
    end: VertexId,

    /// Adjacency lists for each owned vertex, unsorted until build
    adjacency: Vec<Vec<(VertexId, EdgeWeight)>>,
}

impl PartitionBuilder {
    pub fn new(part: Partitioner, rank: usize) -> Self {
        let start = part.start(rank);
        let end = part.end(rank);
        Self {
            part,
            rank,
            start,
            end,
            adjacency: vec![Vec::new(); (end - start) as usize],
        }
    }

    /// Append a directed edge. Ignored unless this rank owns `src`.
    pub fn add_edge(&mut self, src: VertexId, dst: VertexId, weight: EdgeWeight) {
        if src >= self.start && src < self.end {
            self.adjacency[(src - self.start) as usize].push((dst, weight));
        }
    }

    /// Sort each adjacency list and flatten into CSR.
    pub fn build(mut self) -> GraphPartition {
        let edge_count: usize = self.adjacency.iter().map(|list| list.len()).sum();

        let mut row_ptr = Vec::with_capacity(self.adjacency.len() + 1);
        let mut col_ind = Vec::with_capacity(edge_count);
        let mut weights = Vec::with_capacity(edge_count);

        row_ptr.push(0);
        for list in &mut self.adjacency {
            list.sort_unstable_by_key(|&(dst, _)| dst);
            for &(dst, weight) in list.iter() {
                col_ind.push(dst);
                weights.push(weight);
            }
            row_ptr.push(col_ind.len());
        }

        GraphPartition::new(self.part, self.rank, row_ptr, col_ind, weights)
    }
}
