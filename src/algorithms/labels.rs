//! Community detection by label propagation

use std::collections::BTreeMap;

use anyhow::Result;

use crate::engine::{Engine, Outbox, VertexProgram};
use crate::graph::{GraphPartition, VertexId};
use crate::transport::GroupTransport;

/// Synchronous majority vote over incoming labels. The accumulator is an
/// ordered histogram, so walking it with a strict `>` picks the lowest
/// label id among the tied maxima. Vertices with no inbound messages keep
/// their label.
struct MajorityVote<'g> {
    graph: &'g GraphPartition,
    labels: Vec<VertexId>,
    next: Vec<VertexId>,
}

impl VertexProgram for MajorityVote<'_> {
    type Msg = VertexId;
    type Acc = BTreeMap<VertexId, u32>;

    fn identity(&self) -> Self::Acc {
        BTreeMap::new()
    }

    fn scatter(&self, local_id: usize, out: &mut Outbox<VertexId>) {
        let label = self.labels[local_id];
        for &dst in self.graph.neighbors(local_id) {
            out.send(dst, label);
        }
    }

    fn reduce(&self, acc: &mut Self::Acc, msg: VertexId) {
        *acc.entry(msg).or_insert(0) += 1;
    }

    fn apply(&mut self, dst: VertexId, acc: Self::Acc) {
        if let Some(idx) = self.graph.local_index(dst) {
            let mut best = self.labels[idx];
            let mut votes = 0;
            for (label, count) in acc {
                if count > votes {
                    votes = count;
                    best = label;
                }
            }
            self.next[idx] = best;
        }
    }
}

/// Community labels after a fixed number of propagation rounds.
pub fn label_propagation<T: GroupTransport>(
    graph: &GraphPartition,
    comm: &T,
    iterations: usize,
) -> Result<Vec<VertexId>> {
    let mut engine = Engine::new(graph, comm)?;
    let start = graph.local_start();
    let own_ids: Vec<VertexId> = (0..graph.local_count()).map(|i| start + i as u64).collect();
    let mut program = MajorityVote {
        graph,
        labels: own_ids.clone(),
        next: own_ids,
    };

    for iteration in 0..iterations {
        program.next = program.labels.clone();
        engine.run(1, &mut program)?;
        program.labels = std::mem::take(&mut program.next);

        if comm.rank() == 0 {
            log::debug!("label propagation iteration {} complete", iteration + 1);
        }
    }
    Ok(program.labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PartitionBuilder, Partitioner};
    use crate::transport::LocalGroup;

    #[test]
    fn clique_collapses_to_lowest_label_and_isolate_keeps_its_own() {
        let group = LocalGroup::solo();
        let mut builder = PartitionBuilder::new(Partitioner::new(5, 1), 0);
        for u in 0..4u64 {
            for v in 0..4u64 {
                if u != v {
                    builder.add_edge(u, v, 1.0);
                }
            }
        }
        let graph = builder.build();
        let labels = label_propagation(&graph, &group, 5).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, 4]);
    }

    #[test]
    fn tie_break_prefers_the_lowest_label() {
        // 4 receives one vote each from 0..=3; lowest label must win
        let group = LocalGroup::solo();
        let mut builder = PartitionBuilder::new(Partitioner::new(5, 1), 0);
        for u in 0..4u64 {
            builder.add_edge(u, 4, 1.0);
        }
        let graph = builder.build();
        let labels = label_propagation(&graph, &group, 1).unwrap();
        assert_eq!(labels[4], 0);
    }
}
