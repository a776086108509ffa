//! Uniform random walks that migrate between ranks with their history

use std::sync::Mutex;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::engine::{Engine, Outbox, VertexProgram};
use crate::graph::{GraphPartition, VertexId};
use crate::transport::GroupTransport;

/// A walk in flight: its spawn vertex and every vertex visited so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Walk {
    pub id: u64,
    pub start: VertexId,
    pub path: Vec<VertexId>,
}

/// Walks parked at each owned vertex. Every step, each walk hops to a
/// uniformly random out-neighbor and is shipped to that vertex's owner;
/// walks at a dead end are re-routed to their current owner unchanged.
struct Wander<'g> {
    graph: &'g GraphPartition,
    active: Vec<Vec<Walk>>,
    next: Vec<Vec<Walk>>,
    rng: Mutex<StdRng>,
}

impl VertexProgram for Wander<'_> {
    type Msg = Walk;
    type Acc = Vec<Walk>;

    fn identity(&self) -> Vec<Walk> {
        Vec::new()
    }

    fn scatter(&self, local_id: usize, out: &mut Outbox<Walk>) {
        let parked = &self.active[local_id];
        if parked.is_empty() {
            return;
        }
        let here = self.graph.local_start() + local_id as u64;
        let degree = self.graph.out_degree(local_id);
        if degree == 0 {
            for walk in parked {
                out.send(here, walk.clone());
            }
            return;
        }
        let neighbors = self.graph.neighbors(local_id);
        let mut rng = self.rng.lock().unwrap();
        for walk in parked {
            let hop = neighbors[rng.gen_range(0..degree)];
            let mut moved = walk.clone();
            moved.path.push(hop);
            out.send(hop, moved);
        }
    }

    fn reduce(&self, acc: &mut Vec<Walk>, msg: Walk) {
        acc.push(msg);
    }

    fn apply(&mut self, dst: VertexId, acc: Vec<Walk>) {
        if let Some(idx) = self.graph.local_index(dst) {
            self.next[idx] = acc;
        }
    }
}

/// Run `walks_per_vertex` walks of `walk_length` steps from every owned
/// vertex; returns the walks parked on this rank when the steps run out.
pub fn random_walks<T: GroupTransport>(
    graph: &GraphPartition,
    comm: &T,
    walk_length: usize,
    walks_per_vertex: usize,
) -> Result<Vec<Walk>> {
    let mut engine = Engine::new(graph, comm)?;
    let local = graph.local_count();
    let start = graph.local_start();

    let active = (0..local)
        .map(|i| {
            let origin = start + i as u64;
            (0..walks_per_vertex)
                .map(|w| Walk {
                    id: (origin << 32) | w as u64,
                    start: origin,
                    path: vec![origin],
                })
                .collect()
        })
        .collect();

    let mut program = Wander {
        graph,
        active,
        next: Vec::new(),
        rng: Mutex::new(StdRng::seed_from_u64(1234 + comm.rank() as u64)),
    };

    for _ in 0..walk_length {
        program.next = vec![Vec::new(); local];
        engine.run(1, &mut program)?;
        program.active = std::mem::take(&mut program.next);
    }
    Ok(program.active.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PartitionBuilder, Partitioner};
    use crate::transport::LocalGroup;
    use std::collections::HashSet;

    #[test]
    fn cycle_walks_visit_one_edge_per_step() {
        let group = LocalGroup::solo();
        let mut builder = PartitionBuilder::new(Partitioner::new(4, 1), 0);
        for u in 0..4u64 {
            builder.add_edge(u, (u + 1) % 4, 1.0);
        }
        let graph = builder.build();
        let walks = random_walks(&graph, &group, 5, 2).unwrap();
        assert_eq!(walks.len(), 8);

        let mut ids = HashSet::new();
        for walk in &walks {
            assert!(ids.insert(walk.id), "walk ids must be unique");
            assert_eq!(walk.path.len(), 6);
            assert_eq!(walk.path[0], walk.start);
            for pair in walk.path.windows(2) {
                assert_eq!(pair[1], (pair[0] + 1) % 4);
            }
        }
    }

    #[test]
    fn dead_ends_absorb_walks_without_growing_paths() {
        let group = LocalGroup::solo();
        let mut builder = PartitionBuilder::new(Partitioner::new(2, 1), 0);
        builder.add_edge(0, 1, 1.0);
        let graph = builder.build();
        let walks = random_walks(&graph, &group, 4, 1).unwrap();
        assert_eq!(walks.len(), 2);
        for walk in &walks {
            match walk.start {
                0 => assert_eq!(walk.path, vec![0, 1]),
                1 => assert_eq!(walk.path, vec![1]),
                other => panic!("unexpected start {}", other),
            }
        }
    }
}
