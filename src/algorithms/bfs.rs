//! Level-synchronous breadth-first search

use anyhow::Result;

use crate::engine::{Engine, Outbox, VertexProgram};
use crate::graph::{GraphPartition, VertexId};
use crate::transport::GroupTransport;

/// Distance of a vertex the search never reached.
pub const UNREACHED: u64 = u64::MAX;

/// Frontier expansion state: only vertices whose distance equals the
/// current round scatter, so each round settles exactly one BFS level.
struct Frontier<'g> {
    graph: &'g GraphPartition,
    dist: Vec<u64>,
    round: u64,
    changed: i64,
}

impl VertexProgram for Frontier<'_> {
    type Msg = u64;
    type Acc = u64;

    fn identity(&self) -> u64 {
        UNREACHED
    }

    fn scatter(&self, local_id: usize, out: &mut Outbox<u64>) {
        if self.dist[local_id] == self.round {
            let next = self.dist[local_id] + 1;
            for &dst in self.graph.neighbors(local_id) {
                out.send(dst, next);
            }
        }
    }

    fn reduce(&self, acc: &mut u64, msg: u64) {
        *acc = (*acc).min(msg);
    }

    fn apply(&mut self, dst: VertexId, acc: u64) {
        if let Some(idx) = self.graph.local_index(dst) {
            if acc < self.dist[idx] {
                self.dist[idx] = acc;
                self.changed += 1;
            }
        }
    }
}

/// Hop distances from `source` to every locally owned vertex.
///
/// Runs one super-step per level until no rank improves a distance, capped
/// at `max_sweeps`. Unreached vertices stay at [`UNREACHED`].
pub fn shortest_hops<T: GroupTransport>(
    graph: &GraphPartition,
    comm: &T,
    source: VertexId,
    max_sweeps: usize,
) -> Result<Vec<u64>> {
    let mut engine = Engine::new(graph, comm)?;
    let mut program = Frontier {
        graph,
        dist: vec![UNREACHED; graph.local_count()],
        round: 0,
        changed: 0,
    };
    if let Some(idx) = graph.local_index(source) {
        program.dist[idx] = 0;
    }

    for round in 0..max_sweeps {
        program.round = round as u64;
        program.changed = 0;
        engine.run(1, &mut program)?;
        let changed = engine.comm().allreduce_sum_i64(program.changed)?;
        if changed == 0 {
            break;
        }
    }
    Ok(program.dist)
}
