//! Connected components by min-label propagation

use anyhow::Result;

use crate::engine::{Engine, Outbox, VertexProgram};
use crate::graph::{GraphPartition, VertexId};
use crate::transport::GroupTransport;

/// Every vertex broadcasts its current component label each round; labels
/// only ever decrease, so the component converges on its minimum global id.
struct MinLabel<'g> {
    graph: &'g GraphPartition,
    cc: Vec<VertexId>,
    changed: i64,
}

impl VertexProgram for MinLabel<'_> {
    type Msg = VertexId;
    type Acc = VertexId;

    fn identity(&self) -> VertexId {
        VertexId::MAX
    }

    fn scatter(&self, local_id: usize, out: &mut Outbox<VertexId>) {
        let label = self.cc[local_id];
        for &dst in self.graph.neighbors(local_id) {
            out.send(dst, label);
        }
    }

    fn reduce(&self, acc: &mut VertexId, msg: VertexId) {
        *acc = (*acc).min(msg);
    }

    fn apply(&mut self, dst: VertexId, acc: VertexId) {
        if let Some(idx) = self.graph.local_index(dst) {
            if acc < self.cc[idx] {
                self.cc[idx] = acc;
                self.changed += 1;
            }
        }
    }
}

/// Component label (minimum reachable global id) for every local vertex.
pub fn connected_components<T: GroupTransport>(
    graph: &GraphPartition,
    comm: &T,
    max_sweeps: usize,
) -> Result<Vec<VertexId>> {
    let mut engine = Engine::new(graph, comm)?;
    let start = graph.local_start();
    let mut program = MinLabel {
        graph,
        cc: (0..graph.local_count()).map(|i| start + i as u64).collect(),
        changed: 0,
    };

    for _ in 0..max_sweeps {
        program.changed = 0;
        engine.run(1, &mut program)?;
        let changed = engine.comm().allreduce_sum_i64(program.changed)?;
        if changed == 0 {
            break;
        }
    }
    Ok(program.cc)
}
