//! Bulk-synchronous super-step engine.
//!
//! Runs vertex programs in rounds of scatter, all-to-all exchange, and
//! group-reduce-apply. The scatter phase is data-parallel across the owned
//! vertex block; exchange is collective over the group; reduce and apply run
//! serially on the receiving rank.

use anyhow::{bail, Result};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::graph::{GraphPartition, Partitioner, VertexId};
use crate::transport::{displs_from_counts, GroupTransport};

/// A routed update: delivered to the rank that owns `dst`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message<M> {
    pub dst: VertexId,
    pub payload: M,
}

/// Per-destination-rank send lanes filled during scatter.
///
/// Each worker thread owns its own outbox; lanes are merged after the
/// fork-join and flattened into the exchange buffers.
pub struct Outbox<M> {
    part: Partitioner,
    lanes: Vec<Vec<Message<M>>>,
}

impl<M> Outbox<M> {
    fn new(part: Partitioner) -> Self {
        Self {
            part,
            lanes: (0..part.ranks()).map(|_| Vec::new()).collect(),
        }
    }

    /// Route a payload to the owner of `dst`. Destinations outside the
    /// vertex space are dropped.
    pub fn send(&mut self, dst: VertexId, payload: M) {
        if dst < self.part.total() {
            let owner = self.part.owner(dst);
            self.lanes[owner].push(Message { dst, payload });
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (lane, mut extra) in self.lanes.iter_mut().zip(other.lanes) {
            lane.append(&mut extra);
        }
        self
    }
}

/// A vertex-centric program: per-vertex state plus the three pure phases the
/// engine drives each super-step.
///
/// `scatter` may read program state but not mutate it (it runs in parallel);
/// `apply` is the only mutating phase and is invoked serially, once per
/// destination that received messages. `identity` must be the unit of
/// `reduce`; for min-folds that is the type's maximum, not zero.
pub trait VertexProgram {
    type Msg: Serialize + DeserializeOwned + Send;
    type Acc;

    /// The designated identity a fresh accumulator starts from.
    fn identity(&self) -> Self::Acc;

    /// Emit messages for one owned vertex, by local index.
    fn scatter(&self, local_id: usize, out: &mut Outbox<Self::Msg>);

    /// Fold one received payload into the destination's accumulator.
    fn reduce(&self, acc: &mut Self::Acc, msg: Self::Msg);

    /// Write the folded accumulator back into program state.
    fn apply(&mut self, dst: VertexId, acc: Self::Acc);
}

/// Super-step runtime bound to one rank's partition and a private
/// communication context.
pub struct Engine<'g, T: GroupTransport> {
    graph: &'g GraphPartition,
    comm: T,
}

impl<'g, T: GroupTransport> Engine<'g, T> {
    /// Bind to a partition, duplicating the caller's context so the
    /// engine's collectives cannot cross-talk with unrelated traffic.
    pub fn new(graph: &'g GraphPartition, comm: &T) -> Result<Self> {
        if graph.partitioner().ranks() != comm.size() {
            bail!(
                "partition spans {} ranks but the group has {}",
                graph.partitioner().ranks(),
                comm.size()
            );
        }
        Ok(Self {
            graph,
            comm: comm.duplicate()?,
        })
    }

    /// The engine's communication context. Programs issue their own
    /// between-round reductions (convergence counters, dangling sums)
    /// through this handle.
    pub fn comm(&self) -> &T {
        &self.comm
    }

    /// Execute exactly `rounds` super-steps of `program`.
    pub fn run<P>(&mut self, rounds: usize, program: &mut P) -> Result<()>
    where
        P: VertexProgram + Sync,
    {
        for _ in 0..rounds {
            self.step(program)?;
        }
        Ok(())
    }

    fn step<P>(&mut self, program: &mut P) -> Result<()>
    where
        P: VertexProgram + Sync,
    {
        let lanes = self.scatter_phase(&*program);
        let mut received = self.exchange_phase(lanes)?;

        // Group contiguous runs of equal dst; ascending order makes the
        // apply sequence stable across rounds.
        received.sort_unstable_by_key(|m| m.dst);
        let mut messages = received.into_iter().peekable();
        while let Some(first) = messages.next() {
            let dst = first.dst;
            let mut acc = program.identity();
            program.reduce(&mut acc, first.payload);
            while let Some(next) = messages.next_if(|m| m.dst == dst) {
                program.reduce(&mut acc, next.payload);
            }
            program.apply(dst, acc);
        }
        Ok(())
    }

    /// Fork-join over the owned vertex block; each worker fills a private
    /// outbox and the outboxes are merged after the join.
    fn scatter_phase<P>(&self, program: &P) -> Vec<Vec<Message<P::Msg>>>
    where
        P: VertexProgram + Sync,
    {
        let part = self.graph.partitioner();
        let fresh = move || Outbox::new(part);
        (0..self.graph.local_count())
            .into_par_iter()
            .fold(fresh, |mut out, local_id| {
                program.scatter(local_id, &mut out);
                out
            })
            .reduce(fresh, Outbox::merge)
            .lanes
    }

    /// Count exchange followed by the payload exchange; lanes cross the
    /// wire as individually encoded blocks.
    fn exchange_phase<M>(&self, lanes: Vec<Vec<Message<M>>>) -> Result<Vec<Message<M>>>
    where
        M: Serialize + DeserializeOwned,
    {
        let ranks = self.comm.size();
        let mut send = Vec::new();
        let mut send_counts = vec![0usize; ranks];
        let mut send_displs = vec![0usize; ranks];
        for (rank, lane) in lanes.iter().enumerate() {
            send_displs[rank] = send.len();
            let block = bincode::serde::encode_to_vec(lane, bincode::config::standard())?;
            send_counts[rank] = block.len();
            send.extend_from_slice(&block);
        }

        let sent: Vec<u64> = send_counts.iter().map(|&c| c as u64).collect();
        let recv_counts: Vec<usize> = self
            .comm
            .alltoall(&sent)?
            .into_iter()
            .map(|c| c as usize)
            .collect();
        let recv_displs = displs_from_counts(&recv_counts);

        let recv = self
            .comm
            .alltoallv(&send, &send_counts, &send_displs, &recv_counts, &recv_displs)?;

        let mut received = Vec::new();
        for rank in 0..ranks {
            let segment = &recv[recv_displs[rank]..recv_displs[rank] + recv_counts[rank]];
            let (block, used): (Vec<Message<M>>, usize) =
                bincode::serde::decode_from_slice(segment, bincode::config::standard())?;
            if used != segment.len() {
                bail!(
                    "exchange: trailing bytes in the block from rank {} ({} of {} consumed)",
                    rank,
                    used,
                    segment.len()
                );
            }
            received.extend(block);
        }
        Ok(received)
    }
}
