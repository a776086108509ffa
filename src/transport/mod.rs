//! Collective communication abstraction for the super-step engine.
//!
//! Provides a trait over a rank/size group with barriers, scalar
//! all-reductions, and all-to-all exchange of opaque byte payloads, plus an
//! in-process implementation that runs one rank per thread.

pub mod local;

pub use local::LocalGroup;

use anyhow::Result;

/// Abstraction over a fixed group of communicating ranks.
///
/// Every operation except `rank`/`size` is a collective: all ranks must call
/// it, in the same order, with consistent arguments. A collective acts as a
/// group-wide barrier; if any rank fails, the whole collective fails.
pub trait GroupTransport: Send + Sized {
    /// This process's rank within the group.
    fn rank(&self) -> usize;

    /// Total number of ranks in the group.
    fn size(&self) -> usize;

    /// Create a handle onto a private communication context shared with the
    /// handles the other ranks obtain from the same call.
    fn duplicate(&self) -> Result<Self>;

    /// Block until every rank has arrived.
    fn barrier(&self) -> Result<()>;

    /// Sum a local integer across all ranks.
    fn allreduce_sum_i64(&self, value: i64) -> Result<i64>;

    /// Sum a local float across all ranks.
    fn allreduce_sum_f64(&self, value: f64) -> Result<f64>;

    /// Max of a local integer across all ranks.
    fn allreduce_max_i64(&self, value: i64) -> Result<i64>;

    /// Distribute `value` from `root` to every rank.
    fn broadcast_u64(&self, value: u64, root: usize) -> Result<u64>;

    /// Exchange one count per destination rank; returns one count per
    /// source rank.
    fn alltoall(&self, sends: &[u64]) -> Result<Vec<u64>>;

    /// Exchange variable-length byte segments. `send[send_displs[r]..][..send_counts[r]]`
    /// goes to rank `r`; the returned buffer holds the segment from rank `s`
    /// at `recv_displs[s]..recv_displs[s] + recv_counts[s]`.
    fn alltoallv(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<Vec<u8>>;
}

/// Exclusive prefix sum of a count vector, as used for exchange displacements.
pub fn displs_from_counts(counts: &[usize]) -> Vec<usize> {
    let mut displs = Vec::with_capacity(counts.len());
    let mut total = 0;
    for &c in counts {
        displs.push(total);
        total += c;
    }
    displs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacements_are_exclusive_prefix_sums() {
        assert_eq!(displs_from_counts(&[]), Vec::<usize>::new());
        assert_eq!(displs_from_counts(&[3, 0, 2, 5]), vec![0, 3, 3, 5]);
    }
}
