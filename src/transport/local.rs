//! In-process rank group: one thread per rank, collectives over shared slots

use std::sync::{Arc, Barrier, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use crate::transport::GroupTransport;

/// One rank's payload contribution to an in-flight variable exchange.
#[derive(Default)]
struct Frame {
    bytes: Vec<u8>,
    counts: Vec<usize>,
    displs: Vec<usize>,
}

/// Shared collective state. Every operation runs in two phases around the
/// group barrier: all ranks publish into their slot, then all ranks read.
/// The trailing barrier keeps a slot from being overwritten by the next
/// collective before every rank has read it.
struct GroupState {
    size: usize,
    barrier: Barrier,
    ints: Mutex<Vec<i64>>,
    floats: Mutex<Vec<f64>>,
    word: Mutex<u64>,
    tables: Mutex<Vec<Vec<u64>>>,
    frames: Mutex<Vec<Frame>>,
    child: Mutex<Option<Arc<GroupState>>>,
}

impl GroupState {
    fn new(size: usize) -> Self {
        Self {
            size,
            barrier: Barrier::new(size),
            ints: Mutex::new(vec![0; size]),
            floats: Mutex::new(vec![0.0; size]),
            word: Mutex::new(0),
            tables: Mutex::new((0..size).map(|_| Vec::new()).collect()),
            frames: Mutex::new((0..size).map(|_| Frame::default()).collect()),
            child: Mutex::new(None),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow!("collective failed: a group member panicked"))
}

/// One rank's handle onto an in-process group.
///
/// `new(size)` yields one handle per rank; run each on its own thread. All
/// trait operations follow the group-wide collective contract.
pub struct LocalGroup {
    rank: usize,
    shared: Arc<GroupState>,
}

impl LocalGroup {
    /// Create a group of `size` ranks and return their handles in rank order.
    pub fn new(size: usize) -> Vec<LocalGroup> {
        let shared = Arc::new(GroupState::new(size.max(1)));
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Convenience single-rank group.
    pub fn solo() -> LocalGroup {
        let mut handles = Self::new(1);
        handles.remove(0)
    }

    /// Publish into our slot, wait, read under the lock, wait again.
    fn exchange_slots<T, R>(
        &self,
        slots: &Mutex<Vec<T>>,
        mine: T,
        read: impl FnOnce(&[T]) -> Result<R>,
    ) -> Result<R> {
        {
            let mut guard = lock(slots)?;
            guard[self.rank] = mine;
        }
        self.shared.barrier.wait();
        let out = match lock(slots) {
            Ok(guard) => read(&guard),
            Err(e) => Err(e),
        };
        self.shared.barrier.wait();
        out
    }
}

impl GroupTransport for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn duplicate(&self) -> Result<Self> {
        let size = self.shared.size;
        self.shared.barrier.wait();
        let child = {
            let mut slot = lock(&self.shared.child)?;
            let state = slot.get_or_insert_with(|| Arc::new(GroupState::new(size)));
            Arc::clone(state)
        };
        self.shared.barrier.wait();
        // Rank 0 clears the staging slot; every rank has its clone by now,
        // and no rank can re-enter duplicate() until rank 0 reaches the
        // next group barrier.
        if self.rank == 0 {
            *lock(&self.shared.child)? = None;
        }
        Ok(LocalGroup {
            rank: self.rank,
            shared: child,
        })
    }

    fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn allreduce_sum_i64(&self, value: i64) -> Result<i64> {
        self.exchange_slots(&self.shared.ints, value, |slots| Ok(slots.iter().sum()))
    }

    fn allreduce_sum_f64(&self, value: f64) -> Result<f64> {
        self.exchange_slots(&self.shared.floats, value, |slots| Ok(slots.iter().sum()))
    }

    fn allreduce_max_i64(&self, value: i64) -> Result<i64> {
        self.exchange_slots(&self.shared.ints, value, |slots| {
            slots
                .iter()
                .copied()
                .max()
                .ok_or_else(|| anyhow!("empty group"))
        })
    }

    fn broadcast_u64(&self, value: u64, root: usize) -> Result<u64> {
        if root >= self.shared.size {
            bail!("broadcast root {} out of range", root);
        }
        if self.rank == root {
            *lock(&self.shared.word)? = value;
        }
        self.shared.barrier.wait();
        let out = lock(&self.shared.word).map(|w| *w);
        self.shared.barrier.wait();
        out
    }

    fn alltoall(&self, sends: &[u64]) -> Result<Vec<u64>> {
        let size = self.shared.size;
        if sends.len() != size {
            bail!("alltoall expects one entry per rank");
        }
        self.exchange_slots(&self.shared.tables, sends.to_vec(), |rows| {
            (0..size)
                .map(|src| {
                    rows[src]
                        .get(self.rank)
                        .copied()
                        .ok_or_else(|| anyhow!("alltoall: rank {} published a short row", src))
                })
                .collect()
        })
    }

    fn alltoallv(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<Vec<u8>> {
        let size = self.shared.size;
        if send_counts.len() != size
            || send_displs.len() != size
            || recv_counts.len() != size
            || recv_displs.len() != size
        {
            bail!("alltoallv expects one count and displacement per rank");
        }
        let frame = Frame {
            bytes: send.to_vec(),
            counts: send_counts.to_vec(),
            displs: send_displs.to_vec(),
        };
        self.exchange_slots(&self.shared.frames, frame, |frames| {
            let total: usize = recv_counts.iter().sum();
            let mut recv = vec![0u8; total];
            for (src, frame) in frames.iter().enumerate() {
                let count = frame.counts.get(self.rank).copied().unwrap_or(0);
                if count != recv_counts[src] {
                    bail!(
                        "alltoallv: rank {} expected {} bytes from rank {}, got {}",
                        self.rank,
                        recv_counts[src],
                        src,
                        count
                    );
                }
                let offset = frame.displs.get(self.rank).copied().unwrap_or(0);
                let seg = frame
                    .bytes
                    .get(offset..offset + count)
                    .ok_or_else(|| anyhow!("alltoallv: rank {} published a short buffer", src))?;
                let out = recv
                    .get_mut(recv_displs[src]..recv_displs[src] + count)
                    .ok_or_else(|| anyhow!("alltoallv: receive displacements overflow"))?;
                out.copy_from_slice(seg);
            }
            Ok(recv)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::displs_from_counts;
    use std::thread;

    fn run_group<R: Send>(size: usize, body: impl Fn(LocalGroup) -> R + Sync) -> Vec<R> {
        let handles = LocalGroup::new(size);
        thread::scope(|scope| {
            let body = &body;
            let joins: Vec<_> = handles
                .into_iter()
                .map(|group| scope.spawn(move || body(group)))
                .collect();
            joins
                .into_iter()
                .map(|j| j.join().expect("rank thread panicked"))
                .collect()
        })
    }

    #[test]
    fn solo_group_collectives_are_identity() {
        let group = LocalGroup::solo();
        assert_eq!(group.rank(), 0);
        assert_eq!(group.size(), 1);
        assert_eq!(group.allreduce_sum_i64(42).unwrap(), 42);
        assert_eq!(group.allreduce_max_i64(-7).unwrap(), -7);
        assert_eq!(group.broadcast_u64(9, 0).unwrap(), 9);
        assert_eq!(group.alltoall(&[5]).unwrap(), vec![5]);
    }

    #[test]
    fn sums_and_maxes_span_the_group() {
        let sums = run_group(4, |g| {
            let s = g.allreduce_sum_i64(g.rank() as i64 + 1).unwrap();
            let f = g.allreduce_sum_f64(0.5).unwrap();
            let m = g.allreduce_max_i64(g.rank() as i64 * 3).unwrap();
            (s, f, m)
        });
        for (s, f, m) in sums {
            assert_eq!(s, 10);
            assert!((f - 2.0).abs() < 1e-12);
            assert_eq!(m, 9);
        }
    }

    #[test]
    fn broadcast_takes_the_root_value() {
        let got = run_group(3, |g| {
            let mine = (g.rank() as u64 + 1) * 100;
            g.broadcast_u64(mine, 2).unwrap()
        });
        assert_eq!(got, vec![300, 300, 300]);
    }

    #[test]
    fn alltoall_transposes_count_rows() {
        let cols = run_group(3, |g| {
            let row: Vec<u64> = (0..3).map(|dst| (g.rank() * 10 + dst) as u64).collect();
            g.alltoall(&row).unwrap()
        });
        assert_eq!(cols[0], vec![0, 10, 20]);
        assert_eq!(cols[1], vec![1, 11, 21]);
        assert_eq!(cols[2], vec![2, 12, 22]);
    }

    #[test]
    fn alltoallv_routes_each_segment_to_its_rank() {
        let received = run_group(3, |g| {
            // rank r sends (dst + 1) copies of byte r to each dst
            let mut send = Vec::new();
            let mut counts = Vec::new();
            for dst in 0..3 {
                send.extend(std::iter::repeat(g.rank() as u8).take(dst + 1));
                counts.push(dst + 1);
            }
            let send_displs = displs_from_counts(&counts);
            let sent: Vec<u64> = counts.iter().map(|&c| c as u64).collect();
            let recv_counts: Vec<usize> =
                g.alltoall(&sent).unwrap().iter().map(|&c| c as usize).collect();
            let recv_displs = displs_from_counts(&recv_counts);
            g.alltoallv(&send, &counts, &send_displs, &recv_counts, &recv_displs)
                .unwrap()
        });
        // rank r receives (r + 1) copies of each source byte
        assert_eq!(received[0], vec![0, 1, 2]);
        assert_eq!(received[1], vec![0, 0, 1, 1, 2, 2]);
        assert_eq!(received[2], vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn duplicate_yields_a_private_context() {
        let results = run_group(2, |g| {
            let private = g.duplicate().unwrap();
            assert_eq!(private.rank(), g.rank());
            assert_eq!(private.size(), g.size());
            let a = private.allreduce_sum_i64(1).unwrap();
            // parent context still works independently
            let b = g.allreduce_sum_i64(10).unwrap();
            // a second duplication gets a fresh context again
            let another = g.duplicate().unwrap();
            let c = another.allreduce_sum_i64(100).unwrap();
            (a, b, c)
        });
        for (a, b, c) in results {
            assert_eq!((a, b, c), (2, 20, 200));
        }
    }
}
