//! Result output module

use std::fs::File;
use std::io::{self, Write};

use anyhow::Result;

use crate::algorithms::walk::Walk;
use crate::graph::GraphPartition;
use crate::transport::GroupTransport;

/// Print one `V[<globalId>]: <metric>=<value>` line per local vertex,
/// rank-serialized so lines come out in global vertex order.
pub fn print_per_vertex<T: GroupTransport>(
    comm: &T,
    graph: &GraphPartition,
    metric: &str,
    values: &[String],
) -> Result<()> {
    for turn in 0..comm.size() {
        if turn == comm.rank() {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let start = graph.local_start();
            for (i, value) in values.iter().enumerate() {
                writeln!(out, "V[{}]: {}={}", start + i as u64, metric, value)?;
            }
            out.flush()?;
        }
        comm.barrier()?;
    }
    Ok(())
}

/// Write this rank's finished walks to `walks_out_<rank>.txt`, one
/// space-separated path per line.
pub fn write_walks(rank: usize, walks: &[Walk]) -> Result<()> {
    let mut file = File::create(format!("walks_out_{}.txt", rank))?;
    for walk in walks {
        let path: Vec<String> = walk.path.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", path.join(" "))?;
    }
    Ok(())
}
