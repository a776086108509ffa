//! Text edge-list loading module

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::graph::{GraphPartition, PartitionBuilder, Partitioner};
use crate::transport::GroupTransport;

/// Load a partitioned graph from a text edge list.
///
/// Line 1 holds the global vertex count; every following line one
/// `src dst` pair. Reading stops at the first line that does not parse as
/// two integers. Every rank scans the whole file and keeps only the rows it
/// owns; the header value is broadcast from rank 0 so the group partitions
/// one agreed vertex space.
pub fn load_edge_list<T: GroupTransport>(path: &Path, comm: &T) -> Result<GraphPartition> {
    let file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => bail!("{}: empty graph file", path.display()),
    };
    let parsed: u64 = header
        .trim()
        .parse()
        .with_context(|| format!("{}: malformed vertex-count header", path.display()))?;

    let total = comm.broadcast_u64(parsed, 0)?;
    if parsed != total {
        bail!(
            "rank {} read {} vertices but rank 0 announced {}",
            comm.rank(),
            parsed,
            total
        );
    }

    let part = Partitioner::new(total, comm.size());
    let (start, end) = (part.start(comm.rank()), part.end(comm.rank()));
    let mut builder = PartitionBuilder::new(part, comm.rank());
    let mut local_edges = 0u64;
    for line in lines {
        let line = line?;
        let mut fields = line.split_whitespace();
        let edge = match (fields.next(), fields.next()) {
            (Some(u), Some(v)) => match (u.parse::<u64>(), v.parse::<u64>()) {
                (Ok(u), Ok(v)) => (u, v),
                _ => break,
            },
            _ => break,
        };
        // rows outside the owned range are dropped by the builder; targets
        // outside the vertex space would corrupt the CSR, so drop them here
        if edge.1 < total {
            if edge.0 >= start && edge.0 < end {
                local_edges += 1;
            }
            builder.add_edge(edge.0, edge.1, 1.0);
        }
    }

    if comm.rank() == 0 {
        log::info!(
            "graph loaded: {} global vertices, {} local edges on rank 0",
            total,
            local_edges
        );
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalGroup;
    use std::io::Write;

    fn graph_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_header_and_edges() {
        let file = graph_file("4\n0 1\n1 2\n2 3\n3 0\n");
        let group = LocalGroup::solo();
        let graph = load_edge_list(file.path(), &group).unwrap();
        assert_eq!(graph.global_count(), 4);
        assert_eq!(graph.local_count(), 4);
        assert_eq!(graph.local_edge_count(), 4);
        assert_eq!(graph.neighbors(3), &[0]);
    }

    #[test]
    fn stops_at_the_first_malformed_line() {
        let file = graph_file("3\n0 1\nnot an edge\n1 2\n");
        let group = LocalGroup::solo();
        let graph = load_edge_list(file.path(), &group).unwrap();
        assert_eq!(graph.local_edge_count(), 1);
    }

    #[test]
    fn rejects_missing_files_and_bad_headers() {
        let group = LocalGroup::solo();
        assert!(load_edge_list(Path::new("/nonexistent/graph.txt"), &group).is_err());
        let file = graph_file("edges follow\n0 1\n");
        assert!(load_edge_list(file.path(), &group).is_err());
    }

    #[test]
    fn drops_edges_pointing_outside_the_vertex_space() {
        let file = graph_file("2\n0 1\n0 9\n");
        let group = LocalGroup::solo();
        let graph = load_edge_list(file.path(), &group).unwrap();
        assert_eq!(graph.local_edge_count(), 1);
    }
}
