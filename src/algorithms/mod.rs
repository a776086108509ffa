//! Built-in vertex programs and their dispatch

pub mod bfs;
pub mod components;
pub mod labels;
pub mod pagerank;
pub mod walk;

use anyhow::{anyhow, bail, Result};
use std::str::FromStr;

use crate::config::Defaults;
use crate::graph::VertexId;

/// The closed set of algorithms the driver can run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlgoKind {
    Bfs { source: VertexId },
    ConnectedComponents,
    PageRank { damping: f64, iterations: usize },
    LabelPropagation { iterations: usize },
    RandomWalk { walk_length: usize, walks_per_vertex: usize },
}

fn arg<T: FromStr>(args: &[String], index: usize, fallback: T) -> Result<T> {
    match args.get(index) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("could not parse argument '{}'", raw)),
        None => Ok(fallback),
    }
}

impl AlgoKind {
    /// Resolve an algorithm name and its positional arguments.
    pub fn parse(name: &str, args: &[String], defaults: &Defaults) -> Result<AlgoKind> {
        match name {
            "bfs" => Ok(AlgoKind::Bfs {
                source: arg(args, 0, defaults.bfs_source)?,
            }),
            "cc" => Ok(AlgoKind::ConnectedComponents),
            "pr" => Ok(AlgoKind::PageRank {
                damping: defaults.pr_damping,
                iterations: defaults.pr_iterations,
            }),
            "lpa" => Ok(AlgoKind::LabelPropagation {
                iterations: defaults.lpa_iterations,
            }),
            "rw" => Ok(AlgoKind::RandomWalk {
                walk_length: arg(args, 0, defaults.walk_length)?,
                walks_per_vertex: arg(args, 1, defaults.walks_per_vertex)?,
            }),
            other => bail!("unknown algorithm '{}'", other),
        }
    }

    /// The plan run when no algorithm is named on the command line.
    pub fn default_plan(defaults: &Defaults) -> Vec<AlgoKind> {
        vec![
            AlgoKind::PageRank {
                damping: defaults.pr_damping,
                iterations: defaults.pr_iterations,
            },
            AlgoKind::LabelPropagation {
                iterations: defaults.lpa_iterations,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_names_with_defaults_and_overrides() {
        let d = Defaults::default();
        assert_eq!(
            AlgoKind::parse("bfs", &[], &d).unwrap(),
            AlgoKind::Bfs { source: 0 }
        );
        assert_eq!(
            AlgoKind::parse("bfs", &strings(&["7"]), &d).unwrap(),
            AlgoKind::Bfs { source: 7 }
        );
        assert_eq!(
            AlgoKind::parse("cc", &[], &d).unwrap(),
            AlgoKind::ConnectedComponents
        );
        assert_eq!(
            AlgoKind::parse("rw", &strings(&["3", "2"]), &d).unwrap(),
            AlgoKind::RandomWalk {
                walk_length: 3,
                walks_per_vertex: 2
            }
        );
    }

    #[test]
    fn rejects_unknown_names_and_bad_arguments() {
        let d = Defaults::default();
        assert!(AlgoKind::parse("sssp", &[], &d).is_err());
        assert!(AlgoKind::parse("bfs", &strings(&["x"]), &d).is_err());
    }

    #[test]
    fn missing_name_runs_pagerank_then_labels() {
        let plan = AlgoKind::default_plan(&Defaults::default());
        assert!(matches!(plan[0], AlgoKind::PageRank { .. }));
        assert!(matches!(plan[1], AlgoKind::LabelPropagation { .. }));
    }
}
