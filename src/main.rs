use std::path::Path;
use std::thread;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use bspgraph::algorithms::{self, AlgoKind};
use bspgraph::config::Defaults;
use bspgraph::graph::loader;
use bspgraph::results;
use bspgraph::transport::{GroupTransport, LocalGroup};

#[derive(Parser, Debug)]
#[clap(
    name = "bspgraph",
    about = "Distributed bulk-synchronous vertex-centric graph processing"
)]
struct Cli {
    /// Path to the edge-list file (first line: vertex count, then "src dst" pairs)
    graph_file: String,

    /// Algorithm to run: bfs [source], cc, pr, lpa, rw [len [walks]].
    /// Runs pr then lpa when omitted.
    algo: Option<String>,

    /// Positional arguments for the chosen algorithm
    args: Vec<String>,

    /// Number of ranks to run in this process
    #[clap(long, default_value = "1")]
    ranks: usize,

    /// Worker threads for the scatter phase (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let usage_only = matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            let _ = err.print();
            std::process::exit(if usage_only { 0 } else { 1 });
        }
    };

    // Configure logging
    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let num_threads = if cli.threads > 0 {
        cli.threads
    } else {
        num_cpus::get()
    };
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        eprintln!("error: {}", err);
        return 2;
    }

    let path = Path::new(&cli.graph_file);
    if !path.is_file() {
        eprintln!("error: no such graph file: {}", cli.graph_file);
        return 1;
    }
    if cli.ranks == 0 {
        eprintln!("error: --ranks must be at least 1");
        return 1;
    }

    let defaults = Defaults::default();
    let plan = match &cli.algo {
        None => AlgoKind::default_plan(&defaults),
        Some(name) => match AlgoKind::parse(name, &cli.args, &defaults) {
            Ok(kind) => vec![kind],
            Err(err) => {
                eprintln!("error: {}", err);
                return 1;
            }
        },
    };

    log::info!(
        "running {} rank(s) with {} worker thread(s) on {}",
        cli.ranks,
        num_threads,
        cli.graph_file
    );

    let failures = thread::scope(|scope| {
        let plan = &plan;
        let joins: Vec<_> = LocalGroup::new(cli.ranks)
            .into_iter()
            .map(|group| scope.spawn(move || run_rank(group, path, plan)))
            .collect();
        let mut failures = 0;
        for join in joins {
            match join.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    eprintln!("error: {:#}", err);
                    failures += 1;
                }
                Err(_) => {
                    eprintln!("error: a rank thread panicked");
                    failures += 1;
                }
            }
        }
        failures
    });
    if failures > 0 {
        2
    } else {
        0
    }
}

fn run_rank(group: LocalGroup, path: &Path, plan: &[AlgoKind]) -> Result<()> {
    let graph = loader::load_edge_list(path, &group)?;
    let defaults = Defaults::default();

    for &algo in plan {
        match algo {
            AlgoKind::Bfs { source } => {
                let dist =
                    algorithms::bfs::shortest_hops(&graph, &group, source, defaults.max_sweeps)?;
                let values: Vec<String> = dist
                    .iter()
                    .map(|&d| {
                        if d == algorithms::bfs::UNREACHED {
                            "inf".to_string()
                        } else {
                            d.to_string()
                        }
                    })
                    .collect();
                results::print_per_vertex(&group, &graph, "dist", &values)?;
            }
            AlgoKind::ConnectedComponents => {
                let cc = algorithms::components::connected_components(
                    &graph,
                    &group,
                    defaults.max_sweeps,
                )?;
                let values: Vec<String> = cc.iter().map(|c| c.to_string()).collect();
                results::print_per_vertex(&group, &graph, "cc", &values)?;
            }
            AlgoKind::PageRank { damping, iterations } => {
                let pr = algorithms::pagerank::pagerank(&graph, &group, damping, iterations)?;
                let values: Vec<String> = pr.iter().map(|v| format!("{:.4}", v)).collect();
                results::print_per_vertex(&group, &graph, "pr", &values)?;
            }
            AlgoKind::LabelPropagation { iterations } => {
                let labels =
                    algorithms::labels::label_propagation(&graph, &group, iterations)?;
                let values: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
                results::print_per_vertex(&group, &graph, "label", &values)?;
            }
            AlgoKind::RandomWalk {
                walk_length,
                walks_per_vertex,
            } => {
                let walks = algorithms::walk::random_walks(
                    &graph,
                    &group,
                    walk_length,
                    walks_per_vertex,
                )?;
                log::info!("rank {}: {} walks finished here", group.rank(), walks.len());
                results::write_walks(group.rank(), &walks)?;
            }
        }
    }
    Ok(())
}
