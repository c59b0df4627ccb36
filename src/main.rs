use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use covert_network_analyzer::config::AnalysisConfig;
use covert_network_analyzer::data::{self, Dataset};
use covert_network_analyzer::detect::{self, candidates::RoleFilter, Role, Verdict};
use covert_network_analyzer::graph::algorithms::common_neighbors;
use covert_network_analyzer::graph::{NodeId, SocialGraph};
use covert_network_analyzer::metrics::{self, Metric, MetricsTable, NetworkSummary};
use covert_network_analyzer::{storage, viz};

#[derive(Parser, Debug)]
#[clap(
    name = "covert-network-analyzer",
    about = "Detect a covert organization in a social network dataset"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0", global = true)]
    threads: usize,

    /// Verbose logging
    #[clap(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the detection for both scenarios and save the results
    Detect {
        /// Directory holding the dataset tables
        #[clap(long)]
        dataset: PathBuf,

        /// YAML analysis configuration
        #[clap(long, default_value = "config/analysis.yaml")]
        config: PathBuf,

        /// Output directory for results
        #[clap(long, default_value = "results")]
        output_dir: PathBuf,

        /// Reuse (or create) a metrics cache at this path
        #[clap(long)]
        metrics_cache: Option<PathBuf>,

        /// Skip the GraphML export
        #[clap(long)]
        skip_viz: bool,
    },

    /// Inspect the network interactively from the command line
    Explore {
        /// Directory holding the dataset tables
        #[clap(long)]
        dataset: PathBuf,

        /// YAML analysis configuration, used for role hints
        #[clap(long, default_value = "config/analysis.yaml")]
        config: PathBuf,

        /// Reuse (or create) a metrics cache at this path
        #[clap(long)]
        metrics_cache: Option<PathBuf>,

        #[clap(subcommand)]
        query: Query,
    },
}

#[derive(Subcommand, Debug)]
enum Query {
    /// Whole-network statistics
    Summary,

    /// Metrics, contacts and role hints for one person
    Node { id: NodeId },

    /// People ranked by a metric (degree, betweenness, closeness, eigenvector, clustering)
    Top {
        metric: Metric,
        #[clap(default_value = "10")]
        n: usize,
    },

    /// People whose degree lies in `[min, max]`
    Degree { min: usize, max: usize },

    /// Contacts shared by two people
    Common { a: NodeId, b: NodeId },

    /// Members of one detected community
    Community { label: u32 },
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    match args.command {
        Command::Detect {
            dataset,
            config,
            output_dir,
            metrics_cache,
            skip_viz,
        } => run_detect(&dataset, &config, &output_dir, metrics_cache.as_deref(), skip_viz),
        Command::Explore {
            dataset,
            config,
            metrics_cache,
            query,
        } => run_explore(&dataset, &config, metrics_cache.as_deref(), query),
    }
}

/// Load cached metrics for `graph`, computing and caching them on a miss
fn load_metrics(graph: &SocialGraph, cache: Option<&Path>) -> Result<MetricsTable> {
    if let Some(path) = cache {
        match storage::load_metrics_cache(path, graph) {
            Ok(Some(metrics)) => return Ok(metrics),
            Ok(None) => {}
            Err(e) => log::warn!("Could not read metrics cache {}: {}", path.display(), e),
        }
    }

    let metrics = metrics::compute(graph)?;
    if let Some(path) = cache {
        storage::save_metrics_cache(&metrics, path)?;
    }
    Ok(metrics)
}

fn run_detect(
    dataset_dir: &Path,
    config_path: &Path,
    output_dir: &Path,
    cache: Option<&Path>,
    skip_viz: bool,
) -> Result<()> {
    log::info!("Starting criminal network detection");

    // Configuration errors surface before any data is read
    let config = AnalysisConfig::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let Dataset { graph, people, .. } = data::load_dataset(dataset_dir)?;
    let metrics = load_metrics(&graph, cache)?;
    let summary = NetworkSummary::from_metrics(&graph, &metrics);

    let analysis = detect::select_best(&graph, &metrics, &config);

    storage::save_results(&graph, &analysis, &summary, &metrics, &people, output_dir)?;

    if let Verdict::Found(best) = &analysis.verdict {
        if !skip_viz {
            viz::export_network(&graph, best, &metrics, &people, output_dir)?;
        }
        for (role, id) in best.assignment.roles() {
            log::info!("{:<9} {}", role.as_str(), people.label(id));
        }
    }

    log::info!("Analysis complete. Results saved to {}", output_dir.display());
    Ok(())
}

fn run_explore(dataset_dir: &Path, config_path: &Path, cache: Option<&Path>, query: Query) -> Result<()> {
    let config = AnalysisConfig::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let Dataset { graph, people, .. } = data::load_dataset(dataset_dir)?;
    let metrics = load_metrics(&graph, cache)?;

    match query {
        Query::Summary => {
            let summary = NetworkSummary::from_metrics(&graph, &metrics);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("cities: {}", people.cities().join(", "));
        }
        Query::Node { id } => {
            let row = metrics
                .get(id)
                .with_context(|| format!("node {} is not in the network", id))?;
            println!("{}", people.label(id));
            println!("  city:        {}", people.city_of(id).unwrap_or("unknown"));
            println!("  username:    {}", people.username_of(id).unwrap_or("unknown"));
            println!("  degree:      {}", row.degree);
            println!("  betweenness: {:.6}", row.betweenness);
            println!("  closeness:   {:.6}", row.closeness);
            println!("  eigenvector: {:.6}", row.eigenvector);
            println!("  clustering:  {:.4}", row.clustering);
            println!("  component:   {}", row.component);
            println!("  community:   {}", row.community);

            let filter = RoleFilter::new(&metrics, &config.thresholds);
            let hints: Vec<&str> = Role::ALL
                .into_iter()
                .filter(|&role| filter.admits(role, row))
                .map(Role::as_str)
                .collect();
            println!(
                "  fits roles:  {}",
                if hints.is_empty() { "none".to_string() } else { hints.join(", ") }
            );

            let contacts = graph.neighbor_ids(id);
            println!("  contacts ({}):", contacts.len());
            for contact in contacts {
                println!("    {}", people.label(contact));
            }
        }
        Query::Top { metric, n } => {
            for (rank, row) in metrics.top_by(metric, n).into_iter().enumerate() {
                println!("{:>3}. {} {} = {:.6}", rank + 1, people.label(row.id), metric, metric.value(row));
            }
        }
        Query::Degree { min, max } => {
            let rows = metrics.in_degree_range(min, max);
            println!("{} people with degree in [{}, {}]", rows.len(), min, max);
            for row in rows {
                println!("  {} degree {}", people.label(row.id), row.degree);
            }
        }
        Query::Common { a, b } => {
            let shared = common_neighbors(&graph, a, b);
            println!("{} contacts shared by {} and {}", shared.len(), a, b);
            for id in shared {
                println!("  {}", people.label(id));
            }
        }
        Query::Community { label } => {
            let members = metrics.community_members(label);
            println!(
                "{} members in community {} of {} (modularity {:.4})",
                members.len(),
                label,
                metrics.community_count(),
                metrics.modularity()
            );
            for id in members {
                println!("  {}", people.label(id));
            }
        }
    }

    Ok(())
}
