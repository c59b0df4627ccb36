//! Results persistence and the metrics cache

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use crate::data::People;
use crate::detect::{Analysis, Role, ScenarioReport, ScenarioStatus, ScoredAssignment, Verdict};
use crate::error::StorageError;
use crate::graph::algorithms::subgraph_stats;
use crate::graph::SocialGraph;
use crate::metrics::{MetricsTable, NetworkSummary};

pub const ANALYSIS_FILE: &str = "analysis.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const REPORT_FILE: &str = "report.txt";

/// Save analysis results to the specified directory
pub fn save_results(
    graph: &SocialGraph,
    analysis: &Analysis,
    summary: &NetworkSummary,
    metrics: &MetricsTable,
    people: &People,
    output_dir: impl AsRef<Path>,
) -> Result<(), StorageError> {
    let output_dir = output_dir.as_ref();
    log::info!("Saving results to {}", output_dir.display());

    fs::create_dir_all(output_dir)?;

    write_json(&output_dir.join(ANALYSIS_FILE), analysis)?;
    write_json(&output_dir.join(SUMMARY_FILE), summary)?;

    let mut report = BufWriter::new(File::create(output_dir.join(REPORT_FILE))?);
    write_report(&mut report, graph, analysis, summary, metrics, people)?;
    report.flush()?;

    log::info!("Results saved successfully");
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Human-readable report of both scenarios and the verdict
pub fn write_report(
    out: &mut impl Write,
    graph: &SocialGraph,
    analysis: &Analysis,
    summary: &NetworkSummary,
    metrics: &MetricsTable,
    people: &People,
) -> io::Result<()> {
    writeln!(out, "CRIMINAL NETWORK ANALYSIS REPORT\n")?;

    writeln!(out, "NETWORK STATISTICS")?;
    writeln!(out, "Nodes: {}", summary.node_count)?;
    writeln!(out, "Edges: {}", summary.edge_count)?;
    writeln!(out, "Density: {:.6}", summary.density)?;
    writeln!(out, "Average degree: {:.2}", summary.average_degree)?;
    writeln!(out, "Average clustering: {:.4}", summary.average_clustering)?;
    writeln!(
        out,
        "Components: {} (largest {}, connected: {})",
        summary.component_count, summary.largest_component, summary.is_connected
    )?;
    if let (Some(diameter), Some(average)) = (summary.diameter, summary.average_path_length) {
        writeln!(out, "Diameter: {}, average path length: {:.3}", diameter, average)?;
    }
    writeln!(
        out,
        "Communities: {} (modularity {:.4})\n",
        summary.community_count, summary.modularity
    )?;

    writeln!(out, "CANDIDATES")?;
    for role in Role::ALL {
        writeln!(out, "{}: {}", role, analysis.candidates.get(role).len())?;
    }
    writeln!(out)?;

    for report in [&analysis.scenario_a, &analysis.scenario_b] {
        write_scenario(out, report, metrics, people)?;
    }

    writeln!(out, "VERDICT")?;
    match &analysis.verdict {
        Verdict::Found(best) => {
            writeln!(
                out,
                "Scenario {} ({}) with score {:.4}",
                best.scenario,
                best.scenario.describe(),
                best.score
            )?;
            let structure = subgraph_stats(graph, &best.assignment.members());
            writeln!(
                out,
                "Structure: {} members, {} links, density {:.3}, diameter {}",
                structure.node_count,
                structure.edge_count,
                structure.density,
                structure
                    .diameter
                    .map_or_else(|| "n/a".to_string(), |d| d.to_string())
            )?;
        }
        Verdict::NoValidAssignment => writeln!(out, "No valid assignment in either scenario")?,
    }

    Ok(())
}

fn write_scenario(
    out: &mut impl Write,
    report: &ScenarioReport,
    metrics: &MetricsTable,
    people: &People,
) -> io::Result<()> {
    writeln!(
        out,
        "SCENARIO {}: {}",
        report.scenario,
        report.scenario.describe().to_uppercase()
    )?;
    writeln!(
        out,
        "Search steps: {}{}, assignments scored: {}",
        report.combinations_examined,
        if report.hit_limit { " (limit reached)" } else { "" },
        report.assignments_scored
    )?;

    match &report.status {
        ScenarioStatus::Matched(best) => write_assignment(out, best, metrics, people)?,
        ScenarioStatus::Disqualified(reason) => writeln!(out, "Disqualified: {}", reason)?,
    }

    if !report.rejections.is_empty() {
        writeln!(out, "Rejected assignments:")?;
        for (reason, count) in &report.rejections {
            writeln!(out, "  {}: {}", reason, count)?;
        }
    }
    writeln!(out)
}

fn write_assignment(
    out: &mut impl Write,
    best: &ScoredAssignment,
    metrics: &MetricsTable,
    people: &People,
) -> io::Result<()> {
    writeln!(out, "Score: {:.4}", best.score)?;
    let b = &best.breakdown;
    writeln!(
        out,
        "Fit: employee {:.3}, handler {:.3}, middleman {:.3}, leader {:.3}",
        b.employee, b.handler, b.middleman, b.leader
    )?;

    for (role, id) in best.assignment.roles() {
        let city = people.city_of(id).unwrap_or("unknown");
        match metrics.get(id) {
            Some(row) => writeln!(
                out,
                "  {:<9} {} city: {}, degree: {}, betweenness: {:.6}, community: {}",
                role.as_str(),
                people.label(id),
                city,
                row.degree,
                row.betweenness,
                row.community
            )?,
            None => writeln!(out, "  {:<9} {} city: {}", role.as_str(), people.label(id), city)?,
        }
    }
    Ok(())
}

/// Write the metrics table so later runs on the same graph can skip
/// recomputing betweenness
pub fn save_metrics_cache(metrics: &MetricsTable, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, metrics)?;
    writer.flush()?;

    log::info!("Saved metrics cache for {} nodes to {}", metrics.len(), path.display());
    Ok(())
}

/// Load a cached table if it exists and was computed for `graph`.
///
/// A missing or stale cache yields `Ok(None)`.
pub fn load_metrics_cache(
    path: impl AsRef<Path>,
    graph: &SocialGraph,
) -> Result<Option<MetricsTable>, StorageError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut metrics: MetricsTable = bincode::deserialize_from(BufReader::new(file))?;
    if !metrics.matches(graph) {
        log::warn!("Ignoring stale metrics cache at {}", path.display());
        return Ok(None);
    }

    metrics.rebuild_index();
    log::info!("Loaded metrics cache for {} nodes", metrics.len());
    Ok(Some(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::detect::select_best;
    use crate::graph::GraphBuilder;
    use crate::metrics::compute;
    use std::collections::BTreeMap;

    fn graph() -> SocialGraph {
        GraphBuilder::from_edges(1..=4, [(1, 2), (2, 3), (3, 4)]).unwrap()
    }

    fn settings() -> BTreeMap<String, String> {
        [
            ("employee.degree_min", "1"),
            ("employee.degree_max", "5"),
            ("handler.degree_min", "1"),
            ("handler.degree_max", "5"),
            ("middleman.betweenness_min", "0.0"),
            ("leader.degree_min", "1"),
            ("scoring.weights.employee", "1"),
            ("scoring.weights.handler", "1"),
            ("scoring.weights.middleman", "1"),
            ("scoring.weights.leader", "1"),
            ("search.combination_limit", "100"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn metrics_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("metrics.bin");
        let g = graph();
        let metrics = compute(&g).unwrap();

        save_metrics_cache(&metrics, &path).unwrap();
        let loaded = load_metrics_cache(&path, &g).unwrap().expect("cache should match");

        assert_eq!(loaded.len(), metrics.len());
        assert_eq!(loaded.get(2), metrics.get(2));
        assert_eq!(loaded.fingerprint(), metrics.fingerprint());
    }

    #[test]
    fn stale_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.bin");
        save_metrics_cache(&compute(&graph()).unwrap(), &path).unwrap();

        let other = GraphBuilder::from_edges(1..=4, [(1, 2), (2, 3), (3, 4), (4, 1)]).unwrap();
        assert!(load_metrics_cache(&path, &other).unwrap().is_none());
    }

    #[test]
    fn missing_cache_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_metrics_cache(dir.path().join("absent.bin"), &graph())
            .unwrap()
            .is_none());
    }

    #[test]
    fn writes_all_result_files() {
        let dir = tempfile::tempdir().unwrap();
        let g = graph();
        let metrics = compute(&g).unwrap();
        let config = AnalysisConfig::from_flat(&settings()).unwrap();
        let analysis = select_best(&g, &metrics, &config);
        let summary = NetworkSummary::from_metrics(&g, &metrics);

        save_results(&g, &analysis, &summary, &metrics, &People::default(), dir.path()).unwrap();

        let json = fs::read_to_string(dir.path().join(ANALYSIS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("verdict").is_some());

        let report = fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        assert!(report.contains("SCENARIO A"));
        assert!(report.contains("SCENARIO B"));
        // a path graph has no employee with three handlers
        assert!(report.contains("No valid assignment"));
        assert!(dir.path().join(SUMMARY_FILE).exists());
    }

    #[test]
    fn report_describes_the_winning_structure() {
        // employee 1, handlers 2-4, middleman 5, leader 6
        let g = GraphBuilder::from_edges(1..=6, [(1, 2), (1, 3), (1, 4), (2, 5), (3, 5), (4, 5), (5, 6)]).unwrap();
        let metrics = compute(&g).unwrap();
        let mut map = settings();
        map.insert("employee.degree_min".into(), "3".into());
        map.insert("handler.degree_max".into(), "2".into());
        let config = AnalysisConfig::from_flat(&map).unwrap();
        let analysis = select_best(&g, &metrics, &config);
        let summary = NetworkSummary::from_metrics(&g, &metrics);

        let mut out = Vec::new();
        write_report(&mut out, &g, &analysis, &summary, &metrics, &People::default()).unwrap();
        let report = String::from_utf8(out).unwrap();

        assert!(report.contains("Scenario A (single middleman)"), "{}", report);
        assert!(report.contains("Structure: 6 members, 7 links"));
        assert!(report.contains("Diameter: 3"));
    }

    #[test]
    fn report_errors_reach_the_caller() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let g = graph();
        let metrics = compute(&g).unwrap();
        let config = AnalysisConfig::from_flat(&settings()).unwrap();
        let analysis = select_best(&g, &metrics, &config);
        let summary = NetworkSummary::from_metrics(&g, &metrics);

        let err = write_report(&mut Broken, &g, &analysis, &summary, &metrics, &People::default()).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
