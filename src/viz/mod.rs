//! Export of the detected structure for external graph tools

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::People;
use crate::detect::ScoredAssignment;
use crate::error::StorageError;
use crate::graph::algorithms::induced_edges;
use crate::graph::SocialGraph;
use crate::metrics::MetricsTable;

pub const GRAPHML_FILE: &str = "network.graphml";
pub const NODES_FILE: &str = "nodes.csv";

/// Write the winning structure as GraphML plus a node table.
///
/// Only the role holders and the links among them are exported. Returns
/// the directory the files were written to.
pub fn export_network(
    graph: &SocialGraph,
    best: &ScoredAssignment,
    metrics: &MetricsTable,
    people: &People,
    output_dir: impl AsRef<Path>,
) -> Result<PathBuf, StorageError> {
    let viz_dir = output_dir.as_ref().join("visualizations");
    fs::create_dir_all(&viz_dir)?;

    let roles = best.assignment.roles();
    let members = best.assignment.members();
    let edges = induced_edges(graph, &members);
    log::info!(
        "Exporting scenario {} structure: {} members, {} links",
        best.scenario,
        members.len(),
        edges.len()
    );

    let mut file = BufWriter::new(File::create(viz_dir.join(GRAPHML_FILE))?);
    writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(file, "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">")?;
    writeln!(file, "  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"role\" for=\"node\" attr.name=\"role\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"degree\" for=\"node\" attr.name=\"degree\" attr.type=\"int\"/>")?;
    writeln!(file, "  <key id=\"betweenness\" for=\"node\" attr.name=\"betweenness\" attr.type=\"double\"/>")?;
    writeln!(file, "  <graph id=\"G\" edgedefault=\"undirected\">")?;

    for &(role, id) in &roles {
        let row = metrics.get(id);
        writeln!(file, "    <node id=\"n{}\">", id)?;
        writeln!(file, "      <data key=\"label\">{}</data>", escape_xml(&people.label(id)))?;
        writeln!(file, "      <data key=\"role\">{}</data>", role)?;
        writeln!(file, "      <data key=\"degree\">{}</data>", row.map_or(0, |r| r.degree))?;
        writeln!(
            file,
            "      <data key=\"betweenness\">{}</data>",
            row.map_or(0.0, |r| r.betweenness)
        )?;
        writeln!(file, "    </node>")?;
    }

    for (edge_id, (a, b)) in edges.iter().enumerate() {
        writeln!(file, "    <edge id=\"e{}\" source=\"n{}\" target=\"n{}\"/>", edge_id, a, b)?;
    }

    writeln!(file, "  </graph>")?;
    writeln!(file, "</graphml>")?;
    file.flush()?;

    let mut nodes = BufWriter::new(File::create(viz_dir.join(NODES_FILE))?);
    writeln!(
        nodes,
        "id,role,name,username,city,degree,betweenness,closeness,clustering,community"
    )?;
    for &(role, id) in &roles {
        let Some(row) = metrics.get(id) else {
            log::warn!("No metrics for {}, leaving it out of {}", id, NODES_FILE);
            continue;
        };
        writeln!(
            nodes,
            "{},{},{},{},{},{},{:.6},{:.6},{:.6},{}",
            id,
            role,
            escape_csv(people.name_of(id).unwrap_or("")),
            escape_csv(people.username_of(id).unwrap_or("")),
            escape_csv(people.city_of(id).unwrap_or("")),
            row.degree,
            row.betweenness,
            row.closeness,
            row.clustering,
            row.community
        )?;
    }
    nodes.flush()?;

    Ok(viz_dir)
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escape_csv(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
