//! Files for Gephi, the pals viewer and Graphviz.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use log::debug;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{EdgeReference, NodeIndex, UnGraph};

use crate::error::{PipelineError, Result};
use crate::girvan_newman::Partition;
use crate::graph::SimilarityGraph;
use crate::matrix::LabelIndex;
use crate::threshold::{upper_nonzero, AdjacencyMatrix};

/// Fill colours per community; wraps around when there are more communities.
pub const PALETTE: [&str; 54] = [
    "aquamarine", "bisque", "blanchedalmond", "blueviolet", "brown",
    "burlywood", "cadetblue", "chartreuse", "chocolate", "coral",
    "cornflowerblue", "cornsilk", "crimson", "darkblue", "darkcyan",
    "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki",
    "darkmagenta", "darkolivegreen", "darkorange", "darkslateblue",
    "darkorchid", "darkred", "darksalmon", "darkseagreen",
    "darkslategray", "darkslategrey", "darkturquoise", "darkviolet",
    "deeppink", "deepskyblue", "dimgray", "dimgrey", "dodgerblue",
    "firebrick", "floralwhite", "forestgreen", "fuchsia", "gainsboro",
    "ghostwhite", "gold", "goldenrod", "gray", "green", "greenyellow",
    "grey", "honeydew", "hotpink", "indianred", "indigo", "ivory",
];

pub fn community_color(community: usize) -> &'static str {
    PALETTE[community % PALETTE.len()]
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(BufWriter::new(file))
}

/// `id,label` per label. Replaces any previous file.
pub fn write_labels(path: &Path, labels: &LabelIndex) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(create(path)?);
    for (id, label) in labels.iter() {
        wtr.write_record([id.to_string().as_str(), label])?;
    }
    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    debug!("wrote {} labels to {}", labels.len(), path.display());
    Ok(())
}

/// Gephi edge list: `Source,Target` header, then one quoted label pair per
/// non-zero upper-triangular entry. Returns the number of edges written.
pub fn write_gephi_edges(path: &Path, adj: &AdjacencyMatrix, labels: &LabelIndex) -> Result<usize> {
    let mut out = create(path)?;
    out.write_all(b"Source,Target\n")
        .map_err(|e| PipelineError::io(path, e))?;

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);
    let edges = adj.upper_edges();
    for &(i, j, _) in &edges {
        wtr.write_record([labels.label(i), labels.label(j)])?;
    }
    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    debug!("wrote {} edges to {}", edges.len(), path.display());
    Ok(edges.len())
}

/// Labels in both pals files are wrapped in double quotes as they are,
/// so a label reads the same in the community and the edge file.
fn pals_label(label: &str) -> String {
    format!("\"{label}\"")
}

/// pals community file: `"label" k` with CRLF endings, communities numbered
/// from 1, members in label-id order.
pub fn write_pals_community(path: &Path, partition: &Partition, labels: &LabelIndex) -> Result<()> {
    let mut out = create(path)?;
    for (k, members) in partition.communities().iter().enumerate() {
        for &id in members {
            write!(out, "{} {}\r\n", pals_label(labels.label(id)), k + 1)
                .map_err(|e| PipelineError::io(path, e))?;
        }
    }
    out.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// pals edge file: the adjacency matrix restricted to the partition's
/// members, one space-separated quoted pair per upper-triangular edge.
pub fn write_pals_edges(
    path: &Path,
    adj: &AdjacencyMatrix,
    partition: &Partition,
    labels: &LabelIndex,
) -> Result<usize> {
    let ids = partition.member_ids();
    let sub = adj.submatrix(&ids);

    let mut out = create(path)?;
    let edges = upper_nonzero(&sub);
    for &(i, j, _) in &edges {
        writeln!(
            out,
            "{} {}",
            pals_label(labels.label(ids[i])),
            pals_label(labels.label(ids[j]))
        )
        .map_err(|e| PipelineError::io(path, e))?;
    }
    out.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(edges.len())
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Graphviz rendering of the whole graph, nodes filled by community.
pub fn partition_dot(graph: &SimilarityGraph, partition: &Partition, labels: &LabelIndex) -> String {
    let owner = partition.assignments();
    let edge_attrs = |_: &UnGraph<usize, f64>, edge: EdgeReference<'_, f64>| -> String {
        format!("label=\"{:.2}\"", edge.weight())
    };
    let node_attrs = |_: &UnGraph<usize, f64>, (_, id): (NodeIndex, &usize)| -> String {
        let color = owner.get(id).map_or("white", |&k| community_color(k));
        format!(
            "label=\"{}\", style=filled, fillcolor=\"{}\"",
            escape(labels.label(*id)),
            color
        )
    };
    let dot = Dot::with_attr_getters(
        graph.inner(),
        &[Config::EdgeNoLabel, Config::NodeNoLabel],
        &edge_attrs,
        &node_attrs,
    );
    format!("{:?}", dot)
}

pub fn write_partition_dot(
    path: &Path,
    graph: &SimilarityGraph,
    partition: &Partition,
    labels: &LabelIndex,
) -> Result<()> {
    std::fs::write(path, partition_dot(graph, partition, labels))
        .map_err(|e| PipelineError::io(path, e))
}

/// Runs `dot -Tpng` on a DOT file.
pub fn render_dot(dot_file: &Path, output_image: &Path) -> Result<()> {
    let status = Command::new("dot")
        .arg("-Tpng")
        .arg(dot_file)
        .arg("-o")
        .arg(output_image)
        .status()
        .map_err(|e| PipelineError::RenderFailed(format!("cannot run dot: {e}")))?;
    if !status.success() {
        return Err(PipelineError::RenderFailed(format!(
            "dot exited with {status} for {}",
            dot_file.display()
        )));
    }
    Ok(())
}
