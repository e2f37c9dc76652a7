use log::{debug, info, warn};

use crate::config::{
    PipelineConfig, GEPHI_EDGES_FILE, LABEL_FILE, PALS_COMMUNITY_FILE, PALS_EDGES_FILE,
};
use crate::degree::DegreeStats;
use crate::error::{PipelineError, Result};
use crate::export;
use crate::girvan_newman::{GirvanNewman, Partition};
use crate::graph::SimilarityGraph;
use crate::matrix::{DissimilarityMatrix, ScoreSummary};
use crate::threshold::AdjacencyMatrix;

/// What one run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub label_count: usize,
    pub summary: Option<ScoreSummary>,
    pub zeroed: usize,
    pub cells: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub levels: Vec<Partition>,
    pub selected_level: usize,
    pub gephi_edges: usize,
    pub pals_edges: usize,
    pub degrees: DegreeStats,
    /// Best-connected label and its neighbours.
    pub hub: Option<(String, usize, Vec<String>)>,
}

impl PipelineReport {
    pub fn selected(&self) -> &Partition {
        &self.levels[self.selected_level - 1]
    }
}

/// Picks the 1-based `level` out of the materialised partitions.
pub fn select_level(levels: &[Partition], level: usize) -> Result<&Partition> {
    level
        .checked_sub(1)
        .and_then(|k| levels.get(k))
        .ok_or(PipelineError::LevelOutOfRange {
            requested: level,
            available: levels.len(),
        })
}

/// Load, threshold, build, detect, export, then degree statistics.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| PipelineError::io(&config.output_dir, e))?;

    let sim = DissimilarityMatrix::load(&config.input, config.delimiter)?;
    let labels = sim.labels();
    export::write_labels(&config.output_path(LABEL_FILE), labels)?;
    info!("loaded labels ({} classes)", labels.len());

    let summary = sim.score_summary();
    match summary {
        Some(s) => info!("avg={:.2} min={:.2} max={:.2}", s.mean, s.min, s.max),
        None => warn!("every dissimilarity score is zero"),
    }

    let adj = AdjacencyMatrix::from_dissimilarity(&sim, config.threshold)?;
    let graph = SimilarityGraph::from_adjacency(&adj);

    let levels = GirvanNewman::new(&graph, config.weighting)?.levels(config.max_levels);
    for (k, partition) in levels.iter().enumerate() {
        let level = k + 1;
        debug!("possibility {level}: {:?}", partition.communities());
        if config.write_dot {
            let dot = config.dot_path(level);
            export::write_partition_dot(&dot, &graph, partition, labels)?;
            if config.render {
                export::render_dot(&dot, &dot.with_extension("png"))?;
            }
        }
    }

    let gephi_edges = export::write_gephi_edges(&config.output_path(GEPHI_EDGES_FILE), &adj, labels)?;

    let selected = select_level(&levels, config.level)?;
    info!(
        "exporting level {} with {} communities",
        config.level,
        selected.len()
    );
    export::write_pals_community(&config.output_path(PALS_COMMUNITY_FILE), selected, labels)?;
    let pals_edges =
        export::write_pals_edges(&config.output_path(PALS_EDGES_FILE), &adj, selected, labels)?;

    let degrees = DegreeStats::from_adjacency(&adj, labels);
    let hub = degrees.max_node().map(|(id, label, degree)| {
        let neighbors = degrees
            .neighbors_of(id)
            .iter()
            .map(|&n| labels.label(n).to_string())
            .collect();
        (label.to_string(), degree, neighbors)
    });
    if let Some((label, degree, _)) = &hub {
        info!("{label} has the most neighbors ({degree})");
    }

    Ok(PipelineReport {
        label_count: labels.len(),
        summary,
        zeroed: adj.zero_count(),
        cells: adj.values().len(),
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        levels,
        selected_level: config.level,
        gephi_edges,
        pals_edges,
        degrees,
        hub,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_level_is_one_based() {
        let levels = vec![
            Partition::new(vec![vec![0, 1], vec![2]]),
            Partition::new(vec![vec![0], vec![1], vec![2]]),
        ];
        assert_eq!(select_level(&levels, 1).unwrap().len(), 2);
        assert_eq!(select_level(&levels, 2).unwrap().len(), 3);
        assert!(matches!(
            select_level(&levels, 0),
            Err(PipelineError::LevelOutOfRange { requested: 0, available: 2 })
        ));
        assert!(matches!(
            select_level(&levels, 3),
            Err(PipelineError::LevelOutOfRange { requested: 3, available: 2 })
        ));
    }
}
