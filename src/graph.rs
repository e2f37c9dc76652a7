use std::collections::HashMap;

use log::{info, warn};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::matrix::LabelIndex;
use crate::threshold::AdjacencyMatrix;

/// Undirected similarity graph. Node weights are label ids, edge weights the
/// surviving dissimilarities. Labels without any edge are left out.
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    graph: UnGraph<usize, f64>,
    nodes: HashMap<usize, NodeIndex>,
}

impl SimilarityGraph {
    pub fn from_adjacency(adj: &AdjacencyMatrix) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
        let n = adj.dim();

        for i in 0..n {
            for j in 0..n {
                if i == j || adj.get(i, j) == 0.0 {
                    continue;
                }
                let a = *nodes.entry(i).or_insert_with(|| graph.add_node(i));
                let b = *nodes.entry(j).or_insert_with(|| graph.add_node(j));
                if graph.find_edge(a, b).is_none() {
                    graph.add_edge(a, b, adj.get(i, j));
                }
            }
        }

        if graph.edge_count() == 0 {
            warn!("no edges survived the threshold; the graph is empty");
        }
        info!(
            "graph has {} nodes and {} edges ({} singleton labels excluded)",
            graph.node_count(),
            graph.edge_count(),
            n - graph.node_count()
        );
        Self { graph, nodes }
    }

    pub fn inner(&self) -> &UnGraph<usize, f64> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Label ids in node insertion order.
    pub fn label_ids(&self) -> Vec<usize> {
        self.graph.node_indices().map(|n| self.graph[n]).collect()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: usize) -> Option<NodeIndex> {
        self.nodes.get(&id).copied()
    }

    /// Edges as `(label_id, label_id, weight)`.
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()], *e.weight()))
            .collect()
    }

    pub fn neighbor_labels<'a>(&self, id: usize, labels: &'a LabelIndex) -> Vec<&'a str> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let mut ids: Vec<usize> = self.graph.neighbors(node).map(|n| self.graph[n]).collect();
        ids.sort_unstable();
        ids.into_iter().map(|i| labels.label(i)).collect()
    }
}
