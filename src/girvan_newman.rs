//! Girvan-Newman community detection.
//!
//! Edges with the highest betweenness are removed one at a time, with the
//! betweenness recomputed after every removal, until the number of connected
//! components grows. Each split is yielded as a [`Partition`], so the
//! iterator produces successively finer partitions, coarsest first.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use log::{debug, info};
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::graph::SimilarityGraph;

/// Sources handled per rayon task. Fixed so the summation order, and with it
/// tie-breaking between equal scores, does not depend on the thread count.
const SOURCES_PER_TASK: usize = 16;

/// Path metric used by edge betweenness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Weighting {
    /// Every edge has length one.
    #[default]
    Unweighted,
    /// The edge weight (a dissimilarity) is the edge length.
    Distance,
}

/// Disjoint communities of label ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    communities: Vec<Vec<usize>>,
}

impl Partition {
    pub fn new(communities: Vec<Vec<usize>>) -> Self {
        Self { communities }
    }

    pub fn communities(&self) -> &[Vec<usize>] {
        &self.communities
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    /// Index of the community holding `id`.
    pub fn community_of(&self, id: usize) -> Option<usize> {
        self.communities.iter().position(|c| c.contains(&id))
    }

    pub fn assignments(&self) -> HashMap<usize, usize> {
        self.communities
            .iter()
            .enumerate()
            .flat_map(|(k, members)| members.iter().map(move |&id| (id, k)))
            .collect()
    }

    /// Every member id, ascending.
    pub fn member_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.communities.iter().flatten().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// True when `self` has more communities than `coarser`, covers the same
    /// ids, and every community of `self` lies inside a single community of
    /// `coarser`.
    pub fn is_refinement_of(&self, coarser: &Partition) -> bool {
        if self.len() <= coarser.len() || self.member_ids() != coarser.member_ids() {
            return false;
        }
        let owner = coarser.assignments();
        self.communities.iter().all(|members| {
            let first = members.first().and_then(|id| owner.get(id));
            first.is_some() && members.iter().all(|id| owner.get(id) == first)
        })
    }
}

/// Iterator over Girvan-Newman partitions.
pub struct GirvanNewman {
    graph: StableUnGraph<usize, f64>,
    weighting: Weighting,
    started: bool,
}

impl GirvanNewman {
    pub fn new(source: &SimilarityGraph, weighting: Weighting) -> Result<Self> {
        let inner = source.inner();
        let mut graph = StableUnGraph::with_capacity(inner.node_count(), inner.edge_count());
        for node in inner.node_indices() {
            graph.add_node(inner[node]);
        }
        for edge in inner.edge_indices() {
            if let Some((a, b)) = inner.edge_endpoints(edge) {
                let w = inner[edge];
                if weighting == Weighting::Distance && w < 0.0 {
                    return Err(PipelineError::NegativeDistance(w));
                }
                graph.add_edge(a, b, w);
            }
        }
        Ok(Self {
            graph,
            weighting,
            started: false,
        })
    }

    /// Collects at most `max_levels` partitions.
    pub fn levels(self, max_levels: usize) -> Vec<Partition> {
        let levels: Vec<Partition> = self.take(max_levels).collect();
        for (k, p) in levels.iter().enumerate() {
            debug!("level {}: {} communities", k + 1, p.len());
        }
        info!("materialised {} partition level(s)", levels.len());
        levels
    }

    fn components(&self) -> Partition {
        components(&self.graph)
    }

    /// Highest-betweenness edge; ties go to the first edge in [`scan_order`].
    fn most_central_edge(&self) -> Option<EdgeIndex> {
        let scores: HashMap<EdgeIndex, f64> =
            edge_betweenness(&self.graph, self.weighting).into_iter().collect();
        let mut best: Option<(EdgeIndex, f64)> = None;
        for edge in scan_order(&self.graph) {
            let score = scores.get(&edge).copied().unwrap_or(0.0);
            match best {
                Some((_, top)) if !is_greater(score, top) => {}
                _ => best = Some((edge, score)),
            }
        }
        best.map(|(edge, _)| edge)
    }
}

impl Iterator for GirvanNewman {
    type Item = Partition;

    fn next(&mut self) -> Option<Partition> {
        if self.graph.edge_count() == 0 {
            if self.started {
                return None;
            }
            self.started = true;
            return Some(self.components());
        }
        self.started = true;

        let before = tarjan_scc(&self.graph).len();
        while let Some(edge) = self.most_central_edge() {
            self.graph.remove_edge(edge);
            let after = self.components();
            if after.len() > before {
                return Some(after);
            }
        }
        None
    }
}

fn is_greater(a: f64, b: f64) -> bool {
    a > b + 1e-9 * b.abs().max(1.0)
}

/// Connected components as label ids. Communities are ordered by their first
/// node in graph order, members by label id.
pub fn components(graph: &StableUnGraph<usize, f64>) -> Partition {
    let mut comps = tarjan_scc(graph);
    for comp in comps.iter_mut() {
        comp.sort_unstable();
    }
    comps.sort_unstable_by_key(|c| c[0]);
    let communities = comps
        .into_iter()
        .map(|comp| {
            let mut ids: Vec<usize> = comp.into_iter().map(|n| graph[n]).collect();
            ids.sort_unstable();
            ids
        })
        .collect();
    Partition::new(communities)
}

/// Edges in the order a node-by-node scan meets them: nodes in insertion
/// order, each node's neighbours by ascending label id, and edges leading
/// back to an already scanned node skipped.
pub fn scan_order(graph: &StableUnGraph<usize, f64>) -> Vec<EdgeIndex> {
    let mut scanned: HashSet<NodeIndex> = HashSet::new();
    let mut order = Vec::with_capacity(graph.edge_count());
    for node in graph.node_indices() {
        let mut incident: Vec<(usize, NodeIndex, EdgeIndex)> = graph
            .edges(node)
            .map(|e| {
                let other = if e.source() == node { e.target() } else { e.source() };
                (graph[other], other, e.id())
            })
            .collect();
        incident.sort_unstable_by_key(|&(id, _, _)| id);
        order.extend(
            incident
                .into_iter()
                .filter(|(_, other, _)| !scanned.contains(other))
                .map(|(_, _, edge)| edge),
        );
        scanned.insert(node);
    }
    order
}

type Adjacency = Vec<Vec<(usize, usize, f64)>>;

/// Brandes edge betweenness. Each unordered pair of endpoints contributes
/// once; scores are not normalised. Returned in edge index order.
pub fn edge_betweenness(
    graph: &StableUnGraph<usize, f64>,
    weighting: Weighting,
) -> Vec<(EdgeIndex, f64)> {
    let nodes: Vec<NodeIndex> = graph.node_indices().collect();
    let position: HashMap<NodeIndex, usize> =
        nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let edges: Vec<EdgeIndex> = graph.edge_indices().collect();

    let mut adjacency: Adjacency = vec![Vec::new(); nodes.len()];
    for (k, &edge) in edges.iter().enumerate() {
        if let Some((a, b)) = graph.edge_endpoints(edge) {
            let (a, b) = (position[&a], position[&b]);
            let w = graph[edge];
            adjacency[a].push((b, k, w));
            adjacency[b].push((a, k, w));
        }
    }

    let sources: Vec<usize> = (0..nodes.len()).collect();
    let partials: Vec<Vec<f64>> = sources
        .par_chunks(SOURCES_PER_TASK)
        .map(|chunk| {
            let mut acc = vec![0.0; edges.len()];
            for &s in chunk {
                accumulate(&adjacency, s, weighting, &mut acc);
            }
            acc
        })
        .collect();

    let mut totals = vec![0.0; edges.len()];
    for partial in partials {
        for (t, p) in totals.iter_mut().zip(partial) {
            *t += p;
        }
    }
    edges
        .into_iter()
        .zip(totals)
        .map(|(e, score)| (e, score / 2.0))
        .collect()
}

/// Adds the dependencies of source `s` onto `scores`.
fn accumulate(adjacency: &Adjacency, s: usize, weighting: Weighting, scores: &mut [f64]) {
    let n = adjacency.len();
    let mut sigma = vec![0.0_f64; n];
    let mut preds: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    let order = match weighting {
        Weighting::Unweighted => bfs(adjacency, s, &mut sigma, &mut preds),
        Weighting::Distance => dijkstra(adjacency, s, &mut sigma, &mut preds),
    };

    let mut delta = vec![0.0_f64; n];
    for &w in order.iter().rev() {
        let coeff = (1.0 + delta[w]) / sigma[w];
        for &(v, edge) in &preds[w] {
            let c = sigma[v] * coeff;
            scores[edge] += c;
            delta[v] += c;
        }
    }
}

/// Shortest-path DAG by hop count. Returns nodes in non-decreasing distance.
fn bfs(
    adjacency: &Adjacency,
    s: usize,
    sigma: &mut [f64],
    preds: &mut [Vec<(usize, usize)>],
) -> Vec<usize> {
    let mut dist: Vec<Option<usize>> = vec![None; adjacency.len()];
    let mut order = Vec::with_capacity(adjacency.len());
    let mut queue = VecDeque::new();
    dist[s] = Some(0);
    sigma[s] = 1.0;
    queue.push_back(s);

    while let Some(v) = queue.pop_front() {
        order.push(v);
        let next = dist[v].map(|d| d + 1);
        for &(w, edge, _) in &adjacency[v] {
            if dist[w].is_none() {
                dist[w] = next;
                queue.push_back(w);
            }
            if dist[w] == next {
                sigma[w] += sigma[v];
                preds[w].push((v, edge));
            }
        }
    }
    order
}

#[derive(Debug, Clone, Copy)]
struct MinScored(f64, usize);

impl PartialEq for MinScored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MinScored {}

impl PartialOrd for MinScored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinScored {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .total_cmp(&self.0)
            .then_with(|| other.1.cmp(&self.1))
    }
}

/// Shortest-path DAG using edge weights as lengths. Returns nodes in the
/// order they were settled.
fn dijkstra(
    adjacency: &Adjacency,
    s: usize,
    sigma: &mut [f64],
    preds: &mut [Vec<(usize, usize)>],
) -> Vec<usize> {
    let n = adjacency.len();
    let mut dist: Vec<Option<f64>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut heap = BinaryHeap::new();
    dist[s] = Some(0.0);
    sigma[s] = 1.0;
    heap.push(MinScored(0.0, s));

    while let Some(MinScored(d, v)) = heap.pop() {
        if settled[v] {
            continue;
        }
        settled[v] = true;
        order.push(v);
        for &(w, edge, len) in &adjacency[v] {
            if settled[w] {
                continue;
            }
            let candidate = d + len;
            match dist[w] {
                Some(current) if candidate > current => {}
                Some(current) if candidate == current => {
                    sigma[w] += sigma[v];
                    preds[w].push((v, edge));
                }
                _ => {
                    dist[w] = Some(candidate);
                    sigma[w] = sigma[v];
                    preds[w].clear();
                    preds[w].push((v, edge));
                    heap.push(MinScored(candidate, w));
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{DissimilarityMatrix, Triplet};
    use crate::threshold::AdjacencyMatrix;

    fn graph(rows: &[(&str, &str, f64)]) -> SimilarityGraph {
        let triplets: Vec<Triplet> = rows
            .iter()
            .map(|&(a, b, score)| Triplet {
                a: a.into(),
                b: b.into(),
                score,
            })
            .collect();
        let sim = DissimilarityMatrix::from_triplets(&triplets).unwrap();
        let adj = AdjacencyMatrix::from_dissimilarity(&sim, 0.7).unwrap();
        SimilarityGraph::from_adjacency(&adj)
    }

    fn scores_by_label(g: &SimilarityGraph, weighting: Weighting) -> Vec<((usize, usize), f64)> {
        let gn = GirvanNewman::new(g, weighting).unwrap();
        let mut out: Vec<((usize, usize), f64)> = edge_betweenness(&gn.graph, weighting)
            .into_iter()
            .map(|(e, s)| {
                let (a, b) = gn.graph.edge_endpoints(e).unwrap();
                let (a, b) = (gn.graph[a], gn.graph[b]);
                ((a.min(b), a.max(b)), s)
            })
            .collect();
        out.sort_by(|x, y| x.0.cmp(&y.0));
        out
    }

    // A=0 B=1 C=2 D=3, path A-B-C-D
    fn path() -> SimilarityGraph {
        graph(&[("A", "B", 0.1), ("B", "C", 0.1), ("C", "D", 0.1)])
    }

    // two triangles {A,B,C} and {D,E,F} joined by C-D
    fn barbell() -> SimilarityGraph {
        graph(&[
            ("A", "B", 0.1),
            ("B", "C", 0.1),
            ("A", "C", 0.1),
            ("C", "D", 0.3),
            ("D", "E", 0.1),
            ("E", "F", 0.1),
            ("D", "F", 0.1),
        ])
    }

    #[test]
    fn path_betweenness_counts_pairs() {
        let scores = scores_by_label(&path(), Weighting::Unweighted);
        assert_eq!(
            scores,
            vec![((0, 1), 3.0), ((1, 2), 4.0), ((2, 3), 3.0)]
        );
    }

    #[test]
    fn distance_weighting_prefers_short_detour() {
        let g = graph(&[("A", "B", 0.1), ("B", "C", 0.1), ("A", "C", 0.5)]);

        let hops = scores_by_label(&g, Weighting::Unweighted);
        assert!(hops.iter().all(|&(_, s)| (s - 1.0).abs() < 1e-12));

        let dist = scores_by_label(&g, Weighting::Distance);
        assert_eq!(dist, vec![((0, 1), 2.0), ((0, 2), 0.0), ((1, 2), 2.0)]);
    }

    #[test]
    fn first_split_of_path_cuts_the_middle() {
        let mut gn = GirvanNewman::new(&path(), Weighting::Unweighted).unwrap();
        let first = gn.next().unwrap();
        assert_eq!(first.communities(), &[vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn barbell_splits_into_triangles() {
        let levels = GirvanNewman::new(&barbell(), Weighting::Unweighted)
            .unwrap()
            .levels(6);
        assert_eq!(levels[0].communities(), &[vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn levels_refine_down_to_singletons() {
        let levels: Vec<Partition> = GirvanNewman::new(&barbell(), Weighting::Unweighted)
            .unwrap()
            .collect();
        assert_eq!(levels.first().map(Partition::len), Some(2));
        assert_eq!(levels.last().map(Partition::len), Some(6));
        for pair in levels.windows(2) {
            assert!(pair[1].is_refinement_of(&pair[0]));
        }
    }

    #[test]
    fn edgeless_graph_yields_once() {
        let empty = graph(&[("A", "B", 0.9)]);
        let levels: Vec<Partition> = GirvanNewman::new(&empty, Weighting::Unweighted)
            .unwrap()
            .collect();
        assert_eq!(levels.len(), 1);
        assert!(levels[0].is_empty());
    }

    #[test]
    fn disconnected_input_keeps_existing_components() {
        let g = graph(&[
            ("A", "B", 0.1),
            ("B", "C", 0.1),
            ("C", "D", 0.1),
            ("E", "F", 0.1),
        ]);
        let first = GirvanNewman::new(&g, Weighting::Unweighted)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.communities()[2], vec![4, 5]);
    }

    // ids A=0 B=1 C=2 D=3 E=4, but nodes enter the graph as A D B C E
    fn out_of_order() -> SimilarityGraph {
        graph(&[
            ("A", "B", 0.9),
            ("C", "D", 0.5),
            ("A", "D", 0.5),
            ("B", "C", 0.5),
            ("C", "E", 0.5),
            ("D", "E", 0.5),
        ])
    }

    #[test]
    fn scan_order_walks_nodes_then_sorted_neighbours() {
        let g = out_of_order();
        assert_eq!(g.label_ids(), vec![0, 3, 1, 2, 4]);
        let gn = GirvanNewman::new(&g, Weighting::Unweighted).unwrap();
        let pairs: Vec<(usize, usize)> = scan_order(&gn.graph)
            .into_iter()
            .map(|e| {
                let (a, b) = gn.graph.edge_endpoints(e).unwrap();
                (gn.graph[a], gn.graph[b])
            })
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        assert_eq!(pairs, vec![(0, 3), (2, 3), (3, 4), (1, 2), (2, 4)]);
    }

    #[test]
    fn tied_edges_are_removed_in_scan_order() {
        let levels = GirvanNewman::new(&out_of_order(), Weighting::Unweighted)
            .unwrap()
            .levels(4);
        assert_eq!(levels[0].communities(), &[vec![0], vec![1, 2, 3, 4]]);
        assert_eq!(levels[1].communities(), &[vec![0], vec![2, 3, 4], vec![1]]);
        // C-D and D-E tie here; C-D comes first in the scan, leaving C-E
        assert_eq!(
            levels[2].communities(),
            &[vec![0], vec![3], vec![1], vec![2, 4]]
        );
        assert_eq!(levels[3].len(), 5);
    }

    #[test]
    fn distance_weighting_splits_equal_length_paths() {
        // A-D is reached through B (0.1 + 0.4) and through C (0.2 + 0.3);
        // the B-C chord is longer than the detour through A
        let g = graph(&[
            ("A", "B", 0.1),
            ("B", "D", 0.4),
            ("A", "C", 0.2),
            ("C", "D", 0.3),
            ("B", "C", 0.6),
        ]);
        // ids: A=0 B=1 D=2 C=3
        let dist = scores_by_label(&g, Weighting::Distance);
        let expected = [
            ((0, 1), 2.5),
            ((0, 3), 2.5),
            ((1, 2), 1.5),
            ((1, 3), 0.0),
            ((2, 3), 1.5),
        ];
        assert_eq!(dist.len(), expected.len());
        for ((pair, score), (want_pair, want)) in dist.iter().zip(expected) {
            assert_eq!(*pair, want_pair);
            assert!((score - want).abs() < 1e-12, "{pair:?}: {score} != {want}");
        }
    }

    #[test]
    fn refinement_rejects_crossing_partitions() {
        let coarse = Partition::new(vec![vec![0, 1], vec![2, 3]]);
        let crossing = Partition::new(vec![vec![0], vec![1, 2], vec![3]]);
        let nested = Partition::new(vec![vec![0], vec![1], vec![2, 3]]);
        assert!(!crossing.is_refinement_of(&coarse));
        assert!(nested.is_refinement_of(&coarse));
        assert!(!coarse.is_refinement_of(&coarse));
    }

    #[test]
    fn negative_distances_are_rejected() {
        let g = graph(&[("A", "B", -0.1), ("B", "C", 0.2)]);
        assert!(GirvanNewman::new(&g, Weighting::Unweighted).is_ok());
        assert!(matches!(
            GirvanNewman::new(&g, Weighting::Distance),
            Err(PipelineError::NegativeDistance(_))
        ));
    }

    #[test]
    fn community_lookup() {
        let p = Partition::new(vec![vec![0, 2], vec![1]]);
        assert_eq!(p.community_of(2), Some(0));
        assert_eq!(p.community_of(1), Some(1));
        assert_eq!(p.community_of(9), None);
        assert_eq!(p.member_ids(), vec![0, 1, 2]);
    }
}
