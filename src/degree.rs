use std::collections::BTreeMap;

use crate::matrix::LabelIndex;
use crate::threshold::AdjacencyMatrix;

/// Neighbour counts taken straight from the adjacency rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DegreeStats {
    /// `(label, neighbour count)` in label-id order.
    degrees: Vec<(String, usize)>,
    neighbors: Vec<Vec<usize>>,
}

impl DegreeStats {
    pub fn from_adjacency(adj: &AdjacencyMatrix, labels: &LabelIndex) -> Self {
        let n = adj.dim().min(labels.len());
        let neighbors: Vec<Vec<usize>> = (0..n)
            .map(|i| (0..n).filter(|&j| j != i && adj.get(i, j) != 0.0).collect())
            .collect();
        let degrees = neighbors
            .iter()
            .enumerate()
            .map(|(i, nbrs)| (labels.label(i).to_string(), nbrs.len()))
            .collect();
        Self { degrees, neighbors }
    }

    pub fn degrees(&self) -> &[(String, usize)] {
        &self.degrees
    }

    pub fn degree(&self, id: usize) -> Option<usize> {
        self.degrees.get(id).map(|(_, d)| *d)
    }

    /// First label (by id) with the highest neighbour count.
    pub fn max_node(&self) -> Option<(usize, &str, usize)> {
        let mut best: Option<(usize, &str, usize)> = None;
        for (id, (label, degree)) in self.degrees.iter().enumerate() {
            if best.is_none_or(|(_, _, top)| *degree > top) {
                best = Some((id, label.as_str(), *degree));
            }
        }
        best
    }

    /// Neighbour ids of `id`, itself excluded.
    pub fn neighbors_of(&self, id: usize) -> &[usize] {
        self.neighbors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Most to least connected; equal counts keep label-id order.
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut rows: Vec<(&str, usize)> =
            self.degrees.iter().map(|(l, d)| (l.as_str(), *d)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }

    /// Degree -> number of labels with that degree.
    pub fn histogram(&self) -> BTreeMap<usize, usize> {
        let mut hist = BTreeMap::new();
        for (_, d) in &self.degrees {
            *hist.entry(*d).or_insert(0) += 1;
        }
        hist
    }

    pub fn render_table(&self) -> String {
        const NODE: &str = "Node";
        const COUNT: &str = "Number of Neighbors";
        let rows = self.sorted();
        let width = rows
            .iter()
            .map(|(l, _)| l.chars().count())
            .chain(std::iter::once(NODE.len()))
            .max()
            .unwrap_or(NODE.len());
        let rule = format!("+-{}-+-{}-+\n", "-".repeat(width), "-".repeat(COUNT.len()));

        let mut out = rule.clone();
        out.push_str(&format!("| {NODE:<width$} | {COUNT} |\n"));
        out.push_str(&rule);
        for (label, degree) in rows {
            out.push_str(&format!("| {label:<width$} | {degree:>w$} |\n", w = COUNT.len()));
        }
        out.push_str(&rule);
        out
    }
}
