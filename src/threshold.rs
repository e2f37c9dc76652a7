use log::info;
use ndarray::{Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::matrix::DissimilarityMatrix;

/// Thresholded dissimilarities. A zero entry means "no edge".
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyMatrix {
    values: Array2<f64>,
    threshold: f64,
}

impl AdjacencyMatrix {
    /// Copies `sim`, pins the diagonal to the matrix minimum so it survives,
    /// then zeroes everything above `threshold`.
    pub fn from_dissimilarity(sim: &DissimilarityMatrix, threshold: f64) -> Result<Self> {
        check_threshold(threshold)?;
        let mut values = sim.scores().clone();
        values.diag_mut().fill(sim.min_value());
        let mut adj = Self { values, threshold };
        adj.apply(threshold);
        info!(
            "threshold {threshold}: {} out of {} values set to zero",
            adj.zero_count(),
            adj.values.len()
        );
        Ok(adj)
    }

    /// Zeroes entries above `threshold` again. Idempotent for a fixed threshold.
    pub fn rethreshold(&mut self, threshold: f64) -> Result<()> {
        check_threshold(threshold)?;
        self.apply(threshold);
        self.threshold = threshold;
        Ok(())
    }

    fn apply(&mut self, threshold: f64) {
        self.values.mapv_inplace(|v| if v > threshold { 0.0 } else { v });
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn zero_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == 0.0).count()
    }

    /// Non-zero entries with `i < j`, row-major.
    pub fn upper_edges(&self) -> Vec<(usize, usize, f64)> {
        upper_nonzero(&self.values)
    }

    /// The matrix restricted to `ids` (rows and columns, in the given order).
    pub fn submatrix(&self, ids: &[usize]) -> Array2<f64> {
        self.values.select(Axis(0), ids).select(Axis(1), ids)
    }
}

pub(crate) fn upper_nonzero(values: &Array2<f64>) -> Vec<(usize, usize, f64)> {
    let n = values.nrows();
    let mut edges = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            let v = values[[i, j]];
            if v != 0.0 {
                edges.push((i, j, v));
            }
        }
    }
    edges
}

fn check_threshold(threshold: f64) -> Result<()> {
    if threshold.is_finite() {
        Ok(())
    } else {
        Err(PipelineError::InvalidThreshold(threshold))
    }
}
