//! Triplet parsing, the label index and the symmetric dissimilarity matrix.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use ndarray::Array2;

use crate::error::{PipelineError, Result};

/// One `label label score` row of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Triplet {
    pub a: String,
    pub b: String,
    pub score: f64,
}

/// Bijection between string labels and dense ids, assigned in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelIndex {
    labels: Vec<String>,
    ids: HashMap<String, usize>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `label`, assigning the next free id on first sight.
    pub fn intern(&mut self, label: &str) -> usize {
        if let Some(&id) = self.ids.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.ids.insert(label.to_string(), id);
        id
    }

    pub fn id_of(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn label(&self, id: usize) -> &str {
        &self.labels[id]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().enumerate().map(|(id, l)| (id, l.as_str()))
    }
}

/// Reads triplets from any reader. Repeated delimiters are tolerated, `#`
/// starts a comment line.
pub fn read_triplets<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Triplet>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut triplets = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 3 {
            return Err(PipelineError::MalformedRow {
                line,
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        }
        let score: f64 = fields[2].parse().map_err(|_| PipelineError::MalformedRow {
            line,
            reason: format!("score {:?} is not a number", fields[2]),
        })?;
        if !score.is_finite() {
            return Err(PipelineError::MalformedRow {
                line,
                reason: format!("score {score} is not finite"),
            });
        }
        triplets.push(Triplet {
            a: fields[0].to_string(),
            b: fields[1].to_string(),
            score,
        });
    }
    debug!("parsed {} triplets", triplets.len());
    Ok(triplets)
}

/// Mean, min and max over the non-zero scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct DissimilarityMatrix {
    labels: LabelIndex,
    scores: Array2<f64>,
}

impl DissimilarityMatrix {
    pub fn load(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let triplets = read_triplets(file, delimiter)?;
        let matrix = Self::from_triplets(&triplets)?;
        info!(
            "loaded {} triplets over {} labels from {}",
            triplets.len(),
            matrix.dim(),
            path.display()
        );
        Ok(matrix)
    }

    /// Builds the symmetric matrix. Later rows for the same pair overwrite
    /// earlier ones.
    pub fn from_triplets(triplets: &[Triplet]) -> Result<Self> {
        if triplets.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let mut labels = LabelIndex::new();
        let pairs: Vec<(usize, usize, f64)> = triplets
            .iter()
            .map(|t| {
                let a = labels.intern(&t.a);
                let b = labels.intern(&t.b);
                (a, b, t.score)
            })
            .collect();

        let n = labels.len();
        let mut scores = Array2::<f64>::zeros((n, n));
        for (a, b, score) in pairs {
            scores[[a, b]] = score;
            scores[[b, a]] = score;
        }
        Ok(Self { labels, scores })
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    pub fn dim(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.scores[[i, j]]
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.dim();
        (0..n).all(|i| (i + 1..n).all(|j| self.scores[[i, j]] == self.scores[[j, i]]))
    }

    /// Smallest entry over the whole matrix, diagonal included.
    pub fn min_value(&self) -> f64 {
        self.scores.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn score_summary(&self) -> Option<ScoreSummary> {
        let nonzero: Vec<f64> = self.scores.iter().copied().filter(|&v| v != 0.0).collect();
        if nonzero.is_empty() {
            return None;
        }
        let count = nonzero.len();
        let sum: f64 = nonzero.iter().sum();
        Some(ScoreSummary {
            mean: sum / count as f64,
            min: nonzero.iter().copied().fold(f64::INFINITY, f64::min),
            max: nonzero.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(a: &str, b: &str, score: f64) -> Triplet {
        Triplet {
            a: a.into(),
            b: b.into(),
            score,
        }
    }

    #[test]
    fn ids_follow_first_seen_order() {
        let m = DissimilarityMatrix::from_triplets(&[
            t("B", "A", 0.3),
            t("A", "C", 0.4),
            t("D", "B", 0.9),
        ])
        .unwrap();
        assert_eq!(m.labels().labels(), &["B", "A", "C", "D"]);
        assert_eq!(m.labels().id_of("D"), Some(3));
        assert_eq!(m.labels().id_of("E"), None);
    }

    #[test]
    fn matrix_is_symmetric() {
        let m = DissimilarityMatrix::from_triplets(&[
            t("A", "B", 0.5),
            t("C", "B", 0.8),
            t("A", "C", 0.9),
        ])
        .unwrap();
        assert!(m.is_symmetric());
        assert_eq!(m.get(0, 1), 0.5);
        assert_eq!(m.get(1, 0), 0.5);
        assert_eq!(m.get(2, 1), 0.8);
        assert_eq!(m.get(1, 2), 0.8);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn duplicate_pair_keeps_last_score() {
        let m =
            DissimilarityMatrix::from_triplets(&[t("A", "B", 0.5), t("B", "A", 0.2)]).unwrap();
        assert_eq!(m.get(0, 1), 0.2);
        assert_eq!(m.get(1, 0), 0.2);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            DissimilarityMatrix::from_triplets(&[]),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn parses_space_separated_rows() {
        let input = "# header comment\nA B 0.5\nB  C 0.8\n\nA C 0.9\n";
        let triplets = read_triplets(input.as_bytes(), b' ').unwrap();
        assert_eq!(triplets.len(), 3);
        assert_eq!(triplets[1], t("B", "C", 0.8));
    }

    #[test]
    fn parses_tab_separated_rows() {
        let triplets = read_triplets("A\tB\t0.25\n".as_bytes(), b'\t').unwrap();
        assert_eq!(triplets, vec![t("A", "B", 0.25)]);
    }

    #[test]
    fn rejects_short_rows() {
        let err = read_triplets("A B 0.5\nA C\n".as_bytes(), b' ').unwrap_err();
        match err {
            PipelineError::MalformedRow { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_numeric_scores() {
        let err = read_triplets("A B high\n".as_bytes(), b' ').unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRow { line: 1, .. }));
    }

    #[test]
    fn summary_ignores_zeroes() {
        let m = DissimilarityMatrix::from_triplets(&[
            t("A", "B", 0.5),
            t("B", "C", 0.8),
            t("A", "C", 0.2),
        ])
        .unwrap();
        let s = m.score_summary().unwrap();
        assert_eq!(s.count, 6);
        assert_eq!(s.min, 0.2);
        assert_eq!(s.max, 0.8);
        assert!((s.mean - 0.5).abs() < 1e-12);
        assert_eq!(m.min_value(), 0.0);
    }
}
