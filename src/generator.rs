//! Synthetic dissimilarity data with planted groups.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub labels: usize,
    pub groups: usize,
    pub seed: u64,
    /// Scores between labels of the same group.
    pub intra: Range<f64>,
    /// Scores across groups.
    pub inter: Range<f64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            labels: 60,
            groups: 4,
            seed: 42,
            intra: 0.05..0.5,
            inter: 0.75..1.0,
        }
    }
}

impl GeneratorConfig {
    /// Planted group of label `i`.
    pub fn group_of(&self, i: usize) -> usize {
        i % self.groups.max(1)
    }
}

pub struct LabelGenerator {
    prefixes: Vec<&'static str>,
    suffixes: Vec<&'static str>,
    used: HashSet<String>,
}

impl LabelGenerator {
    pub fn new() -> Self {
        LabelGenerator {
            prefixes: vec![
                "Akai", "Aoi", "Hoshi", "Kaze", "Yuki", "Tsuki", "Sora", "Umi",
                "Hana", "Kumo", "Ame", "Mizu", "Yoru", "Asa", "Niji",
            ],
            suffixes: vec![
                "Uta", "Michi", "Yume", "Koe", "Kage", "Hikari", "Matsuri", "Tabi",
                "Machi", "Mori", "Kawa", "Kokoro", "Sakura", "Namida", "Hibiki",
            ],
            used: HashSet::new(),
        }
    }

    /// `count` distinct labels, deterministic for a given rng state.
    pub fn generate_unique(&mut self, rng: &mut StdRng, count: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let (Some(prefix), Some(suffix)) =
                (self.prefixes.choose(rng), self.suffixes.choose(rng))
            else {
                break;
            };
            let num = rng.gen_range(1..999);
            let mut name = format!("{prefix}{suffix}{num}");
            if self.used.contains(&name) {
                name = format!("{name}_{}", self.used.len());
            }
            if self.used.insert(name.clone()) {
                out.push(name);
            }
        }
        out
    }
}

impl Default for LabelGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// `(a, b, score)` for every unordered pair. Row `i` draws from its own
/// seeded rng so the output does not depend on scheduling.
pub fn generate_triplets(config: &GeneratorConfig) -> Vec<(String, String, f64)> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let labels = LabelGenerator::new().generate_unique(&mut rng, config.labels);

    (0..labels.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1 + i as u64));
            let labels = &labels;
            ((i + 1)..labels.len())
                .map(|j| {
                    let range = if config.group_of(i) == config.group_of(j) {
                        config.intra.clone()
                    } else {
                        config.inter.clone()
                    };
                    let score = rng.gen_range(range);
                    (labels[i].clone(), labels[j].clone(), score)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Writes a space-separated triplet file. Returns the number of rows.
pub fn generate_dissimilarity_file(path: &Path, config: &GeneratorConfig) -> Result<usize> {
    let rows = generate_triplets(config);
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for (a, b, score) in &rows {
        writeln!(writer, "{} {} {:.4}", a, b, score).map_err(|e| PipelineError::io(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    info!(
        "generated {} triplets over {} labels in {} groups to {}",
        rows.len(),
        config.labels,
        config.groups,
        path.display()
    );
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_unique() {
        let mut rng = StdRng::seed_from_u64(7);
        let labels = LabelGenerator::new().generate_unique(&mut rng, 500);
        let distinct: HashSet<&String> = labels.iter().collect();
        assert_eq!(labels.len(), 500);
        assert_eq!(distinct.len(), 500);
    }

    #[test]
    fn every_pair_appears_once_with_planted_scores() {
        let config = GeneratorConfig {
            labels: 12,
            groups: 3,
            ..GeneratorConfig::default()
        };
        let rows = generate_triplets(&config);
        assert_eq!(rows.len(), 12 * 11 / 2);

        let labels: Vec<&String> = rows
            .iter()
            .map(|(a, _, _)| a)
            .chain(rows.iter().map(|(_, b, _)| b))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(labels.len(), 12);
        assert!(rows.iter().all(|(_, _, s)| (0.05..1.0).contains(s)));
    }

    #[test]
    fn same_seed_same_output() {
        let config = GeneratorConfig::default();
        assert_eq!(generate_triplets(&config), generate_triplets(&config));
    }
}
