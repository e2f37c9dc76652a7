use std::path::PathBuf;

use crate::girvan_newman::Weighting;

pub const DEFAULT_INPUT: &str = "sim.tsv";
pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_LEVELS: usize = 6;
pub const DEFAULT_LEVEL: usize = 6;

pub const LABEL_FILE: &str = "label.csv";
pub const GEPHI_EDGES_FILE: &str = "gephi-edges.csv";
pub const PALS_COMMUNITY_FILE: &str = "pals-community.dat";
pub const PALS_EDGES_FILE: &str = "pals-edges.dat";

/// Knobs for one pipeline run. Defaults reproduce the classic
/// `sim.tsv` / threshold 0.7 / six-level setup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub delimiter: u8,
    /// Dissimilarities strictly above this are dropped.
    pub threshold: f64,
    /// Number of Girvan-Newman partitions to materialise.
    pub max_levels: usize,
    /// 1-based partition exported to the pals files.
    pub level: usize,
    pub weighting: Weighting,
    pub write_dot: bool,
    pub render: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from("."),
            delimiter: b' ',
            threshold: DEFAULT_THRESHOLD,
            max_levels: DEFAULT_MAX_LEVELS,
            level: DEFAULT_LEVEL,
            weighting: Weighting::Unweighted,
            write_dot: true,
            render: false,
        }
    }
}

impl PipelineConfig {
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    pub fn dot_path(&self, level: usize) -> PathBuf {
        self.output_dir.join(format!("communities-level-{level}.dot"))
    }
}
