//! Similarity graphs from pairwise dissimilarities, Girvan-Newman
//! communities, and exports for Gephi, pals and Graphviz.

pub mod config;
pub mod degree;
pub mod error;
pub mod export;
pub mod generator;
pub mod girvan_newman;
pub mod graph;
pub mod matrix;
pub mod pipeline;
pub mod threshold;

pub use config::PipelineConfig;
pub use degree::DegreeStats;
pub use error::{PipelineError, Result};
pub use generator::{generate_dissimilarity_file, GeneratorConfig};
pub use girvan_newman::{edge_betweenness, GirvanNewman, Partition, Weighting};
pub use graph::SimilarityGraph;
pub use matrix::{read_triplets, DissimilarityMatrix, LabelIndex, ScoreSummary, Triplet};
pub use pipeline::{run, PipelineReport};
pub use threshold::AdjacencyMatrix;
