use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("input contains no dissimilarity triplets")]
    EmptyInput,

    #[error("threshold must be a finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("negative edge weight {0} cannot be used as a path length")]
    NegativeDistance(f64),

    #[error("partition level {requested} requested but only {available} level(s) were produced")]
    LevelOutOfRange { requested: usize, available: usize },

    #[error("graphviz render failed: {0}")]
    RenderFailed(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
