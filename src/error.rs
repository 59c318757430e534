use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline step an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Load,
    Features,
    Train,
    Evaluate,
    Predict,
    Persist,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Load => "load",
            Step::Features => "features",
            Step::Train => "train",
            Step::Evaluate => "evaluate",
            Step::Predict => "predict",
            Step::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Error taxonomy for the purchase pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data format error at row {row}: {message}")]
    DataFormat { row: usize, message: String },

    #[error("Feature error: {0}")]
    Features(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("Model error: {0}")]
    Model(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Step that failed. IO failures are attributed to loading; the model
    /// artifact maps its own IO errors to [`PipelineError::Model`].
    pub fn step(&self) -> Step {
        match self {
            PipelineError::Io { .. } | PipelineError::DataFormat { .. } => Step::Load,
            PipelineError::Features(_) => Step::Features,
            PipelineError::Training(_) => Step::Train,
            PipelineError::Evaluation(_) => Step::Evaluate,
            PipelineError::Prediction(_) => Step::Predict,
            PipelineError::Model(_) => Step::Persist,
        }
    }
}
