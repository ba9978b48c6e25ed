//! Error kinds for each stage of the pipeline.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while fetching or parsing the dataset.
#[derive(Debug, Error)]
pub enum DataError {
    /// The source answered, but not with the file (e.g. a 404).
    #[error("could not load {resource}: status {status}")]
    Unreachable { resource: String, status: u16 },
    /// The source could not be read at all.
    #[error("could not read {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: io::Error,
    },
    /// Every row was rejected by validation.
    #[error("no valid data found in CSV")]
    NoValidRows,
    /// A sample's label is missing from the vocabulary used to encode it.
    #[error("label {0:?} is not in the vocabulary")]
    UnknownLabel(String),
}

/// Failures raised by the fit routine. These are not classified further by
/// the session, only reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("{what} width mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("features and labels are misaligned: {features} feature rows, {labels} label rows")]
    Misaligned { features: usize, labels: usize },
    #[error("no rows left to train on ({rows} rows, validation split {split})")]
    EmptyTrainingSet { rows: usize, split: f64 },
    #[error("loss became non-finite at epoch {epoch}")]
    NonFiniteLoss { epoch: usize },
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
}

/// Rejected prediction inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("expected {expected} measurements, got {actual}")]
    WrongArity { expected: usize, actual: usize },
    #[error("measurement {field} is not a number: {value:?}")]
    NotANumber { field: usize, value: String },
    #[error("measurement {field} is not a finite number")]
    NonFinite { field: usize },
}

/// Operations invoked in a session state that cannot serve them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no trained model; train the model first")]
    NoModel,
    #[error("no dataset loaded; load the dataset first")]
    NoDataset,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Any failure surfaced by the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    State(#[from] StateError),
}
