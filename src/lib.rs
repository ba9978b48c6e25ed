//! A small flower-measurement classifier: load a labeled CSV, summarize it,
//! train a dense network in-process, and predict species for new
//! measurements.
//!
//! - CSV parsing with row validation and label normalization
//! - Per-feature ranges and class counts
//! - Shuffling, a sorted label vocabulary, one-hot encoding
//! - `4 -> 16 -> 12 -> K` ReLU network with dropout, softmax output, Adam
//! - A [`Session`] that drives the whole pipeline and reports progress

pub mod activations;
pub mod config;
pub mod datasets;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod predict;
pub mod preprocess;
pub mod report;
pub mod session;
pub mod source;
pub mod stats;
pub mod training;

pub use config::TrainConfig;
pub use datasets::{parse_csv, Dataset, ParsedCsv, Sample, FEATURE_COUNT};
pub use error::{ConfigError, DataError, InputError, SessionError, StateError, TrainingError};
pub use network::Network;
pub use predict::{parse_features, Prediction, TrainedModel};
pub use preprocess::{preprocess, EncodedBatch, LabelVocabulary};
pub use report::{ConsoleReporter, LogReporter, MemoryReporter, Reporter};
pub use session::{Evaluation, RunOutcome, Session, SessionState, TrainingReport};
pub use source::{load_dataset, DataSource, Fetched, FileSource, StaticSource};
pub use stats::{summarize, DatasetSummary};
pub use training::{train, EpochSummary, History, Training};
