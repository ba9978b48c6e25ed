//! The session context: owns the loaded dataset and the trained model, and
//! drives load -> preprocess -> train -> predict.
use crate::config::TrainConfig;
use crate::datasets::{Dataset, Sample, FEATURE_COUNT};
use crate::error::{SessionError, StateError};
use crate::metrics::{accuracy, confusion_matrix};
use crate::predict::{parse_features, Prediction, TrainedModel};
use crate::preprocess::preprocess;
use crate::report::Reporter;
use crate::source::{load_dataset, DataSource};
use crate::stats::{summarize, DatasetSummary};
use crate::training::{History, Training};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Loading,
    Preprocessing,
    Training,
    Ready,
    PredictionPending,
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub labels: Vec<String>,
    pub history: History,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Trained(TrainingReport),
    /// A run was already in progress; the request was dropped.
    Ignored,
}

/// Accuracy of the current model over the whole loaded dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub labels: Vec<String>,
    /// `confusion[true][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

/// Releases the in-progress flag on every exit path.
struct TrainingLatch<'a>(&'a Cell<bool>);

impl<'a> TrainingLatch<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for TrainingLatch<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Single-threaded session. Interior mutability keeps a reporter that calls
/// back into the session from aliasing `&mut`; the type is `!Sync`.
#[derive(Debug)]
pub struct Session {
    config: TrainConfig,
    state: Cell<SessionState>,
    training: Cell<bool>,
    dataset: RefCell<Option<Rc<Dataset>>>,
    summary: RefCell<Option<DatasetSummary>>,
    model: RefCell<Option<TrainedModel>>,
    last_error: RefCell<Option<String>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(TrainConfig::default())
    }
}

impl Session {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            state: Cell::new(SessionState::Idle),
            training: Cell::new(false),
            dataset: RefCell::new(None),
            summary: RefCell::new(None),
            model: RefCell::new(None),
            last_error: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_training(&self) -> bool {
        self.training.get()
    }

    pub fn is_ready(&self) -> bool {
        self.model.borrow().is_some()
    }

    /// Message of the most recent failed run, cleared when a new run starts.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn summary(&self) -> Option<DatasetSummary> {
        self.summary.borrow().clone()
    }

    pub fn labels(&self) -> Option<Vec<String>> {
        self.model.borrow().as_ref().map(|m| m.labels().to_vec())
    }

    /// Load the dataset, train a new model and make it current.
    ///
    /// A request made while another run is active is ignored. On failure the
    /// session returns to `Idle` with the message kept in [`Session::last_error`].
    pub fn load_and_train(
        &self,
        source: &dyn DataSource,
        reporter: &mut dyn Reporter,
    ) -> Result<RunOutcome, SessionError> {
        let Some(_latch) = TrainingLatch::acquire(&self.training) else {
            warn!("Training already in progress; ignoring start request");
            return Ok(RunOutcome::Ignored);
        };
        self.last_error.replace(None);

        match self.run(source, reporter) {
            Ok(report) => Ok(RunOutcome::Trained(report)),
            Err(err) => {
                warn!("Run failed: {}", err);
                self.state.set(SessionState::Idle);
                self.last_error.replace(Some(err.to_string()));
                reporter.status(&format!("Error: {}", err));
                reporter.log(&format!("Error: {}", err));
                Err(err)
            }
        }
    }

    fn run(&self, source: &dyn DataSource, reporter: &mut dyn Reporter) -> Result<TrainingReport, SessionError> {
        self.state.set(SessionState::Loading);
        reporter.status(&format!("Loading {}...", source.name()));
        let dataset = Rc::new(load_dataset(source)?.dataset);
        self.dataset.replace(Some(Rc::clone(&dataset)));

        reporter.status("Data loaded successfully! Analyzing...");
        let summary = summarize(&dataset);
        reporter.summary(&summary);
        self.summary.replace(Some(summary));

        self.state.set(SessionState::Preprocessing);
        reporter.status("Preprocessing data...");
        let mut rng = self.config.rng();
        let (batch, vocabulary) = preprocess(&dataset, &mut rng)?;

        self.state.set(SessionState::Training);
        // The old model is gone from here on, even if the config is rejected
        self.model.replace(None);
        reporter.status("Building neural network...");
        let mut training = Training::start(batch, &vocabulary, &self.config, rng)?;

        reporter.status("Training model...");
        reporter.log("Starting training...");
        reporter.log(&format!("Training samples: {}", training.training_rows()));
        reporter.log(&format!("Model architecture: {}", training.architecture()));
        for summary in training.by_ref() {
            reporter.log(&summary?.to_string());
        }
        let (model, history) = training.finish()?;

        if let Some(last) = history.last() {
            reporter.log(&format!(
                "Training completed! Final accuracy: {:.1}%",
                last.accuracy * 100.0
            ));
            let val = last
                .val_accuracy
                .map(|a| format!("{:.1}%", a * 100.0))
                .unwrap_or_else(|| "N/A".to_string());
            reporter.log(&format!("Final validation accuracy: {}", val));
        }

        let labels = model.labels().to_vec();
        self.model.replace(Some(model));
        self.state.set(SessionState::Ready);
        reporter.status("Model trained successfully! Ready for predictions.");
        info!("Session ready with labels {:?}", labels);

        Ok(TrainingReport {
            samples: dataset.len(),
            labels,
            history,
        })
    }

    /// Classify raw measurement fields. Bad input leaves the session `Ready`.
    pub fn predict(&self, fields: &[&str]) -> Result<Prediction, SessionError> {
        if !self.is_ready() {
            return Err(StateError::NoModel.into());
        }
        let features = parse_features(fields)?;
        self.predict_values(&features)
    }

    pub fn predict_values(&self, features: &[f64; FEATURE_COUNT]) -> Result<Prediction, SessionError> {
        let model = self.model.borrow();
        let model = model.as_ref().ok_or(StateError::NoModel)?;
        // A model kept from before a failed run serves predictions from Idle
        let previous = self.state.get();
        if previous == SessionState::Ready {
            self.state.set(SessionState::PredictionPending);
        }
        let result = model.predict(features);
        self.state.set(previous);
        Ok(result?)
    }

    /// A random sample from the loaded dataset, for filling in the inputs.
    pub fn random_example<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Sample, StateError> {
        let dataset = self.dataset.borrow();
        let sample = dataset
            .as_ref()
            .and_then(|d| d.choose(rng))
            .cloned()
            .ok_or(StateError::NoDataset)?;
        info!("Random example: {} (actual species)", sample.label);
        Ok(sample)
    }

    /// Score the current model against the whole loaded dataset.
    pub fn evaluate(&self) -> Result<Evaluation, StateError> {
        let model = self.model.borrow();
        let model = model.as_ref().ok_or(StateError::NoModel)?;
        let dataset = self.dataset.borrow();
        let dataset = dataset.as_ref().ok_or(StateError::NoDataset)?;
        Ok(Evaluation {
            accuracy: accuracy(model, dataset),
            labels: model.labels().to_vec(),
            confusion: confusion_matrix(model, dataset),
        })
    }
}
