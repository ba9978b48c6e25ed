//! Mini-batch fit loop with a held-out validation tail.
//!
//! [`Training`] is an iterator: each `next()` runs epochs until the next
//! reporting epoch and yields its [`EpochSummary`]. Consuming it only
//! observes progress; [`Training::finish`] runs whatever is left and returns
//! the trained model.
use crate::config::TrainConfig;
use crate::datasets::FEATURE_COUNT;
use crate::error::TrainingError;
use crate::network::{Gradients, Network};
use crate::optimizer::Adam;
use crate::predict::TrainedModel;
use crate::preprocess::{EncodedBatch, LabelVocabulary};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;

/// Metrics for one finished epoch. `epoch` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

impl fmt::Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val_accuracy = match self.val_accuracy {
            Some(acc) => format!("{:.1}%", acc * 100.0),
            None => "N/A".to_string(),
        };
        write!(
            f,
            "Epoch {}: accuracy = {:.1}%, val_accuracy = {}, loss = {:.4}",
            self.epoch,
            self.accuracy * 100.0,
            val_accuracy,
            self.loss
        )
    }
}

/// Every epoch of a run, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    pub epochs: Vec<EpochSummary>,
}

impl History {
    pub fn last(&self) -> Option<&EpochSummary> {
        self.epochs.last()
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

/// An in-progress fit. Owns the encoded batch, so its buffers are released
/// when the run is finished or dropped.
pub struct Training {
    network: Network,
    optimizer: Adam,
    batch: EncodedBatch,
    labels: Vec<String>,
    config: TrainConfig,
    rng: StdRng,
    train_rows: usize,
    epochs_done: usize,
    history: History,
    failure: Option<TrainingError>,
}

impl Training {
    /// Validate the batch against the vocabulary and build a fresh network.
    pub fn start(
        batch: EncodedBatch,
        vocabulary: &LabelVocabulary,
        config: &TrainConfig,
        mut rng: StdRng,
    ) -> Result<Self, TrainingError> {
        config
            .validate()
            .map_err(|e| TrainingError::InvalidConfig(e.to_string()))?;
        if batch.features().len() != batch.labels().len() {
            return Err(TrainingError::Misaligned {
                features: batch.features().len(),
                labels: batch.labels().len(),
            });
        }
        let classes = vocabulary.len();
        for (features, labels) in batch.features().iter().zip(batch.labels()) {
            if features.len() != FEATURE_COUNT {
                return Err(TrainingError::ShapeMismatch {
                    what: "feature",
                    expected: FEATURE_COUNT,
                    actual: features.len(),
                });
            }
            if labels.len() != classes {
                return Err(TrainingError::ShapeMismatch {
                    what: "label",
                    expected: classes,
                    actual: labels.len(),
                });
            }
        }

        // Validation rows are the tail of the batch, as given
        let rows = batch.len();
        let train_rows = (rows as f64 * (1.0 - config.validation_split)).floor() as usize;
        if train_rows == 0 {
            return Err(TrainingError::EmptyTrainingSet {
                rows,
                split: config.validation_split,
            });
        }

        let network = Network::new(FEATURE_COUNT, &config.hidden, classes, config.dropout, &mut rng);
        let optimizer = Adam::with_learning_rate(&network.slot_sizes(), config.learning_rate);
        info!(
            "Training {} on {} rows ({} held out for validation)",
            network,
            train_rows,
            rows - train_rows
        );
        debug!("Network has {} parameters", network.num_params());

        Ok(Self {
            network,
            optimizer,
            batch,
            labels: vocabulary.labels().to_vec(),
            config: config.clone(),
            rng,
            train_rows,
            epochs_done: 0,
            history: History::default(),
            failure: None,
        })
    }

    pub fn training_rows(&self) -> usize {
        self.train_rows
    }

    pub fn validation_rows(&self) -> usize {
        self.batch.len() - self.train_rows
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_done
    }

    pub fn total_epochs(&self) -> usize {
        self.config.epochs
    }

    /// Layer widths, e.g. `4 -> 16 -> 12 -> 3`.
    pub fn architecture(&self) -> String {
        self.network.to_string()
    }

    fn is_report_epoch(&self, index: usize) -> bool {
        index % self.config.report_every == 0 || index + 1 == self.config.epochs
    }

    fn run_epoch(&mut self) -> Result<EpochSummary, TrainingError> {
        let epoch = self.epochs_done + 1;
        let mut order: Vec<usize> = (0..self.train_rows).collect();
        order.shuffle(&mut self.rng);

        let mut total_loss = 0.0;
        let mut correct = 0usize;
        for chunk in order.chunks(self.config.batch_size) {
            let mut grads = Gradients::zeros(&self.network);
            for &row in chunk {
                let (input, target) = self.batch.row(row);
                let step = self
                    .network
                    .accumulate_gradients(input, target, &mut grads, &mut self.rng)?;
                total_loss += step.loss;
                if step.correct {
                    correct += 1;
                }
            }
            grads.scale(1.0 / chunk.len() as f64);
            self.network.apply_gradients(&grads, &mut self.optimizer)?;
        }

        let loss = total_loss / self.train_rows as f64;
        if !loss.is_finite() {
            return Err(TrainingError::NonFiniteLoss { epoch });
        }
        let (val_loss, val_accuracy) = if self.train_rows < self.batch.len() {
            let (l, a) = self.network.evaluate(
                &self.batch.features()[self.train_rows..],
                &self.batch.labels()[self.train_rows..],
            )?;
            (Some(l), Some(a))
        } else {
            (None, None)
        };

        let summary = EpochSummary {
            epoch,
            loss,
            accuracy: correct as f64 / self.train_rows as f64,
            val_loss,
            val_accuracy,
        };
        self.history.epochs.push(summary.clone());
        self.epochs_done = epoch;
        Ok(summary)
    }

    /// Run the remaining epochs and hand over the model.
    pub fn finish(mut self) -> Result<(TrainedModel, History), TrainingError> {
        if let Some(err) = self.failure.take() {
            return Err(err);
        }
        while self.epochs_done < self.config.epochs {
            self.run_epoch()?;
        }
        if let Some(last) = self.history.last() {
            info!("Training completed: {}", last);
        }
        let Self {
            network,
            labels,
            history,
            ..
        } = self;
        Ok((TrainedModel::new(network, labels)?, history))
    }
}

impl Iterator for Training {
    type Item = Result<EpochSummary, TrainingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failure.is_some() {
            return None;
        }
        while self.epochs_done < self.config.epochs {
            let index = self.epochs_done;
            match self.run_epoch() {
                Ok(summary) if self.is_report_epoch(index) => return Some(Ok(summary)),
                Ok(_) => {}
                Err(err) => {
                    self.failure = Some(err.clone());
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// Fit without observing progress.
pub fn train(
    batch: EncodedBatch,
    vocabulary: &LabelVocabulary,
    config: &TrainConfig,
    rng: StdRng,
) -> Result<(TrainedModel, History), TrainingError> {
    Training::start(batch, vocabulary, config, rng)?.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::one_hot;
    use rand::SeedableRng;

    fn separable_batch(rows: usize) -> (EncodedBatch, LabelVocabulary) {
        let vocabulary = LabelVocabulary::from_labels(["a", "b"]);
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..rows {
            let jitter = (i % 5) as f64 * 0.05;
            if i % 2 == 0 {
                features.push(vec![1.0 + jitter, 0.5, 1.0, 0.2 + jitter]);
                labels.push(one_hot(0, 2));
            } else {
                features.push(vec![6.0 + jitter, 3.0, 5.0, 2.0 - jitter]);
                labels.push(one_hot(1, 2));
            }
        }
        (EncodedBatch::new(features, labels), vocabulary)
    }

    fn quick_config(epochs: usize) -> TrainConfig {
        TrainConfig {
            epochs,
            learning_rate: 0.01,
            seed: Some(1),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn reports_every_twentieth_epoch_and_the_last() {
        let (batch, vocabulary) = separable_batch(20);
        let config = quick_config(45);
        let training = Training::start(batch, &vocabulary, &config, config.rng()).unwrap();
        let epochs: Vec<usize> = training.map(|s| s.unwrap().epoch).collect();
        assert_eq!(epochs, vec![1, 21, 41, 45]);
    }

    #[test]
    fn default_schedule_reports_eight_times() {
        let config = TrainConfig::default();
        let (batch, vocabulary) = separable_batch(10);
        let training = Training::start(batch, &vocabulary, &config, config.rng()).unwrap();
        let epochs: Vec<usize> = training.map(|s| s.unwrap().epoch).collect();
        assert_eq!(epochs, vec![1, 21, 41, 61, 81, 101, 121, 141, 150]);
    }

    #[test]
    fn observing_progress_does_not_change_the_result() {
        let config = quick_config(30);

        let (batch, vocabulary) = separable_batch(40);
        let (quiet, quiet_history) = train(batch, &vocabulary, &config, config.rng()).unwrap();

        let (batch, vocabulary) = separable_batch(40);
        let mut observed = Training::start(batch, &vocabulary, &config, config.rng()).unwrap();
        for summary in observed.by_ref().take(1) {
            summary.unwrap();
        }
        let (loud, loud_history) = observed.finish().unwrap();

        assert_eq!(quiet_history, loud_history);
        assert_eq!(
            quiet.network().predict(&[1.0, 0.5, 1.0, 0.2]),
            loud.network().predict(&[1.0, 0.5, 1.0, 0.2])
        );
    }

    #[test]
    fn holds_out_the_tail_for_validation() {
        let (batch, vocabulary) = separable_batch(50);
        let config = quick_config(1);
        let training = Training::start(batch, &vocabulary, &config, config.rng()).unwrap();
        assert_eq!(training.training_rows(), 40);
        assert_eq!(training.validation_rows(), 10);
        let (_, history) = training.finish().unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.last().unwrap().val_accuracy.is_some());
    }

    #[test]
    fn learns_a_separable_problem() {
        let (batch, vocabulary) = separable_batch(80);
        let config = quick_config(100);
        let (model, history) = train(batch, &vocabulary, &config, config.rng()).unwrap();

        assert_eq!(history.len(), 100);
        assert_eq!(model.labels(), ["a", "b"]);
        assert!(history.last().unwrap().val_accuracy.unwrap() >= 0.9);
        assert_eq!(model.classify(&[1.1, 0.5, 1.0, 0.3]), "a");
        assert_eq!(model.classify(&[6.1, 3.0, 5.0, 1.9]), "b");
    }

    #[test]
    fn label_width_must_match_vocabulary() {
        let (batch, _) = separable_batch(10);
        let three = LabelVocabulary::from_labels(["a", "b", "c"]);
        let config = quick_config(1);
        let err = Training::start(batch, &three, &config, config.rng()).err().unwrap();
        assert_eq!(
            err,
            TrainingError::ShapeMismatch {
                what: "label",
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn too_few_rows_to_train() {
        let (batch, vocabulary) = separable_batch(1);
        let config = quick_config(1);
        let err = Training::start(batch, &vocabulary, &config, config.rng()).err().unwrap();
        assert!(matches!(err, TrainingError::EmptyTrainingSet { rows: 1, .. }));
    }

    fn released_batches() -> usize {
        crate::preprocess::RELEASED_BATCHES.with(|n| n.get())
    }

    #[test]
    fn batch_is_released_when_start_fails() {
        let (batch, vocabulary) = separable_batch(1);
        let before = released_batches();
        let config = quick_config(1);
        assert!(Training::start(batch, &vocabulary, &config, config.rng()).is_err());
        assert_eq!(released_batches(), before + 1);
    }

    #[test]
    fn batch_is_released_when_training_is_abandoned_or_finished() {
        let config = quick_config(3);
        let before = released_batches();

        let (batch, vocabulary) = separable_batch(20);
        let mut abandoned = Training::start(batch, &vocabulary, &config, config.rng()).unwrap();
        abandoned.next().unwrap().unwrap();
        drop(abandoned);
        assert_eq!(released_batches(), before + 1);

        let (batch, vocabulary) = separable_batch(20);
        train(batch, &vocabulary, &config, config.rng()).unwrap();
        assert_eq!(released_batches(), before + 2);
    }

    #[test]
    fn rejects_an_invalid_configuration() {
        let (batch, vocabulary) = separable_batch(10);
        let config = TrainConfig {
            batch_size: 0,
            ..quick_config(1)
        };
        let err = Training::start(batch, &vocabulary, &config, config.rng()).err().unwrap();
        assert!(matches!(err, TrainingError::InvalidConfig(_)));
    }

    #[test]
    fn misaligned_batches_are_rejected() {
        let batch = EncodedBatch::new(vec![vec![1.0; 4]; 3], vec![one_hot(0, 2); 2]);
        let vocabulary = LabelVocabulary::from_labels(["a", "b"]);
        let config = quick_config(1);
        let err = Training::start(batch, &vocabulary, &config, StdRng::seed_from_u64(0))
            .err()
            .unwrap();
        assert_eq!(err, TrainingError::Misaligned { features: 3, labels: 2 });
    }
}
