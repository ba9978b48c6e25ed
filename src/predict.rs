//! Single-sample inference on a trained model.
use crate::datasets::FEATURE_COUNT;
use crate::error::{InputError, TrainingError};
use crate::metrics::argmax;
use crate::network::Network;
use serde::Serialize;
use std::fmt;

/// A trained network plus the label list that decodes its outputs.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    network: Network,
    labels: Vec<String>,
}

impl TrainedModel {
    /// Fails if the network's output width is not the number of labels.
    pub fn new(network: Network, labels: Vec<String>) -> Result<Self, TrainingError> {
        if network.output_size() != labels.len() || labels.is_empty() {
            return Err(TrainingError::ShapeMismatch {
                what: "output",
                expected: labels.len(),
                actual: network.output_size(),
            });
        }
        Ok(Self { network, labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// One forward pass.
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Result<Prediction, InputError> {
        if let Some(field) = features.iter().position(|v| !v.is_finite()) {
            return Err(InputError::NonFinite { field });
        }
        let probs = self.network.predict(features);
        let index = argmax(&probs);
        Ok(Prediction {
            label: self.labels[index].clone(),
            confidence: probs[index],
            probabilities: self.labels.iter().cloned().zip(probs).collect(),
        })
    }

    /// Predicted label only. Callers must pass finite features.
    pub(crate) fn classify(&self, features: &[f64; FEATURE_COUNT]) -> &str {
        &self.labels[argmax(&self.network.predict(features))]
    }
}

/// Outcome of a prediction; `probabilities` follows the model's label order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<(String, f64)>,
}

impl Prediction {
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|&(_, p)| p)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Predicted Species: {}", capitalize(&self.label))?;
        writeln!(f, "Confidence: {:.1}%", self.confidence * 100.0)?;
        write!(f, "All Probabilities:")?;
        for (label, p) in &self.probabilities {
            write!(f, "\n  {}: {:.1}%", capitalize(label), p * 100.0)?;
        }
        Ok(())
    }
}

/// Parse raw user input into four finite measurements.
pub fn parse_features(fields: &[&str]) -> Result<[f64; FEATURE_COUNT], InputError> {
    if fields.len() != FEATURE_COUNT {
        return Err(InputError::WrongArity {
            expected: FEATURE_COUNT,
            actual: fields.len(),
        });
    }
    let mut values = [0.0; FEATURE_COUNT];
    for (field, (raw, slot)) in fields.iter().zip(values.iter_mut()).enumerate() {
        let value: f64 = raw.trim().parse().map_err(|_| InputError::NotANumber {
            field,
            value: raw.to_string(),
        })?;
        if !value.is_finite() {
            return Err(InputError::NonFinite { field });
        }
        *slot = value;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model(k: usize) -> TrainedModel {
        let mut rng = StdRng::seed_from_u64(8);
        let network = Network::new(FEATURE_COUNT, &[16, 12], k, 0.2, &mut rng);
        let labels = (0..k).map(|i| format!("class{i}")).collect();
        TrainedModel::new(network, labels).unwrap()
    }

    #[test]
    fn probabilities_sum_to_one_with_one_entry_per_label() {
        for k in [2, 3, 4] {
            let prediction = model(k).predict(&[5.9, 3.0, 5.1, 1.8]).unwrap();
            assert_eq!(prediction.probabilities.len(), k);
            let total: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-3);
            assert_eq!(prediction.probability_of(&prediction.label), Some(prediction.confidence));
            assert!(prediction.probabilities.iter().all(|(_, p)| *p <= prediction.confidence));
        }
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let err = model(3).predict(&[1.0, f64::NAN, 1.0, 1.0]).unwrap_err();
        assert_eq!(err, InputError::NonFinite { field: 1 });
    }

    #[test]
    fn label_count_must_match_output_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let network = Network::new(FEATURE_COUNT, &[4], 3, 0.0, &mut rng);
        assert!(TrainedModel::new(network, vec!["a".into(), "b".into()]).is_err());
    }

    #[test]
    fn parse_features_validates_each_field() {
        assert_eq!(parse_features(&["5.1", " 3.5", "1.4 ", "0.2"]).unwrap(), [5.1, 3.5, 1.4, 0.2]);
        assert_eq!(
            parse_features(&["abc", "3.5", "1.4", "0.2"]).unwrap_err(),
            InputError::NotANumber {
                field: 0,
                value: "abc".into()
            }
        );
        assert_eq!(
            parse_features(&["1", "2", "3"]).unwrap_err(),
            InputError::WrongArity { expected: 4, actual: 3 }
        );
        assert_eq!(
            parse_features(&["1", "2", "inf", "4"]).unwrap_err(),
            InputError::NonFinite { field: 2 }
        );
    }

    #[test]
    fn display_capitalizes_and_formats_percentages() {
        let prediction = Prediction {
            label: "setosa".into(),
            confidence: 0.9731,
            probabilities: vec![("setosa".into(), 0.9731), ("virginica".into(), 0.0269)],
        };
        let text = prediction.to_string();
        assert!(text.starts_with("Predicted Species: Setosa"));
        assert!(text.contains("Confidence: 97.3%"));
        assert!(text.contains("Virginica: 2.7%"));
    }
}
