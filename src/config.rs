//! Training hyperparameters.
use crate::error::ConfigError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fit settings. Every field has a default, so a JSON file only needs the
/// fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of rows, taken from the end of the batch, held out for validation.
    pub validation_split: f64,
    pub learning_rate: f64,
    pub dropout: f64,
    pub hidden: Vec<usize>,
    /// Report on every `report_every`-th epoch and on the last one.
    pub report_every: usize,
    /// Fixed seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 150,
            batch_size: 16,
            validation_split: 0.2,
            learning_rate: 0.001,
            dropout: 0.2,
            hidden: vec![16, 12],
            report_every: 20,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::Invalid("epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.report_every == 0 {
            return Err(ConfigError::Invalid("report_every must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ConfigError::Invalid(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::Invalid(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.hidden.contains(&0) {
            return Err(ConfigError::Invalid("hidden layers must have at least one unit".into()));
        }
        Ok(())
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_training_setup() {
        let config = TrainConfig::default();
        assert_eq!(config.epochs, 150);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.validation_split, 0.2);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.hidden, vec![16, 12]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let config = TrainConfig::from_json_str(r#"{ "epochs": 10, "seed": 42 }"#).unwrap();
        assert_eq!(config.epochs, 10);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.batch_size, 16);
    }

    #[test]
    fn rejects_out_of_range_values() {
        for json in [
            r#"{ "epochs": 0 }"#,
            r#"{ "batch_size": 0 }"#,
            r#"{ "validation_split": 1.0 }"#,
            r#"{ "dropout": -0.1 }"#,
            r#"{ "learning_rate": 0.0 }"#,
            r#"{ "hidden": [16, 0] }"#,
        ] {
            assert!(
                matches!(TrainConfig::from_json_str(json), Err(ConfigError::Invalid(_))),
                "{json} should be rejected"
            );
        }
        assert!(matches!(TrainConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "learning_rate": 0.01 }}"#).unwrap();
        let config = TrainConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.learning_rate, 0.01);

        let missing = TrainConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn seeded_rngs_repeat() {
        use rand::Rng;
        let config = TrainConfig {
            seed: Some(9),
            ..TrainConfig::default()
        };
        let a: u64 = config.rng().gen();
        let b: u64 = config.rng().gen();
        assert_eq!(a, b);
    }
}
