//! Per-feature ranges and class counts for a loaded dataset.
use crate::datasets::{Sample, FEATURE_COUNT, FEATURE_NAMES, FEATURE_TITLES};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureStats {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub label: String,
    pub count: usize,
}

/// Everything the display surface shows about a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_samples: usize,
    pub features: [FeatureStats; FEATURE_COUNT],
    /// In first-seen order.
    pub class_counts: Vec<ClassCount>,
}

impl DatasetSummary {
    pub fn count_of(&self, label: &str) -> Option<usize> {
        self.class_counts
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.count)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureStats> {
        self.features.iter().find(|f| f.name == name)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn feature_stats(name: &'static str, values: impl Iterator<Item = f64>) -> FeatureStats {
    let (mut min, mut max, mut sum, mut n) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
    for v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        n += 1;
    }
    if n == 0 {
        return FeatureStats { name, min: 0.0, max: 0.0, mean: 0.0 };
    }
    FeatureStats {
        name,
        min: round2(min),
        max: round2(max),
        mean: round2(sum / n as f64),
    }
}

/// Summarize a dataset. Values are rounded to 2 decimals.
pub fn summarize(dataset: &[Sample]) -> DatasetSummary {
    let mut class_counts: Vec<ClassCount> = Vec::new();
    for sample in dataset {
        match class_counts.iter_mut().find(|c| c.label == sample.label) {
            Some(entry) => entry.count += 1,
            None => class_counts.push(ClassCount {
                label: sample.label.clone(),
                count: 1,
            }),
        }
    }

    let features = std::array::from_fn(|i| {
        feature_stats(FEATURE_NAMES[i], dataset.iter().map(|s| s.features[i]))
    });

    DatasetSummary {
        total_samples: dataset.len(),
        features,
        class_counts,
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Samples: {}", self.total_samples)?;
        let distribution: Vec<String> = self
            .class_counts
            .iter()
            .map(|c| format!("{}: {}", c.label, c.count))
            .collect();
        writeln!(f, "Species Distribution: {}", distribution.join(", "))?;
        write!(f, "Feature Ranges:")?;
        for (title, stats) in FEATURE_TITLES.iter().zip(&self.features) {
            write!(
                f,
                "\n  {}: {:.2}-{:.2} cm (avg: {:.2} cm)",
                title, stats.min, stats.max, stats.mean
            )?;
        }
        Ok(())
    }
}
