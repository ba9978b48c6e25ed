//! Metrics for evaluating a trained classifier.
use crate::datasets::Sample;
use crate::predict::TrainedModel;

/// Index of the largest value; the first one wins ties. 0 for an empty slice.
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0usize, |max_i, (i, &v)| if v > values[max_i] { i } else { max_i })
}

/// Fraction of samples whose predicted label matches their own.
pub fn accuracy(model: &TrainedModel, samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let correct = samples
        .iter()
        .filter(|s| model.classify(&s.features) == s.label)
        .count();
    correct as f64 / samples.len() as f64
}

/// `cm[true][predicted]` over the model's label order. Samples whose label
/// the model does not know are skipped.
pub fn confusion_matrix(model: &TrainedModel, samples: &[Sample]) -> Vec<Vec<usize>> {
    let k = model.labels().len();
    let mut cm = vec![vec![0; k]; k];
    for sample in samples {
        let Some(true_class) = model.labels().iter().position(|l| *l == sample.label) else {
            continue;
        };
        let pred_class = argmax(&model.network().predict(&sample.features));
        cm[true_class][pred_class] += 1;
    }
    cm
}
