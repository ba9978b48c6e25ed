//! Categorical cross-entropy.
use crate::error::TrainingError;

const EPS: f64 = 1e-7;

fn check_widths(pred: &[f64], target: &[f64]) -> Result<(), TrainingError> {
    if pred.len() != target.len() {
        return Err(TrainingError::ShapeMismatch {
            what: "target",
            expected: pred.len(),
            actual: target.len(),
        });
    }
    Ok(())
}

/// Cross-entropy loss (assumes `pred` is a valid probability distribution)
pub fn cross_entropy_loss(pred: &[f64], target: &[f64]) -> Result<f64, TrainingError> {
    check_widths(pred, target)?;
    Ok(pred
        .iter()
        .zip(target)
        .map(|(&p, &t)| -t * p.clamp(EPS, 1.0 - EPS).ln())
        .sum())
}

/// CE deriv for softmax + CE: softmax(x) - target
pub fn cross_entropy_deriv(pred: &[f64], target: &[f64]) -> Result<Vec<f64>, TrainingError> {
    check_widths(pred, target)?;
    Ok(pred.iter().zip(target).map(|(&p, &t)| p - t).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_correct_prediction_has_low_loss() {
        let good = cross_entropy_loss(&[0.98, 0.01, 0.01], &[1.0, 0.0, 0.0]).unwrap();
        let bad = cross_entropy_loss(&[0.01, 0.98, 0.01], &[1.0, 0.0, 0.0]).unwrap();
        assert!(good < 0.05);
        assert!(bad > 4.0);
    }

    #[test]
    fn zero_probability_is_clamped() {
        let loss = cross_entropy_loss(&[0.0, 1.0], &[1.0, 0.0]).unwrap();
        assert!(loss.is_finite());
    }

    #[test]
    fn width_mismatch_is_an_error() {
        assert!(matches!(
            cross_entropy_deriv(&[0.5, 0.5], &[1.0, 0.0, 0.0]),
            Err(TrainingError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
    }
}
