use std::fmt;

/// Trait for element-wise activation functions.
pub trait Activation: fmt::Debug + Send + Sync {
    fn apply(&self, x: f64) -> f64;
    fn derivative(&self, x: f64) -> f64;
    fn apply_vec(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.apply(xi)).collect()
    }
}

/// ReLU: max(0, x)
#[derive(Debug, Clone, Default)]
pub struct ReLU;

impl Activation for ReLU {
    fn apply(&self, x: f64) -> f64 {
        x.max(0.0)
    }
    fn derivative(&self, x: f64) -> f64 {
        (x > 0.0) as u8 as f64
    }
}

/// Linear: identity. Used for output logits, which go through [`Softmax`].
#[derive(Debug, Clone, Default)]
pub struct Linear;

impl Activation for Linear {
    fn apply(&self, x: f64) -> f64 {
        x
    }
    fn derivative(&self, _x: f64) -> f64 {
        1.0
    }
}

/// Softmax over a whole vector.
#[derive(Debug, Clone, Default)]
pub struct Softmax;

impl Softmax {
    pub fn apply_vec(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let max = x.iter().fold(f64::MIN, |a, &b| a.max(b));
        let exps: Vec<f64> = x.iter().map(|&xi| (xi - max).exp()).collect();
        let exp_sum: f64 = exps.iter().sum();
        if !exp_sum.is_finite() || exp_sum <= 0.0 {
            // Uniform rather than NaN
            let n = x.len() as f64;
            return vec![1.0 / n; x.len()];
        }
        exps.into_iter().map(|e| e / exp_sum).collect()
    }
}
