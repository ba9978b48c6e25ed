use crate::error::TrainingError;

/// Adam with one moment buffer per parameter tensor ("slot").
#[derive(Debug)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    beta1_t: f64,
    beta2_t: f64,
    v: Vec<Vec<f64>>,
    s: Vec<Vec<f64>>,
    epsilon: f64,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `slot_sizes` - The length of each parameter tensor this instance updates.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    pub fn new(slot_sizes: &[usize], learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: slot_sizes.iter().map(|&n| vec![0.; n]).collect(),
            s: slot_sizes.iter().map(|&n| vec![0.; n]).collect(),
            epsilon,
        }
    }

    /// `beta1 = 0.9`, `beta2 = 0.999`, `epsilon = 1e-7`.
    pub fn with_learning_rate(slot_sizes: &[usize], learning_rate: f64) -> Self {
        Self::new(slot_sizes, learning_rate, 0.9, 0.999, 1e-7)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Advances the bias-correction terms. Call once per batch, before the
    /// batch's `update_params` calls.
    pub fn next_step(&mut self) {
        self.beta1_t *= self.beta1;
        self.beta2_t *= self.beta2;
    }

    pub fn update_params(&mut self, slot: usize, grad: &[f64], params: &mut [f64]) -> Result<(), TrainingError> {
        let (Some(v), Some(s)) = (self.v.get_mut(slot), self.s.get_mut(slot)) else {
            return Err(TrainingError::ShapeMismatch {
                what: "optimizer slot",
                expected: self.v.len(),
                actual: slot + 1,
            });
        };
        if grad.len() != params.len() || params.len() != v.len() {
            return Err(TrainingError::ShapeMismatch {
                what: "gradient",
                expected: v.len(),
                actual: grad.len(),
            });
        }

        let (lr, b1, b2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(v.iter_mut())
            .zip(s.iter_mut())
            .for_each(|(((p, g), v), s)| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }
}
