//! Feed-forward classifier: ReLU hidden layers with dropout, softmax output.
use crate::activations::{Linear, ReLU, Softmax};
use crate::error::TrainingError;
use crate::layers::{DenseLayer, Dropout};
use crate::loss::{cross_entropy_deriv, cross_entropy_loss};
use crate::metrics::argmax;
use crate::optimizer::Adam;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Dense network whose output width equals the number of classes.
#[derive(Debug, Clone)]
pub struct Network {
    /// Ordered list of dense layers from input to output.
    pub layers: Vec<DenseLayer>,
    /// Applied after every hidden layer while training.
    dropout: Dropout,
    input_size: usize,
    output_size: usize,
}

/// Gradients for all layers in order, flattened like the layer weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub d_w: Vec<Vec<f64>>,
    pub db: Vec<Vec<f64>>,
}

impl Gradients {
    pub fn zeros(network: &Network) -> Self {
        Self {
            d_w: network.layers.iter().map(|l| vec![0.0; l.weights.len()]).collect(),
            db: network.layers.iter().map(|l| vec![0.0; l.bias.len()]).collect(),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.d_w
            .iter_mut()
            .chain(self.db.iter_mut())
            .flat_map(|g| g.iter_mut())
            .for_each(|g| *g *= factor);
    }
}

/// Loss and hit/miss for one training sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStep {
    pub loss: f64,
    pub correct: bool,
}

impl Network {
    /// Create a network `input_size -> hidden_sizes... -> output_size`.
    ///
    /// Hidden layers use ReLU and are each followed by dropout at
    /// `dropout_rate`; the output layer produces logits for softmax.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        dropout_rate: f64,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden_sizes.len() + 1);
        let mut prev_size = input_size;
        for &size in hidden_sizes {
            layers.push(DenseLayer::new(prev_size, size, Arc::new(ReLU), rng));
            prev_size = size;
        }
        layers.push(DenseLayer::new(prev_size, output_size, Arc::new(Linear), rng));
        Self {
            layers,
            dropout: Dropout::new(dropout_rate),
            input_size,
            output_size,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn dropout(&self) -> Dropout {
        self.dropout
    }

    /// Widths from input to output, e.g. `[4, 16, 12, 3]`.
    pub fn layer_sizes(&self) -> Vec<usize> {
        std::iter::once(self.input_size)
            .chain(self.layers.iter().map(DenseLayer::output_size))
            .collect()
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(|l| l.weights.len() + l.bias.len()).sum()
    }

    /// Class probabilities for one input; dropout is not applied.
    pub fn predict(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        let mut logits = Vec::new();
        for layer in &self.layers {
            let (z, a) = layer.forward(&current);
            logits = z;
            current = a;
        }
        Softmax.apply_vec(&logits)
    }

    fn check_row(&self, input: &[f64], target: &[f64]) -> Result<(), TrainingError> {
        if input.len() != self.input_size {
            return Err(TrainingError::ShapeMismatch {
                what: "feature",
                expected: self.input_size,
                actual: input.len(),
            });
        }
        if target.len() != self.output_size {
            return Err(TrainingError::ShapeMismatch {
                what: "label",
                expected: self.output_size,
                actual: target.len(),
            });
        }
        Ok(())
    }

    /// Training-mode forward and backward pass for one sample, adding its
    /// gradients into `grads`.
    pub fn accumulate_gradients<R: Rng + ?Sized>(
        &self,
        input: &[f64],
        target: &[f64],
        grads: &mut Gradients,
        rng: &mut R,
    ) -> Result<SampleStep, TrainingError> {
        self.check_row(input, target)?;
        let last = self.layers.len() - 1;

        // Forward cache: each layer's (post-dropout) input, pre-activations and mask
        let mut inputs: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());
        let mut zs: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());
        let mut masks: Vec<Option<Vec<f64>>> = Vec::with_capacity(self.layers.len());
        let mut current = input.to_vec();
        for (idx, layer) in self.layers.iter().enumerate() {
            let (z, mut a) = layer.forward(&current);
            let mask = if idx < last {
                let mask = self.dropout.mask(a.len(), rng);
                a.iter_mut().zip(&mask).for_each(|(x, &m)| *x *= m);
                Some(mask)
            } else {
                None
            };
            inputs.push(current);
            zs.push(z);
            masks.push(mask);
            current = a;
        }

        let probs = Softmax.apply_vec(&zs[last]);
        let loss = cross_entropy_loss(&probs, target)?;
        // softmax + CE: dz_last = y_hat - target
        let mut delta = cross_entropy_deriv(&probs, target)?;

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let dz: Vec<f64> = match &masks[idx] {
                None => delta,
                Some(mask) => delta
                    .iter()
                    .zip(mask)
                    .zip(&zs[idx])
                    .map(|((&d, &m), &z)| d * m * layer.activation.derivative(z))
                    .collect(),
            };
            delta = layer.backward(&inputs[idx], &dz, &mut grads.d_w[idx], &mut grads.db[idx]);
        }

        Ok(SampleStep {
            loss,
            correct: argmax(&probs) == argmax(target),
        })
    }

    /// One optimizer step with already-averaged gradients.
    pub fn apply_gradients(&mut self, grads: &Gradients, optimizer: &mut Adam) -> Result<(), TrainingError> {
        optimizer.next_step();
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            optimizer.update_params(2 * idx, &grads.d_w[idx], &mut layer.weights)?;
            optimizer.update_params(2 * idx + 1, &grads.db[idx], &mut layer.bias)?;
        }
        Ok(())
    }

    /// Optimizer slot sizes matching [`Network::apply_gradients`].
    pub fn slot_sizes(&self) -> Vec<usize> {
        self.layers
            .iter()
            .flat_map(|l| [l.weights.len(), l.bias.len()])
            .collect()
    }

    /// Mean loss and accuracy over index-aligned rows, without dropout.
    pub fn evaluate(&self, features: &[Vec<f64>], labels: &[Vec<f64>]) -> Result<(f64, f64), TrainingError> {
        if features.len() != labels.len() {
            return Err(TrainingError::Misaligned {
                features: features.len(),
                labels: labels.len(),
            });
        }
        if features.is_empty() {
            return Ok((0.0, 0.0));
        }
        let mut total_loss = 0.0;
        let mut correct = 0usize;
        for (input, target) in features.iter().zip(labels) {
            self.check_row(input, target)?;
            let probs = self.predict(input);
            total_loss += cross_entropy_loss(&probs, target)?;
            if argmax(&probs) == argmax(target) {
                correct += 1;
            }
        }
        let n = features.len() as f64;
        Ok((total_loss / n, correct as f64 / n))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<String> = self.layer_sizes().iter().map(usize::to_string).collect();
        write!(f, "{}", sizes.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn output_width_follows_class_count() {
        let mut rng = StdRng::seed_from_u64(0);
        for k in [2, 3, 5] {
            let net = Network::new(4, &[16, 12], k, 0.2, &mut rng);
            assert_eq!(net.layer_sizes(), vec![4, 16, 12, k]);
            assert_eq!(net.predict(&[5.1, 3.5, 1.4, 0.2]).len(), k);
        }
    }

    #[test]
    fn display_shows_architecture() {
        let mut rng = StdRng::seed_from_u64(0);
        let net = Network::new(4, &[16, 12], 3, 0.2, &mut rng);
        assert_eq!(net.to_string(), "4 -> 16 -> 12 -> 3");
        assert_eq!(net.num_params(), 4 * 16 + 16 + 16 * 12 + 12 + 12 * 3 + 3);
    }

    #[test]
    fn predict_is_deterministic_and_normalized() {
        let mut rng = StdRng::seed_from_u64(2);
        let net = Network::new(4, &[16, 12], 3, 0.5, &mut rng);
        let a = net.predict(&[6.0, 3.0, 4.5, 1.5]);
        let b = net.predict(&[6.0, 3.0, 4.5, 1.5]);
        assert_eq!(a, b);
        assert!((a.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(4);
        let net = Network::new(3, &[5], 2, 0.0, &mut rng);
        let input = [0.3, -0.7, 1.1];
        let target = [0.0, 1.0];

        let mut grads = Gradients::zeros(&net);
        net.accumulate_gradients(&input, &target, &mut grads, &mut rng).unwrap();

        let loss_of = |n: &Network| cross_entropy_loss(&n.predict(&input), &target).unwrap();
        let h = 1e-6;
        for (layer_idx, w_idx) in [(0, 0), (0, 7), (1, 3)] {
            let mut plus = net.clone();
            plus.layers[layer_idx].weights[w_idx] += h;
            let mut minus = net.clone();
            minus.layers[layer_idx].weights[w_idx] -= h;
            let numeric = (loss_of(&plus) - loss_of(&minus)) / (2.0 * h);
            let analytic = grads.d_w[layer_idx][w_idx];
            assert!((numeric - analytic).abs() < 1e-5, "{numeric} vs {analytic}");
        }
    }

    #[test]
    fn rejects_rows_of_the_wrong_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let net = Network::new(4, &[8], 3, 0.2, &mut rng);
        let mut grads = Gradients::zeros(&net);
        let err = net
            .accumulate_gradients(&[1.0; 4], &[1.0, 0.0], &mut grads, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            TrainingError::ShapeMismatch {
                what: "label",
                expected: 3,
                actual: 2
            }
        );
    }
}
