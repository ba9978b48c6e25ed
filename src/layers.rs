//! Dense and dropout layers.
use crate::activations::Activation;
use rand::Rng;
use std::sync::Arc;

/// A fully-connected (dense) layer with weights, bias, and an activation function.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    /// Row-major `[output_size][input_size]`.
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
    pub activation: Arc<dyn Activation + Send + Sync>,
    input_size: usize,
}

impl DenseLayer {
    /// Create a new dense layer using He (Kaiming) uniform initialization and small positive bias.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Arc<dyn Activation + Send + Sync>,
        rng: &mut R,
    ) -> Self {
        // He uniform: U(-sqrt(6/fan_in), sqrt(6/fan_in))
        let limit = (6.0f64 / (input_size.max(1) as f64)).sqrt();
        let weights = (0..output_size * input_size)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        let bias = vec![0.01; output_size];
        Self {
            weights,
            bias,
            activation,
            input_size,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.bias.len()
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.weights[i * self.input_size..(i + 1) * self.input_size]
    }

    /// Forward pass: computes pre-activations `z = W·x + b` and activations `a = act(z)`.
    pub fn forward(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let z: Vec<f64> = (0..self.output_size())
            .map(|i| {
                self.row(i).iter().zip(input).map(|(&w, &x)| w * x).sum::<f64>() + self.bias[i]
            })
            .collect();
        let a = self.activation.apply_vec(&z);
        (z, a)
    }

    /// Backward pass for one sample: accumulates `dz ⊗ input` into `d_w` and
    /// `dz` into `db`, and returns `dL/d(input) = W^T · dz`.
    pub fn backward(&self, input: &[f64], dz: &[f64], d_w: &mut [f64], db: &mut [f64]) -> Vec<f64> {
        let mut da_prev = vec![0.0; self.input_size];
        for (i, &d) in dz.iter().enumerate() {
            db[i] += d;
            let offset = i * self.input_size;
            for (j, &x) in input.iter().enumerate() {
                d_w[offset + j] += d * x;
                da_prev[j] += self.weights[offset + j] * d;
            }
        }
        da_prev
    }
}

/// Inverted dropout: during training each unit is zeroed with probability
/// `rate` and survivors are scaled by `1 / (1 - rate)`. Inference skips it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    rate: f64,
}

impl Dropout {
    /// `rate` must lie in `[0, 1)`.
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Sample a mask of per-unit multipliers.
    pub fn mask<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Vec<f64> {
        if self.rate <= 0.0 {
            return vec![1.0; len];
        }
        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        (0..len)
            .map(|_| if rng.gen_bool(keep) { scale } else { 0.0 })
            .collect()
    }
}
