//! Linear transformations and the two-layer merge unit.

use ndarray::{Array1, Array2, ArrayView1};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Linear transformation layer (weight matrix multiplication plus bias).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// Create a new linear layer with Xavier/Glorot initialization.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        let mut rng = rand::thread_rng();

        // Xavier initialization: scale = sqrt(2.0 / (input_dim + output_dim))
        let scale = (2.0 / (input_dim + output_dim) as f32).sqrt();
        let normal = Normal::new(0.0, scale as f64).unwrap();

        let weights =
            Array2::from_shape_fn((output_dim, input_dim), |_| normal.sample(&mut rng) as f32);
        let bias = Array1::zeros(output_dim);

        Self { weights, bias }
    }

    /// Forward pass: y = Wx + b
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let x = ArrayView1::from(input);
        let output = self.weights.dot(&x) + &self.bias;
        output.to_vec()
    }

    /// Output dimension of the layer.
    pub fn output_dim(&self) -> usize {
        self.weights.shape()[0]
    }

    /// Input dimension of the layer.
    pub fn input_dim(&self) -> usize {
        self.weights.shape()[1]
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f32) -> f32 {
    if x > 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let ex = x.exp();
        ex / (1.0 + ex)
    }
}

fn relu(v: &mut [f32]) {
    for x in v.iter_mut() {
        if *x < 0.0 {
            *x = 0.0;
        }
    }
}

/// Two-layer feed-forward unit over the concatenation of two inputs.
///
/// Computes `fc2(relu(fc1([x1 | x2])))`, optionally adding `x2` back onto
/// the output as a residual skip. Serves both as the per-layer merge unit
/// (attention output merged with the node's own representation, skip on)
/// and as the affinity head (two representations to one scalar, skip off).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeLayer {
    fc1: Linear,
    fc2: Linear,
    skip: bool,
}

impl MergeLayer {
    /// Create a merge unit without a residual path.
    pub fn new(dim1: usize, dim2: usize, hidden_dim: usize, output_dim: usize) -> Self {
        Self {
            fc1: Linear::new(dim1 + dim2, hidden_dim),
            fc2: Linear::new(hidden_dim, output_dim),
            skip: false,
        }
    }

    /// Create a merge unit whose output receives `x2` as a residual skip.
    /// Requires `output_dim == dim2`.
    pub fn with_skip(dim1: usize, dim2: usize, hidden_dim: usize, output_dim: usize) -> Self {
        assert_eq!(
            output_dim, dim2,
            "residual skip requires output_dim == dim2"
        );
        Self {
            fc1: Linear::new(dim1 + dim2, hidden_dim),
            fc2: Linear::new(hidden_dim, output_dim),
            skip: true,
        }
    }

    /// Forward pass over a concatenated input pair.
    pub fn forward(&self, x1: &[f32], x2: &[f32]) -> Vec<f32> {
        let mut cat = Vec::with_capacity(x1.len() + x2.len());
        cat.extend_from_slice(x1);
        cat.extend_from_slice(x2);

        let mut hidden = self.fc1.forward(&cat);
        relu(&mut hidden);
        let mut output = self.fc2.forward(&hidden);

        if self.skip {
            for (o, &v) in output.iter_mut().zip(x2.iter()) {
                *o += v;
            }
        }
        output
    }

    /// Output dimension of the unit.
    pub fn output_dim(&self) -> usize {
        self.fc2.output_dim()
    }
}
