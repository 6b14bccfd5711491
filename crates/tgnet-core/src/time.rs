//! Time delta encoders.
//!
//! Every layer representation carries a temporal signal obtained by encoding
//! the elapsed time between the query cutoff and the edge that produced a
//! neighbor. Three interchangeable variants share one capability:
//! encode a batch of non-negative deltas into fixed-dimension vectors.

use ndarray::{Array1, Array2};
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::config::TimeEncodingKind;
use crate::error::{CoreError, Result};

/// Capability shared by all time encoding variants.
pub trait TimeEncoder {
    /// Output dimension of the encoding.
    fn dim(&self) -> usize;

    /// Encode a batch of time deltas, one vector per delta.
    fn encode(&self, deltas: &[f64]) -> Result<Vec<Vec<f32>>>;
}

/// Learned harmonic encoding: `out_j = cos(dt * omega_j + phi_j)`.
///
/// Frequencies start on a decade grid spanning ten orders of magnitude so
/// that deltas from fractions of a tick up to billions of ticks land in the
/// responsive range of at least one dimension. Both the frequencies and the
/// phases are trainable parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonicEncoder {
    omega: Array1<f32>,
    phase: Array1<f32>,
}

impl HarmonicEncoder {
    /// Create an encoder of the given output dimension.
    pub fn new(time_dim: usize) -> Self {
        let omega = Array1::from_shape_fn(time_dim, |j| {
            let exponent = if time_dim > 1 {
                9.0 * j as f64 / (time_dim - 1) as f64
            } else {
                0.0
            };
            (1.0 / 10f64.powf(exponent)) as f32
        });
        let phase = Array1::zeros(time_dim);
        Self { omega, phase }
    }

    /// The per-dimension phase parameters.
    pub fn phase(&self) -> &Array1<f32> {
        &self.phase
    }
}

impl TimeEncoder for HarmonicEncoder {
    fn dim(&self) -> usize {
        self.omega.len()
    }

    fn encode(&self, deltas: &[f64]) -> Result<Vec<Vec<f32>>> {
        let out = deltas
            .iter()
            .map(|&dt| {
                self.omega
                    .iter()
                    .zip(self.phase.iter())
                    .map(|(&w, &p)| (dt * w as f64 + p as f64).cos() as f32)
                    .collect()
            })
            .collect();
        Ok(out)
    }
}

/// Learned lookup table over bounded integer positions.
///
/// The input delta is truncated to an integer row index. A position at or
/// past `max_positions` is a checked error rather than an out-of-range read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionalEncoder {
    table: Array2<f32>,
}

impl PositionalEncoder {
    /// Create a table of `max_positions` rows of dimension `time_dim`.
    pub fn new(max_positions: usize, time_dim: usize) -> Self {
        let mut rng = rand::thread_rng();
        let uniform = Uniform::new(-1.0f32, 1.0);
        let table =
            Array2::from_shape_fn((max_positions, time_dim), |_| uniform.sample(&mut rng));
        Self { table }
    }

    /// Number of rows in the table.
    pub fn max_positions(&self) -> usize {
        self.table.shape()[0]
    }
}

impl TimeEncoder for PositionalEncoder {
    fn dim(&self) -> usize {
        self.table.shape()[1]
    }

    fn encode(&self, deltas: &[f64]) -> Result<Vec<Vec<f32>>> {
        deltas
            .iter()
            .map(|&dt| {
                let position = dt.max(0.0) as usize;
                if position >= self.max_positions() {
                    return Err(CoreError::IndexOutOfBounds {
                        what: "positional encoding table",
                        index: position,
                        size: self.max_positions(),
                    });
                }
                Ok(self.table.row(position).to_vec())
            })
            .collect()
    }
}

/// All-zero encoding of a fixed dimension (ablation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyEncoder {
    time_dim: usize,
}

impl EmptyEncoder {
    /// Create a zero encoder of the given output dimension.
    pub fn new(time_dim: usize) -> Self {
        Self { time_dim }
    }
}

impl TimeEncoder for EmptyEncoder {
    fn dim(&self) -> usize {
        self.time_dim
    }

    fn encode(&self, deltas: &[f64]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![0.0; self.time_dim]; deltas.len()])
    }
}

/// Time encoding variant selected by [`TimeEncodingKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TimeEncoding {
    /// Learned harmonic encoding.
    Harmonic(HarmonicEncoder),
    /// Bounded positional table.
    Positional(PositionalEncoder),
    /// All-zero encoding.
    Empty(EmptyEncoder),
}

impl TimeEncoding {
    /// Construct the variant named by the configuration.
    pub fn from_kind(kind: TimeEncodingKind, time_dim: usize) -> Self {
        match kind {
            TimeEncodingKind::Harmonic => Self::Harmonic(HarmonicEncoder::new(time_dim)),
            TimeEncodingKind::Positional { max_positions } => {
                Self::Positional(PositionalEncoder::new(max_positions, time_dim))
            }
            TimeEncodingKind::Empty => Self::Empty(EmptyEncoder::new(time_dim)),
        }
    }
}

impl TimeEncoder for TimeEncoding {
    fn dim(&self) -> usize {
        match self {
            Self::Harmonic(e) => e.dim(),
            Self::Positional(e) => e.dim(),
            Self::Empty(e) => e.dim(),
        }
    }

    fn encode(&self, deltas: &[f64]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::Harmonic(e) => e.encode(deltas),
            Self::Positional(e) => e.encode(deltas),
            Self::Empty(e) => e.encode(deltas),
        }
    }
}
