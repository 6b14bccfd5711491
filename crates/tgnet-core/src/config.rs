//! Model configuration types.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Neighbor aggregation strategy, fixed per layer instance at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregatorKind {
    /// Multi-head attention over time-augmented neighbor slots.
    Attention,
    /// Gated recurrent pooling over the neighbor sequence (order-sensitive).
    Recurrent,
    /// Plain average of neighbor representations.
    Mean,
}

/// Time encoding variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeEncodingKind {
    /// Learned harmonic encoding: `cos(dt * omega_j + phi_j)` per dimension.
    Harmonic,
    /// Learned lookup table over bounded integer positions.
    Positional {
        /// Number of rows in the table; positions at or past this fail.
        max_positions: usize,
    },
    /// All-zero encoding (ablation).
    Empty,
}

/// Top-level configuration for [`crate::model::TemporalGraphNet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Dimension of node embeddings and layer representations.
    pub node_dim: usize,
    /// Dimension of time encodings.
    pub time_dim: usize,
    /// Number of temporal convolution layers (recursion depth).
    pub num_layers: usize,
    /// Number of attention heads; `node_dim + time_dim` must divide evenly.
    pub num_heads: usize,
    /// Number of stacked attention blocks inside each attention aggregator.
    pub attention_depth: usize,
    /// Dropout rate in [0, 1], consumed by training integrations; inference
    /// is unaffected.
    pub dropout: f32,
    /// Neighbor aggregation strategy.
    pub aggregator: AggregatorKind,
    /// Time encoding variant.
    pub time_encoding: TimeEncodingKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            node_dim: 32,
            time_dim: 32,
            num_layers: 2,
            num_heads: 4,
            attention_depth: 1,
            dropout: 0.1,
            aggregator: AggregatorKind::Attention,
            time_encoding: TimeEncodingKind::Harmonic,
        }
    }
}

impl ModelConfig {
    /// Validate the configuration, failing fast on inconsistent choices.
    pub fn validate(&self) -> Result<()> {
        if self.node_dim == 0 {
            return Err(CoreError::Config("node_dim must be non-zero".into()));
        }
        if self.time_dim == 0 {
            return Err(CoreError::Config("time_dim must be non-zero".into()));
        }
        if self.num_layers == 0 {
            return Err(CoreError::Config(
                "num_layers must be at least 1".into(),
            ));
        }
        if self.num_heads == 0 {
            return Err(CoreError::Config("num_heads must be non-zero".into()));
        }
        if self.attention_depth == 0 {
            return Err(CoreError::Config(
                "attention_depth must be at least 1".into(),
            ));
        }
        let model_dim = self.node_dim + self.time_dim;
        if self.aggregator == AggregatorKind::Attention && model_dim % self.num_heads != 0 {
            return Err(CoreError::Config(format!(
                "node_dim + time_dim ({}) must be divisible by num_heads ({})",
                model_dim, self.num_heads
            )));
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(CoreError::Config(format!(
                "dropout must be in [0, 1], got {}",
                self.dropout
            )));
        }
        if let TimeEncodingKind::Positional { max_positions } = self.time_encoding {
            if max_positions == 0 {
                return Err(CoreError::Config(
                    "positional encoding requires max_positions >= 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// Dimension of the attention query/key vectors: `node_dim + time_dim`.
    pub fn model_dim(&self) -> usize {
        self.node_dim + self.time_dim
    }
}
