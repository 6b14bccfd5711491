//! Neighbor aggregation strategies.
//!
//! One aggregator instance per temporal convolution layer fuses a node's own
//! representation with its sampled neighbors' representations and time
//! encodings into one updated representation. Three variants share the
//! capability; the attention variant is the primary one.

use serde::{Deserialize, Serialize};

use crate::attention::MultiHeadAttention;
use crate::config::{AggregatorKind, ModelConfig};
use crate::error::{CoreError, Result};
use crate::linear::{sigmoid, Linear, MergeLayer};

/// Gated recurrent cell for sequential neighbor pooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GruCell {
    w_z: Linear,
    u_z: Linear,
    w_r: Linear,
    u_r: Linear,
    w_h: Linear,
    u_h: Linear,
}

impl GruCell {
    fn new(input_dim: usize, hidden_dim: usize) -> Self {
        Self {
            w_z: Linear::new(input_dim, hidden_dim),
            u_z: Linear::new(hidden_dim, hidden_dim),
            w_r: Linear::new(input_dim, hidden_dim),
            u_r: Linear::new(hidden_dim, hidden_dim),
            w_h: Linear::new(input_dim, hidden_dim),
            u_h: Linear::new(hidden_dim, hidden_dim),
        }
    }

    /// One update: `h_t = (1 - z) * h + z * tanh(W_h x + U_h (r * h))`.
    fn step(&self, input: &[f32], hidden: &[f32]) -> Vec<f32> {
        let z: Vec<f32> = self
            .w_z
            .forward(input)
            .iter()
            .zip(self.u_z.forward(hidden).iter())
            .map(|(a, b)| sigmoid(a + b))
            .collect();

        let r: Vec<f32> = self
            .w_r
            .forward(input)
            .iter()
            .zip(self.u_r.forward(hidden).iter())
            .map(|(a, b)| sigmoid(a + b))
            .collect();

        let r_hidden: Vec<f32> = r.iter().zip(hidden.iter()).map(|(a, b)| a * b).collect();
        let candidate: Vec<f32> = self
            .w_h
            .forward(input)
            .iter()
            .zip(self.u_h.forward(&r_hidden).iter())
            .map(|(a, b)| (a + b).tanh())
            .collect();

        z.iter()
            .zip(candidate.iter())
            .zip(hidden.iter())
            .map(|((&z_t, &h_tilde), &h)| (1.0 - z_t) * h + z_t * h_tilde)
            .collect()
    }
}

/// Attention-based aggregation: the query attends over time-augmented
/// neighbor slots, and the result is merged with the node's own
/// representation through a residual merge unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionAggregator {
    blocks: Vec<MultiHeadAttention>,
    merger: MergeLayer,
}

impl AttentionAggregator {
    fn new(node_dim: usize, time_dim: usize, num_heads: usize, depth: usize) -> Self {
        let model_dim = node_dim + time_dim;
        Self {
            blocks: (0..depth)
                .map(|_| MultiHeadAttention::new(model_dim, num_heads))
                .collect(),
            merger: MergeLayer::with_skip(model_dim, node_dim, node_dim, node_dim),
        }
    }

    fn aggregate(
        &self,
        self_repr: &[f32],
        self_time_emb: &[f32],
        neighbor_reprs: &[Vec<f32>],
        neighbor_time_embs: &[Vec<f32>],
        mask: &[bool],
    ) -> (Vec<f32>, Vec<f32>) {
        let kv: Vec<Vec<f32>> = neighbor_reprs
            .iter()
            .zip(neighbor_time_embs.iter())
            .map(|(repr, time_emb)| {
                let mut slot = Vec::with_capacity(repr.len() + time_emb.len());
                slot.extend_from_slice(repr);
                slot.extend_from_slice(time_emb);
                slot
            })
            .collect();

        let mut query = Vec::with_capacity(self_repr.len() + self_time_emb.len());
        query.extend_from_slice(self_repr);
        query.extend_from_slice(self_time_emb);

        let mut weights = vec![0.0; kv.len()];
        for block in &self.blocks {
            let (next, block_weights) = block.forward(&query, &kv, &kv, mask);
            query = next;
            weights = block_weights;
        }

        (self.merger.forward(&query, self_repr), weights)
    }
}

/// Recurrent pooling: the `[repr | time]` neighbor sequence is folded
/// through a gated recurrent cell; its final hidden state is the pooled
/// summary. Order-sensitive by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrentAggregator {
    cell: GruCell,
    merger: MergeLayer,
}

impl RecurrentAggregator {
    fn new(node_dim: usize, time_dim: usize) -> Self {
        Self {
            cell: GruCell::new(node_dim + time_dim, node_dim),
            merger: MergeLayer::with_skip(node_dim, node_dim, node_dim, node_dim),
        }
    }

    fn aggregate(
        &self,
        self_repr: &[f32],
        neighbor_reprs: &[Vec<f32>],
        neighbor_time_embs: &[Vec<f32>],
    ) -> (Vec<f32>, Vec<f32>) {
        let mut hidden = vec![0.0; self_repr.len()];
        for (repr, time_emb) in neighbor_reprs.iter().zip(neighbor_time_embs.iter()) {
            let mut input = Vec::with_capacity(repr.len() + time_emb.len());
            input.extend_from_slice(repr);
            input.extend_from_slice(time_emb);
            hidden = self.cell.step(&input, &hidden);
        }

        let weights = vec![0.0; neighbor_reprs.len()];
        (self.merger.forward(&hidden, self_repr), weights)
    }
}

/// Mean pooling: plain average of neighbor representations, ignoring time
/// encodings and the padding mask (simplified ablation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanAggregator {
    merger: MergeLayer,
}

impl MeanAggregator {
    fn new(node_dim: usize) -> Self {
        Self {
            merger: MergeLayer::with_skip(node_dim, node_dim, node_dim, node_dim),
        }
    }

    fn aggregate(&self, self_repr: &[f32], neighbor_reprs: &[Vec<f32>]) -> (Vec<f32>, Vec<f32>) {
        let num_slots = neighbor_reprs.len();
        let mut mean = vec![0.0; self_repr.len()];
        for repr in neighbor_reprs {
            for (m, &v) in mean.iter_mut().zip(repr.iter()) {
                *m += v;
            }
        }
        if num_slots > 0 {
            for m in mean.iter_mut() {
                *m /= num_slots as f32;
            }
        }

        let weights = vec![
            if num_slots > 0 {
                1.0 / num_slots as f32
            } else {
                0.0
            };
            num_slots
        ];
        (self.merger.forward(&mean, self_repr), weights)
    }
}

/// Neighbor aggregator variant, fixed per layer at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Aggregator {
    /// Multi-head attention over time-augmented slots.
    Attention(AttentionAggregator),
    /// Gated recurrent pooling over the neighbor sequence.
    Recurrent(RecurrentAggregator),
    /// Plain average of neighbor representations.
    Mean(MeanAggregator),
}

impl Aggregator {
    /// Construct the variant named by the configuration for one layer.
    pub fn from_config(config: &ModelConfig) -> Self {
        match config.aggregator {
            AggregatorKind::Attention => Self::Attention(AttentionAggregator::new(
                config.node_dim,
                config.time_dim,
                config.num_heads,
                config.attention_depth,
            )),
            AggregatorKind::Recurrent => {
                Self::Recurrent(RecurrentAggregator::new(config.node_dim, config.time_dim))
            }
            AggregatorKind::Mean => Self::Mean(MeanAggregator::new(config.node_dim)),
        }
    }

    /// Fuse a node's own representation with its sampled neighborhood.
    ///
    /// Returns the updated representation and one attention weight per
    /// neighbor slot (all zeros for variants without attention semantics).
    pub fn aggregate(
        &self,
        self_repr: &[f32],
        self_time_emb: &[f32],
        neighbor_reprs: &[Vec<f32>],
        neighbor_time_embs: &[Vec<f32>],
        mask: &[bool],
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        if neighbor_reprs.len() != neighbor_time_embs.len() {
            return Err(CoreError::DimensionMismatch {
                expected: neighbor_reprs.len(),
                actual: neighbor_time_embs.len(),
            });
        }
        if neighbor_reprs.len() != mask.len() {
            return Err(CoreError::DimensionMismatch {
                expected: neighbor_reprs.len(),
                actual: mask.len(),
            });
        }

        let (updated, weights) = match self {
            Self::Attention(agg) => agg.aggregate(
                self_repr,
                self_time_emb,
                neighbor_reprs,
                neighbor_time_embs,
                mask,
            ),
            Self::Recurrent(agg) => agg.aggregate(self_repr, neighbor_reprs, neighbor_time_embs),
            Self::Mean(agg) => agg.aggregate(self_repr, neighbor_reprs),
        };

        if updated.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::NumericalError(
                "aggregator produced a non-finite representation".into(),
            ));
        }
        Ok((updated, weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: AggregatorKind) -> ModelConfig {
        ModelConfig {
            node_dim: 8,
            time_dim: 8,
            num_heads: 2,
            aggregator: kind,
            ..Default::default()
        }
    }

    fn neighborhood(k: usize) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        let reprs = (0..k)
            .map(|i| (0..8).map(|j| ((i + j) as f32 * 0.3).cos()).collect())
            .collect();
        let times = (0..k)
            .map(|i| (0..8).map(|j| ((i * j) as f32 * 0.2).sin()).collect())
            .collect();
        (reprs, times)
    }

    #[test]
    fn all_masked_attention_equals_residual_only_path() {
        let agg = Aggregator::from_config(&config(AggregatorKind::Attention));
        let (reprs, times) = neighborhood(4);
        let self_repr = vec![0.5; 8];
        let self_time = vec![0.1; 8];

        let (out, weights) = agg
            .aggregate(&self_repr, &self_time, &reprs, &times, &[true; 4])
            .unwrap();

        assert!(out.iter().all(|v| v.is_finite()));
        assert!(weights.iter().all(|&w| w == 0.0));

        // Fully masked attention contributes a zero vector, so the result
        // must equal the merge of [zeros | self] plus the residual skip.
        if let Aggregator::Attention(inner) = &agg {
            let residual_only = inner.merger.forward(&vec![0.0; 16], &self_repr);
            for (a, b) in out.iter().zip(residual_only.iter()) {
                assert!((a - b).abs() < 1e-6);
            }
        } else {
            unreachable!();
        }
    }

    #[test]
    fn attention_is_invariant_to_neighbor_order() {
        let agg = Aggregator::from_config(&config(AggregatorKind::Attention));
        let (reprs, times) = neighborhood(3);
        let self_repr = vec![0.5; 8];
        let self_time = vec![0.1; 8];
        let mask = [false; 3];

        let (out, _) = agg
            .aggregate(&self_repr, &self_time, &reprs, &times, &mask)
            .unwrap();

        let reprs_rev: Vec<_> = reprs.iter().rev().cloned().collect();
        let times_rev: Vec<_> = times.iter().rev().cloned().collect();
        let (out_rev, _) = agg
            .aggregate(&self_repr, &self_time, &reprs_rev, &times_rev, &mask)
            .unwrap();

        for (a, b) in out.iter().zip(out_rev.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn recurrent_is_sensitive_to_neighbor_order() {
        let agg = Aggregator::from_config(&config(AggregatorKind::Recurrent));
        let (reprs, times) = neighborhood(3);
        let self_repr = vec![0.5; 8];
        let self_time = vec![0.1; 8];
        let mask = [false; 3];

        let (out, _) = agg
            .aggregate(&self_repr, &self_time, &reprs, &times, &mask)
            .unwrap();

        let reprs_rev: Vec<_> = reprs.iter().rev().cloned().collect();
        let times_rev: Vec<_> = times.iter().rev().cloned().collect();
        let (out_rev, _) = agg
            .aggregate(&self_repr, &self_time, &reprs_rev, &times_rev, &mask)
            .unwrap();

        let diff: f32 = out
            .iter()
            .zip(out_rev.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 1e-4, "recurrent pooling should depend on order");
    }

    #[test]
    fn mean_is_invariant_to_neighbor_order() {
        let agg = Aggregator::from_config(&config(AggregatorKind::Mean));
        let (reprs, times) = neighborhood(5);
        let self_repr = vec![0.5; 8];
        let self_time = vec![0.1; 8];
        let mask = [false; 5];

        let (out, weights) = agg
            .aggregate(&self_repr, &self_time, &reprs, &times, &mask)
            .unwrap();
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let reprs_rev: Vec<_> = reprs.iter().rev().cloned().collect();
        let times_rev: Vec<_> = times.iter().rev().cloned().collect();
        let (out_rev, _) = agg
            .aggregate(&self_repr, &self_time, &reprs_rev, &times_rev, &mask)
            .unwrap();

        for (a, b) in out.iter().zip(out_rev.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn mismatched_mask_length_is_an_error() {
        let agg = Aggregator::from_config(&config(AggregatorKind::Attention));
        let (reprs, times) = neighborhood(3);
        let err = agg
            .aggregate(&vec![0.5; 8], &vec![0.1; 8], &reprs, &times, &[false; 2])
            .unwrap_err();
        assert!(matches!(err, CoreError::DimensionMismatch { .. }));
    }
}
