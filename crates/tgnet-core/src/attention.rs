//! Masked multi-head scaled-dot-product attention over neighbor slots.

use serde::{Deserialize, Serialize};

use crate::linear::Linear;

/// Additive bias applied to masked slots before softmax. Large enough that
/// masked slots underflow to zero weight after the max-subtracted exp.
const MASK_BIAS: f32 = -1e9;

/// Multi-head attention of one query over a fixed number of key/value slots.
///
/// Padding slots are excluded by adding a large negative bias to their
/// scores before softmax, so masked slots are numerically unreachable rather
/// than merely down-weighted. A row whose every slot is masked yields an
/// all-zero output vector and all-zero weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiHeadAttention {
    num_heads: usize,
    head_dim: usize,
    q_linear: Linear,
    k_linear: Linear,
    v_linear: Linear,
    out_linear: Linear,
}

impl MultiHeadAttention {
    /// Create a new multi-head attention block.
    pub fn new(embed_dim: usize, num_heads: usize) -> Self {
        assert!(
            embed_dim % num_heads == 0,
            "embedding dimension must be divisible by number of heads"
        );
        let head_dim = embed_dim / num_heads;

        Self {
            num_heads,
            head_dim,
            q_linear: Linear::new(embed_dim, embed_dim),
            k_linear: Linear::new(embed_dim, embed_dim),
            v_linear: Linear::new(embed_dim, embed_dim),
            out_linear: Linear::new(embed_dim, embed_dim),
        }
    }

    /// Embedding dimension of the block.
    pub fn embed_dim(&self) -> usize {
        self.num_heads * self.head_dim
    }

    /// Attend `query` over `keys`/`values`, skipping slots where `mask` is
    /// true. Returns the projected output and the attention weights averaged
    /// over heads (one weight per slot, zero on masked slots).
    pub fn forward(
        &self,
        query: &[f32],
        keys: &[Vec<f32>],
        values: &[Vec<f32>],
        mask: &[bool],
    ) -> (Vec<f32>, Vec<f32>) {
        let num_slots = keys.len();
        if num_slots == 0 || mask.iter().all(|&m| m) {
            return (vec![0.0; self.embed_dim()], vec![0.0; num_slots]);
        }

        let q = self.q_linear.forward(query);
        let k: Vec<Vec<f32>> = keys.iter().map(|key| self.k_linear.forward(key)).collect();
        let v: Vec<Vec<f32>> = values
            .iter()
            .map(|value| self.v_linear.forward(value))
            .collect();

        let scale = (self.head_dim as f32).sqrt();
        let mut concat = Vec::with_capacity(self.embed_dim());
        let mut mean_weights = vec![0.0; num_slots];

        for h in 0..self.num_heads {
            let start = h * self.head_dim;
            let end = start + self.head_dim;
            let q_h = &q[start..end];

            // Scaled dot-product scores with the additive padding bias.
            let scores: Vec<f32> = k
                .iter()
                .zip(mask.iter())
                .map(|(k_slot, &masked)| {
                    let dot: f32 = q_h
                        .iter()
                        .zip(k_slot[start..end].iter())
                        .map(|(a, b)| a * b)
                        .sum();
                    let bias = if masked { MASK_BIAS } else { 0.0 };
                    dot / scale + bias
                })
                .collect();

            let max_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exp_scores: Vec<f32> = scores.iter().map(|&s| (s - max_score).exp()).collect();
            let sum_exp: f32 = exp_scores.iter().sum::<f32>().max(1e-10);

            let mut head_out = vec![0.0; self.head_dim];
            for ((&e, v_slot), weight_acc) in exp_scores
                .iter()
                .zip(v.iter())
                .zip(mean_weights.iter_mut())
            {
                let weight = e / sum_exp;
                *weight_acc += weight / self.num_heads as f32;
                for (out, &val) in head_out.iter_mut().zip(v_slot[start..end].iter()) {
                    *out += weight * val;
                }
            }
            concat.extend_from_slice(&head_out);
        }

        (self.out_linear.forward(&concat), mean_weights)
    }
}
