//! Temporal convolution engine and pairwise affinity scoring.
//!
//! A node's representation at layer L is computed by recursively computing
//! its own and its sampled temporal neighbors' representations at layer L-1,
//! then fusing them through the layer's aggregator. Layer 0 is the raw
//! embedding. The recursion multiplies the batch by the neighbor width K at
//! every level, so one query costs O(K^L) aggregations; callers pick L and K
//! with that in mind.

use ndarray::Array2;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::Aggregator;
use crate::config::{AggregatorKind, ModelConfig, TimeEncodingKind};
use crate::error::{CoreError, Result};
use crate::linear::{sigmoid, MergeLayer};
use crate::neighbors::{TemporalNeighborhood, NULL_NODE};
use crate::time::{TimeEncoder, TimeEncoding};

/// Temporal graph network scoring pairs of nodes for future interaction.
///
/// Owns the learned state: the node embedding table, the time encoder, one
/// independently parameterized aggregator per layer, and the affinity head.
/// The temporal neighbor index is a read-only collaborator passed into each
/// call, so one frozen model can serve concurrent callers that each bring
/// their own batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalGraphNet {
    config: ModelConfig,
    embeddings: Array2<f32>,
    time_encoder: TimeEncoding,
    aggregators: Vec<Aggregator>,
    affinity: MergeLayer,
    null_idx: usize,
}

impl TemporalGraphNet {
    /// Create a model over `num_nodes` nodes (index 0 is the reserved
    /// padding node). Fails fast on an inconsistent configuration.
    pub fn new(num_nodes: usize, config: ModelConfig) -> Result<Self> {
        config.validate()?;
        if num_nodes < 2 {
            return Err(CoreError::Config(
                "num_nodes must cover the reserved null node and at least one real node".into(),
            ));
        }

        match config.aggregator {
            AggregatorKind::Attention => info!("aggregation uses attention model"),
            AggregatorKind::Recurrent => info!("aggregation uses recurrent pooling model"),
            AggregatorKind::Mean => info!("aggregation uses constant mean model"),
        }
        match config.time_encoding {
            TimeEncodingKind::Harmonic => info!("using harmonic time encoding"),
            TimeEncodingKind::Positional { max_positions } => {
                info!(max_positions, "using positional time encoding")
            }
            TimeEncodingKind::Empty => info!("using empty time encoding"),
        }

        let mut rng = rand::thread_rng();
        let uniform = Uniform::new(-1.0f32, 1.0);
        let embeddings =
            Array2::from_shape_fn((num_nodes, config.node_dim), |_| uniform.sample(&mut rng));

        let time_encoder = TimeEncoding::from_kind(config.time_encoding, config.time_dim);
        let aggregators = (0..config.num_layers)
            .map(|_| Aggregator::from_config(&config))
            .collect();
        let affinity = MergeLayer::new(config.node_dim, config.node_dim, config.node_dim, 1);

        Ok(Self {
            config,
            embeddings,
            time_encoder,
            aggregators,
            affinity,
            null_idx: NULL_NODE,
        })
    }

    /// The model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Number of nodes in the embedding table.
    pub fn num_nodes(&self) -> usize {
        self.embeddings.nrows()
    }

    /// Raw embedding lookup for one node.
    pub fn raw_embedding(&self, node: usize) -> Result<Vec<f32>> {
        if node >= self.embeddings.nrows() {
            return Err(CoreError::IndexOutOfBounds {
                what: "embedding table",
                index: node,
                size: self.embeddings.nrows(),
            });
        }
        Ok(self.embeddings.row(node).to_vec())
    }

    /// Mutable access to the embedding table for training integrations.
    pub fn embeddings_mut(&mut self) -> &mut Array2<f32> {
        &mut self.embeddings
    }

    /// Compute layer-`layer` representations for a batch of (node, cutoff
    /// time) queries, sampling up to `k` temporal neighbors per hop.
    ///
    /// Layer 0 returns raw embeddings and ignores the times. Higher layers
    /// recurse: each neighbor's representation is computed at the previous
    /// layer with the neighbor's own edge time as its cutoff, so no edge
    /// after a query's cutoff ever contributes.
    pub fn represent<N>(
        &self,
        index: &N,
        nodes: &[usize],
        times: &[f64],
        layer: usize,
        k: usize,
    ) -> Result<Vec<Vec<f32>>>
    where
        N: TemporalNeighborhood + ?Sized,
    {
        if nodes.len() != times.len() {
            return Err(CoreError::DimensionMismatch {
                expected: nodes.len(),
                actual: times.len(),
            });
        }
        if layer > self.config.num_layers {
            return Err(CoreError::Config(format!(
                "layer {} exceeds the configured {} layers",
                layer, self.config.num_layers
            )));
        }
        if k == 0 {
            return Err(CoreError::Config(
                "neighbor width k must be at least 1".into(),
            ));
        }
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        if layer == 0 {
            return nodes.iter().map(|&n| self.raw_embedding(n)).collect();
        }

        let batch_size = nodes.len();
        let own_reprs = self.represent(index, nodes, times, layer - 1, k)?;

        let batch = index.neighbors(nodes, times, k)?;
        if batch.len() != batch_size {
            return Err(CoreError::DimensionMismatch {
                expected: batch_size,
                actual: batch.len(),
            });
        }

        // Flatten the B x K neighborhood into one batch for the recursive
        // call; each neighbor is queried at its own edge time.
        let mut flat_nodes = Vec::with_capacity(batch_size * k);
        let mut flat_times = Vec::with_capacity(batch_size * k);
        let mut flat_deltas = Vec::with_capacity(batch_size * k);
        for i in 0..batch_size {
            let (row_nodes, row_times) = (&batch.node_ids[i], &batch.times[i]);
            if row_nodes.len() != k || row_times.len() != k {
                return Err(CoreError::DimensionMismatch {
                    expected: k,
                    actual: row_nodes.len().min(row_times.len()),
                });
            }
            for j in 0..k {
                flat_nodes.push(row_nodes[j]);
                flat_times.push(row_times[j]);
                // Padding slots sit at delta zero; they are masked out of
                // attention either way.
                let delta = if row_nodes[j] == self.null_idx {
                    0.0
                } else {
                    times[i] - row_times[j]
                };
                flat_deltas.push(delta);
            }
        }

        let neighbor_reprs = self.represent(index, &flat_nodes, &flat_times, layer - 1, k)?;
        let neighbor_time_embs = self.time_encoder.encode(&flat_deltas)?;
        // The query node is "at" its own cutoff: delta zero.
        let self_time_embs = self.time_encoder.encode(&vec![0.0; batch_size])?;

        let aggregator = &self.aggregators[layer - 1];
        let mut updated = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let slots = i * k..(i + 1) * k;
            let mask: Vec<bool> = batch.node_ids[i]
                .iter()
                .map(|&n| n == self.null_idx)
                .collect();
            let (repr, _weights) = aggregator.aggregate(
                &own_reprs[i],
                &self_time_embs[i],
                &neighbor_reprs[slots.clone()],
                &neighbor_time_embs[slots],
                &mask,
            )?;
            updated.push(repr);
        }
        Ok(updated)
    }

    /// Raw affinity score per (source, destination) pair as-of each pair's
    /// query time.
    pub fn score<N>(
        &self,
        index: &N,
        src: &[usize],
        dst: &[usize],
        times: &[f64],
        k: usize,
    ) -> Result<Vec<f32>>
    where
        N: TemporalNeighborhood + ?Sized,
    {
        if src.len() != dst.len() {
            return Err(CoreError::DimensionMismatch {
                expected: src.len(),
                actual: dst.len(),
            });
        }
        debug!(pairs = src.len(), k, "scoring node pairs");

        let depth = self.config.num_layers;
        let src_reprs = self.represent(index, src, times, depth, k)?;
        let dst_reprs = self.represent(index, dst, times, depth, k)?;

        Ok(src_reprs
            .iter()
            .zip(dst_reprs.iter())
            .map(|(s, d)| self.affinity.forward(s, d)[0])
            .collect())
    }

    /// Contrastive probabilities: sigmoid-squashed affinity of each source
    /// against its positive destination and its background (negative) node.
    pub fn contrast<N>(
        &self,
        index: &N,
        src: &[usize],
        dst: &[usize],
        background: &[usize],
        times: &[f64],
        k: usize,
    ) -> Result<(Vec<f32>, Vec<f32>)>
    where
        N: TemporalNeighborhood + ?Sized,
    {
        let (pos, neg) = self.contrast_logits(index, src, dst, background, times, k)?;
        Ok((
            pos.into_iter().map(sigmoid).collect(),
            neg.into_iter().map(sigmoid).collect(),
        ))
    }

    /// Contrastive raw scores, for losses that apply their own squashing.
    pub fn contrast_logits<N>(
        &self,
        index: &N,
        src: &[usize],
        dst: &[usize],
        background: &[usize],
        times: &[f64],
        k: usize,
    ) -> Result<(Vec<f32>, Vec<f32>)>
    where
        N: TemporalNeighborhood + ?Sized,
    {
        if src.len() != dst.len() || src.len() != background.len() {
            return Err(CoreError::DimensionMismatch {
                expected: src.len(),
                actual: dst.len().min(background.len()),
            });
        }

        let depth = self.config.num_layers;
        let src_reprs = self.represent(index, src, times, depth, k)?;
        let dst_reprs = self.represent(index, dst, times, depth, k)?;
        let bg_reprs = self.represent(index, background, times, depth, k)?;

        let pos = src_reprs
            .iter()
            .zip(dst_reprs.iter())
            .map(|(s, d)| self.affinity.forward(s, d)[0])
            .collect();
        let neg = src_reprs
            .iter()
            .zip(bg_reprs.iter())
            .map(|(s, b)| self.affinity.forward(s, b)[0])
            .collect();
        Ok((pos, neg))
    }
}
