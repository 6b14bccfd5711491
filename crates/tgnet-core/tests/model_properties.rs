//! End-to-end properties of the temporal convolution engine.

use tgnet_core::{
    AggregatorKind, InteractionEvent, ModelConfig, NeighborBatch, Result, TemporalGraphNet,
    TemporalNeighborIndex, TemporalNeighborhood, TimeEncodingKind, NULL_NODE,
};

fn event(src: usize, dst: usize, edge_id: usize, time: f64) -> InteractionEvent {
    InteractionEvent {
        src,
        dst,
        edge_id,
        time,
    }
}

fn small_config(aggregator: AggregatorKind, num_layers: usize) -> ModelConfig {
    ModelConfig {
        node_dim: 8,
        time_dim: 8,
        num_layers,
        num_heads: 2,
        aggregator,
        ..Default::default()
    }
}

/// A=1, B=2, C=3: (A-B at t=1), (A-C at t=2).
fn three_node_index() -> TemporalNeighborIndex {
    TemporalNeighborIndex::from_events(4, &[event(1, 2, 0, 1.0), event(1, 3, 1, 2.0)]).unwrap()
}

/// Neighbor source that replays one fixed row for every query node, so the
/// order handed to the engine is controlled exactly.
struct FixedNeighborhood {
    node_ids: Vec<usize>,
    times: Vec<f64>,
}

impl TemporalNeighborhood for FixedNeighborhood {
    fn neighbors(&self, nodes: &[usize], _cutoffs: &[f64], k: usize) -> Result<NeighborBatch> {
        assert_eq!(k, self.node_ids.len());
        Ok(NeighborBatch {
            node_ids: vec![self.node_ids.clone(); nodes.len()],
            edge_ids: vec![vec![0; k]; nodes.len()],
            times: vec![self.times.clone(); nodes.len()],
        })
    }
}

#[test]
fn layer_zero_is_the_raw_embedding_regardless_of_time() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 2)).unwrap();
    let index = three_node_index();

    let at_three = model.represent(&index, &[1, 2, 3], &[3.0, 3.0, 3.0], 0, 2).unwrap();
    let at_nine = model.represent(&index, &[1, 2, 3], &[9.0, 0.0, 1e6], 0, 2).unwrap();

    for (node, (a, b)) in (1..4).zip(at_three.iter().zip(at_nine.iter())) {
        assert_eq!(a, b);
        assert_eq!(*a, model.raw_embedding(node).unwrap());
    }
}

#[test]
fn scenario_three_nodes_scores_finitely_with_and_without_padding() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 1)).unwrap();
    let index = three_node_index();

    // k=2 exactly matches A's two prior edges; k=5 right-pads three slots.
    let exact = model.represent(&index, &[1], &[3.0], 1, 2).unwrap();
    let padded = model.represent(&index, &[1], &[3.0], 1, 5).unwrap();

    assert_eq!(exact.len(), 1);
    assert_eq!(padded.len(), 1);
    assert!(exact[0].iter().all(|v| v.is_finite()));
    assert!(padded[0].iter().all(|v| v.is_finite()));

    let batch = index.neighbors(&[1], &[3.0], 5).unwrap();
    assert_eq!(batch.node_ids[0][..2], [3, 2]);
    assert!(batch.node_ids[0][2..].iter().all(|&n| n == NULL_NODE));
}

#[test]
fn node_without_history_takes_the_residual_path_not_nan() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 2)).unwrap();
    let index = three_node_index();

    // Node 2 has no edges before t=0.5, so every slot is padding at both
    // recursion levels.
    let reprs = model.represent(&index, &[2], &[0.5], 2, 3).unwrap();
    assert!(reprs[0].iter().all(|v| v.is_finite()));
}

#[test]
fn attention_representation_is_invariant_to_neighbor_order() {
    let model = TemporalGraphNet::new(6, small_config(AggregatorKind::Attention, 1)).unwrap();
    let forward = FixedNeighborhood {
        node_ids: vec![2, 3, 4],
        times: vec![3.0, 2.0, 1.0],
    };
    let reversed = FixedNeighborhood {
        node_ids: vec![4, 3, 2],
        times: vec![1.0, 2.0, 3.0],
    };

    let a = model.represent(&forward, &[1], &[4.0], 1, 3).unwrap();
    let b = model.represent(&reversed, &[1], &[4.0], 1, 3).unwrap();
    for (x, y) in a[0].iter().zip(b[0].iter()) {
        assert!((x - y).abs() < 1e-5);
    }
}

#[test]
fn mean_pool_representation_is_invariant_to_neighbor_order() {
    let model = TemporalGraphNet::new(6, small_config(AggregatorKind::Mean, 1)).unwrap();
    let forward = FixedNeighborhood {
        node_ids: vec![2, 3, 4],
        times: vec![3.0, 2.0, 1.0],
    };
    let reversed = FixedNeighborhood {
        node_ids: vec![4, 3, 2],
        times: vec![1.0, 2.0, 3.0],
    };

    let a = model.represent(&forward, &[1], &[4.0], 1, 3).unwrap();
    let b = model.represent(&reversed, &[1], &[4.0], 1, 3).unwrap();
    for (x, y) in a[0].iter().zip(b[0].iter()) {
        assert!((x - y).abs() < 1e-5);
    }
}

#[test]
fn recurrent_representation_depends_on_neighbor_order() {
    let model = TemporalGraphNet::new(6, small_config(AggregatorKind::Recurrent, 1)).unwrap();
    let forward = FixedNeighborhood {
        node_ids: vec![2, 3, 4],
        times: vec![3.0, 2.0, 1.0],
    };
    let reversed = FixedNeighborhood {
        node_ids: vec![4, 3, 2],
        times: vec![1.0, 2.0, 3.0],
    };

    let a = model.represent(&forward, &[1], &[4.0], 1, 3).unwrap();
    let b = model.represent(&reversed, &[1], &[4.0], 1, 3).unwrap();
    let diff: f32 = a[0]
        .iter()
        .zip(b[0].iter())
        .map(|(x, y)| (x - y).abs())
        .sum();
    assert!(diff > 1e-4, "recurrent pooling should be order-sensitive");
}

#[test]
fn contrast_probabilities_are_probabilities_and_match_logits() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 2)).unwrap();
    let index = three_node_index();

    let src = [1, 1];
    let dst = [2, 3];
    let background = [3, 2];
    let times = [3.0, 4.0];

    let (pos, neg) = model.contrast(&index, &src, &dst, &background, &times, 2).unwrap();
    let (pos_raw, neg_raw) = model
        .contrast_logits(&index, &src, &dst, &background, &times, 2)
        .unwrap();

    for (&p, &raw) in pos.iter().zip(pos_raw.iter()).chain(neg.iter().zip(neg_raw.iter())) {
        assert!((0.0..=1.0).contains(&p));
        let logit = (p / (1.0 - p)).ln();
        assert!(
            (logit - raw).abs() < 1e-3,
            "logit({p}) = {logit} should match raw score {raw}"
        );
    }
}

#[test]
fn score_agrees_with_contrast_logit_positive_side() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 1)).unwrap();
    let index = three_node_index();

    let scores = model.score(&index, &[1], &[2], &[3.0], 2).unwrap();
    let (pos, _) = model
        .contrast_logits(&index, &[1], &[2], &[3], &[3.0], 2)
        .unwrap();
    assert!((scores[0] - pos[0]).abs() < 1e-6);
}

#[test]
fn frozen_model_inference_is_deterministic() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 2)).unwrap();
    let index = three_node_index();

    let first = model.score(&index, &[1, 2], &[2, 3], &[3.0, 4.0], 3).unwrap();
    let second = model.score(&index, &[1, 2], &[2, 3], &[3.0, 4.0], 3).unwrap();
    assert_eq!(first, second);
}

#[test]
fn serialized_model_round_trips_bit_identically() {
    let model = TemporalGraphNet::new(4, small_config(AggregatorKind::Attention, 2)).unwrap();
    let index = three_node_index();

    let json = serde_json::to_string(&model).unwrap();
    let restored: TemporalGraphNet = serde_json::from_str(&json).unwrap();

    let original = model.score(&index, &[1], &[3], &[5.0], 2).unwrap();
    let replayed = restored.score(&index, &[1], &[3], &[5.0], 2).unwrap();
    assert_eq!(original, replayed);
}

#[test]
fn empty_time_encoding_still_scores() {
    let config = ModelConfig {
        time_encoding: TimeEncodingKind::Empty,
        ..small_config(AggregatorKind::Attention, 2)
    };
    let model = TemporalGraphNet::new(4, config).unwrap();
    let index = three_node_index();

    let scores = model.score(&index, &[1], &[2], &[3.0], 2).unwrap();
    assert!(scores[0].is_finite());
}

#[test]
fn positional_encoding_propagates_bounds_errors() {
    let config = ModelConfig {
        time_encoding: TimeEncodingKind::Positional { max_positions: 2 },
        ..small_config(AggregatorKind::Attention, 1)
    };
    let model = TemporalGraphNet::new(4, config).unwrap();
    let index = three_node_index();

    // Deltas at t=3 are 1 and 2; position 2 is past a 2-row table.
    assert!(model.score(&index, &[1], &[2], &[3.0], 2).is_err());
    // At t=2.5 the deltas are 0.5 and 1.5, both in range.
    assert!(model.score(&index, &[1], &[2], &[2.5], 2).is_ok());
}
