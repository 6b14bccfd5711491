//! Temporal neighbor lookup.
//!
//! The engine consumes neighborhoods through the [`TemporalNeighborhood`]
//! trait; [`TemporalNeighborIndex`] is the bundled implementation backed by
//! per-node adjacency lists sorted by timestamp.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Reserved node index used for padding slots.
pub const NULL_NODE: usize = 0;

/// A single time-stamped interaction between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Source node index.
    pub src: usize,
    /// Destination node index.
    pub dst: usize,
    /// Opaque edge identifier.
    pub edge_id: usize,
    /// Interaction timestamp.
    pub time: f64,
}

/// A batch of sampled temporal neighborhoods.
///
/// All three arrays have shape B x K. Rows are most-recent-first and
/// right-padded with ([`NULL_NODE`], edge 0, time 0.0) when fewer than K
/// neighbors exist before the cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborBatch {
    /// Neighbor node indices per query node.
    pub node_ids: Vec<Vec<usize>>,
    /// Edge identifiers per slot.
    pub edge_ids: Vec<Vec<usize>>,
    /// Edge timestamps per slot.
    pub times: Vec<Vec<f64>>,
}

impl NeighborBatch {
    /// Number of query rows.
    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}

/// Capability the engine requires from a neighbor index: causally filtered,
/// fixed-width neighborhood lookup as-of a per-node cutoff time.
pub trait TemporalNeighborhood {
    /// Up to `k` neighbors of each node with edge time at or before the
    /// node's cutoff.
    fn neighbors(&self, nodes: &[usize], cutoffs: &[f64], k: usize) -> Result<NeighborBatch>;
}

/// Adjacency entry: (neighbor, edge id, time), kept sorted by time.
type Adjacency = Vec<(usize, usize, f64)>;

/// Temporal neighbor index over undirected interaction events.
///
/// Neighbor rows are most-recent-first; ties on timestamp break toward the
/// higher edge id. This ordering is a contract of this index that
/// order-sensitive aggregators inherit; the engine itself never assumes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalNeighborIndex {
    adjacency: Vec<Adjacency>,
}

impl TemporalNeighborIndex {
    /// Build an index over `num_nodes` nodes from an event list. Each event
    /// is inserted in both directions. Node index 0 is reserved for padding
    /// and must not appear in events.
    pub fn from_events(num_nodes: usize, events: &[InteractionEvent]) -> Result<Self> {
        let mut adjacency: Vec<Adjacency> = vec![Vec::new(); num_nodes];
        for event in events {
            if event.src == NULL_NODE || event.dst == NULL_NODE {
                return Err(CoreError::Config(format!(
                    "node index {} is reserved for padding",
                    NULL_NODE
                )));
            }
            for (node, other) in [(event.src, event.dst), (event.dst, event.src)] {
                if node >= num_nodes {
                    return Err(CoreError::IndexOutOfBounds {
                        what: "neighbor index",
                        index: node,
                        size: num_nodes,
                    });
                }
                adjacency[node].push((other, event.edge_id, event.time));
            }
        }
        for list in adjacency.iter_mut() {
            list.sort_by(|a, b| {
                a.2.partial_cmp(&b.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
        }
        Ok(Self { adjacency })
    }

    /// Number of nodes covered by the index.
    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Degree of one node (over all time).
    pub fn degree(&self, node: usize) -> usize {
        self.adjacency.get(node).map_or(0, Vec::len)
    }
}

impl TemporalNeighborhood for TemporalNeighborIndex {
    fn neighbors(&self, nodes: &[usize], cutoffs: &[f64], k: usize) -> Result<NeighborBatch> {
        if nodes.len() != cutoffs.len() {
            return Err(CoreError::DimensionMismatch {
                expected: nodes.len(),
                actual: cutoffs.len(),
            });
        }
        if k == 0 {
            return Err(CoreError::Config(
                "neighbor width k must be at least 1".into(),
            ));
        }

        let mut node_ids = Vec::with_capacity(nodes.len());
        let mut edge_ids = Vec::with_capacity(nodes.len());
        let mut times = Vec::with_capacity(nodes.len());

        for (&node, &cutoff) in nodes.iter().zip(cutoffs.iter()) {
            let list = self.adjacency.get(node).ok_or(CoreError::IndexOutOfBounds {
                what: "neighbor index",
                index: node,
                size: self.adjacency.len(),
            })?;

            // Eligible prefix: edges with time <= cutoff.
            let end = list.partition_point(|&(_, _, t)| t <= cutoff);
            let start = end.saturating_sub(k);

            let mut row_nodes = Vec::with_capacity(k);
            let mut row_edges = Vec::with_capacity(k);
            let mut row_times = Vec::with_capacity(k);
            for &(neighbor, edge_id, time) in list[start..end].iter().rev() {
                row_nodes.push(neighbor);
                row_edges.push(edge_id);
                row_times.push(time);
            }
            row_nodes.resize(k, NULL_NODE);
            row_edges.resize(k, 0);
            row_times.resize(k, 0.0);

            node_ids.push(row_nodes);
            edge_ids.push(row_edges);
            times.push(row_times);
        }

        Ok(NeighborBatch {
            node_ids,
            edge_ids,
            times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(src: usize, dst: usize, edge_id: usize, time: f64) -> InteractionEvent {
        InteractionEvent {
            src,
            dst,
            edge_id,
            time,
        }
    }

    fn three_node_index() -> TemporalNeighborIndex {
        // A=1, B=2, C=3: (A-B at t=1), (A-C at t=2).
        TemporalNeighborIndex::from_events(4, &[event(1, 2, 0, 1.0), event(1, 3, 1, 2.0)]).unwrap()
    }

    #[test]
    fn most_recent_first_without_padding() {
        let index = three_node_index();
        let batch = index.neighbors(&[1], &[3.0], 2).unwrap();
        assert_eq!(batch.node_ids, vec![vec![3, 2]]);
        assert_eq!(batch.times, vec![vec![2.0, 1.0]]);
    }

    #[test]
    fn right_pads_with_null_when_short() {
        let index = three_node_index();
        let batch = index.neighbors(&[1], &[3.0], 5).unwrap();
        assert_eq!(batch.node_ids, vec![vec![3, 2, NULL_NODE, NULL_NODE, NULL_NODE]]);
        assert_eq!(batch.times, vec![vec![2.0, 1.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn cutoff_is_inclusive_and_causal() {
        let index = three_node_index();
        // At t=1.5 only the t=1 edge is eligible.
        let batch = index.neighbors(&[1], &[1.5], 2).unwrap();
        assert_eq!(batch.node_ids[0], vec![2, NULL_NODE]);

        // Exactly at t=2 the t=2 edge is included.
        let batch = index.neighbors(&[1], &[2.0], 2).unwrap();
        assert_eq!(batch.node_ids[0], vec![3, 2]);

        // Before any edge: all padding.
        let batch = index.neighbors(&[1], &[0.5], 2).unwrap();
        assert_eq!(batch.node_ids[0], vec![NULL_NODE, NULL_NODE]);
    }

    #[test]
    fn takes_k_most_recent_when_degree_exceeds_k() {
        let events: Vec<InteractionEvent> =
            (0..6).map(|i| event(1, 2 + i, i, i as f64)).collect();
        let index = TemporalNeighborIndex::from_events(8, &events).unwrap();
        let batch = index.neighbors(&[1], &[10.0], 3).unwrap();
        assert_eq!(batch.node_ids[0], vec![7, 6, 5]);
        assert_eq!(batch.times[0], vec![5.0, 4.0, 3.0]);
    }

    #[test]
    fn events_are_indexed_in_both_directions() {
        let index = three_node_index();
        let batch = index.neighbors(&[2], &[5.0], 2).unwrap();
        assert_eq!(batch.node_ids[0], vec![1, NULL_NODE]);
    }

    #[test]
    fn null_node_has_empty_neighborhood() {
        let index = three_node_index();
        let batch = index.neighbors(&[NULL_NODE], &[10.0], 3).unwrap();
        assert!(batch.node_ids[0].iter().all(|&n| n == NULL_NODE));
    }

    #[test]
    fn rejects_events_touching_the_null_node() {
        let err = TemporalNeighborIndex::from_events(3, &[event(0, 1, 0, 1.0)]).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn rejects_out_of_range_nodes() {
        let index = three_node_index();
        let err = index.neighbors(&[99], &[1.0], 2).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfBounds { .. }));
    }

    #[test]
    fn mismatched_batch_lengths_are_an_error() {
        let index = three_node_index();
        let err = index.neighbors(&[1, 2], &[1.0], 2).unwrap_err();
        assert!(matches!(err, CoreError::DimensionMismatch { .. }));
    }
}
