//! # tgnet-core
//!
//! Temporal graph network for link prediction over time-stamped interaction
//! graphs. Node representations are computed by recursively aggregating
//! time-decayed neighborhood information through stacked attention layers;
//! pairs of representations are scored for likelihood of future interaction.
//!
//! - [`time`]: time delta encoders (harmonic, positional, empty)
//! - [`attention`]: masked multi-head attention over neighbor slots
//! - [`aggregate`]: neighbor aggregation strategies per layer
//! - [`neighbors`]: causally filtered temporal neighbor lookup
//! - [`model`]: the recursive temporal convolution engine and scoring API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tgnet_core::{
//!     InteractionEvent, ModelConfig, TemporalGraphNet, TemporalNeighborIndex,
//! };
//!
//! let events = load_events();
//! let index = TemporalNeighborIndex::from_events(num_nodes, &events)?;
//! let model = TemporalGraphNet::new(num_nodes, ModelConfig::default())?;
//!
//! // Probability that src interacts with dst rather than background at t.
//! let (pos, neg) = model.contrast(&index, &src, &dst, &background, &times, 20)?;
//! ```
//!
//! The crate never installs a global `tracing` subscriber or touches any
//! process-wide state; callers perform their own runtime setup once, before
//! constructing a model.

#![warn(missing_docs)]

pub mod aggregate;
pub mod attention;
pub mod config;
pub mod error;
pub mod linear;
pub mod model;
pub mod neighbors;
pub mod time;

pub use aggregate::Aggregator;
pub use attention::MultiHeadAttention;
pub use config::{AggregatorKind, ModelConfig, TimeEncodingKind};
pub use error::{CoreError, Result};
pub use linear::{Linear, MergeLayer};
pub use model::TemporalGraphNet;
pub use neighbors::{
    InteractionEvent, NeighborBatch, TemporalNeighborIndex, TemporalNeighborhood, NULL_NODE,
};
pub use time::{EmptyEncoder, HarmonicEncoder, PositionalEncoder, TimeEncoder, TimeEncoding};
