//! # tgnet-eval
//!
//! Ranking and binary classification metrics for temporal link prediction,
//! plus evaluation harnesses that consume `tgnet-core` affinity scores.
//!
//! - [`metrics`]: recall/NDCG/MRR/AUC and friends as pure slice math
//! - [`harness`]: per-user ranking evaluation and batched contrast evaluation

#![warn(missing_docs)]

pub mod harness;
pub mod metrics;

pub use harness::{
    evaluate_contrast, evaluate_ranking, ContrastReport, RankingConfig, RankingReport,
};
pub use metrics::{
    accuracy, average_precision, average_precision_score, binary_f1, dcg_at_k, f1_from, hit_at_k,
    mean_reciprocal_rank, ndcg_at_k, precision_at_k, rank_corrected, recall_at_k, roc_auc,
};
