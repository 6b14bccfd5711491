//! Evaluation harnesses over a frozen model.
//!
//! Two consumers of the core's pairwise scores: per-user ranking evaluation
//! against candidate items, and batched binary evaluation of contrastive
//! positive/negative probabilities. Scoring runs on the calling thread; the
//! per-user metric reduction fans out with rayon.

use std::collections::{BTreeSet, HashMap, HashSet};

use rand::seq::index::sample;
use rayon::prelude::*;

use tgnet_core::{CoreError, Result, TemporalGraphNet, TemporalNeighborhood};

use crate::metrics::{
    accuracy, average_precision_score, binary_f1, mean_reciprocal_rank, ndcg_at_k, rank_corrected,
    recall_at_k, roc_auc,
};

/// Settings for per-user ranking evaluation.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Ranking cutoffs; metrics are reported per cutoff.
    pub cutoffs: Vec<usize>,
    /// Number of negative candidates to sample per user; `None` scores every
    /// candidate.
    pub sampled_negatives: Option<usize>,
    /// Temporal neighbor width for model calls.
    pub neighbor_width: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            cutoffs: vec![10, 20],
            sampled_negatives: None,
            neighbor_width: 20,
        }
    }
}

/// Aggregated ranking metrics, one entry per configured cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingReport {
    /// Recall at each cutoff.
    pub recall: Vec<f32>,
    /// NDCG at each cutoff.
    pub ndcg: Vec<f32>,
    /// Mean reciprocal rank.
    pub mrr: f32,
    /// Number of test interactions that were evaluated.
    pub num_evaluated: usize,
}

/// Scores of one user's candidate list; the positive item sits at index 0.
struct UserPredictions {
    scores: Vec<f32>,
    num_candidates: usize,
}

/// Rank every eligible test interaction's positive destination against
/// candidate destinations seen during training.
///
/// A test interaction (src, dst, t) is eligible when the source was seen in
/// training and the destination is a training item. Candidates exclude the
/// positive itself and every item the source already interacted with. When
/// `sampled_negatives` is set, hit positions are projected back onto the
/// full candidate list before computing metrics.
pub fn evaluate_ranking<N>(
    model: &TemporalGraphNet,
    index: &N,
    test_src: &[usize],
    test_dst: &[usize],
    test_times: &[f64],
    train_src: &[usize],
    train_dst: &[usize],
    config: &RankingConfig,
) -> Result<RankingReport>
where
    N: TemporalNeighborhood + ?Sized,
{
    if test_src.len() != test_dst.len() || test_src.len() != test_times.len() {
        return Err(CoreError::DimensionMismatch {
            expected: test_src.len(),
            actual: test_dst.len().min(test_times.len()),
        });
    }
    if config.cutoffs.is_empty() {
        return Err(CoreError::Config(
            "ranking evaluation needs at least one cutoff".into(),
        ));
    }

    let train_users: HashSet<usize> = train_src.iter().copied().collect();
    let train_items: BTreeSet<usize> = train_dst.iter().copied().collect();
    let mut interacted: HashMap<usize, HashSet<usize>> = HashMap::new();
    for (&u, &i) in train_src.iter().zip(train_dst.iter()) {
        interacted.entry(u).or_default().insert(i);
    }

    let max_cutoff = config.cutoffs.iter().copied().max().unwrap_or(1);
    let mut rng = rand::thread_rng();
    let mut predictions = Vec::new();

    for ((&u, &i), &t) in test_src.iter().zip(test_dst.iter()).zip(test_times.iter()) {
        if !train_users.contains(&u) || !train_items.contains(&i) {
            continue;
        }
        let seen = interacted.get(&u);
        let candidates: Vec<usize> = train_items
            .iter()
            .copied()
            .filter(|item| *item != i && seen.map_or(true, |s| !s.contains(item)))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let negatives: Vec<usize> = match config.sampled_negatives {
            Some(size) if size < candidates.len() => sample(&mut rng, candidates.len(), size)
                .iter()
                .map(|j| candidates[j])
                .collect(),
            _ => candidates.clone(),
        };

        let mut items = Vec::with_capacity(1 + negatives.len());
        items.push(i);
        items.extend_from_slice(&negatives);
        let users = vec![u; items.len()];
        let times = vec![t; items.len()];

        let scores = model.score(index, &users, &items, &times, config.neighbor_width)?;
        predictions.push(UserPredictions {
            scores,
            num_candidates: 1 + candidates.len(),
        });
    }

    let sampled = config.sampled_negatives.is_some();
    let per_user: Vec<(Vec<f32>, Vec<f32>, f32)> = predictions
        .par_iter()
        .map(|prediction| {
            let relevance = ranked_relevance(prediction, max_cutoff, sampled);
            let recall: Vec<f32> = config
                .cutoffs
                .iter()
                .map(|&k| recall_at_k(&relevance, k, 1))
                .collect();
            let ndcg: Vec<f32> = config
                .cutoffs
                .iter()
                .map(|&k| ndcg_at_k(&relevance, k))
                .collect();
            (recall, ndcg, mean_reciprocal_rank(&relevance))
        })
        .collect();

    let num_evaluated = per_user.len();
    let mut report = RankingReport {
        recall: vec![0.0; config.cutoffs.len()],
        ndcg: vec![0.0; config.cutoffs.len()],
        mrr: 0.0,
        num_evaluated,
    };
    for (recall, ndcg, mrr) in &per_user {
        for (acc, v) in report.recall.iter_mut().zip(recall.iter()) {
            *acc += v;
        }
        for (acc, v) in report.ndcg.iter_mut().zip(ndcg.iter()) {
            *acc += v;
        }
        report.mrr += mrr;
    }
    if num_evaluated > 0 {
        let n = num_evaluated as f32;
        report.recall.iter_mut().for_each(|v| *v /= n);
        report.ndcg.iter_mut().for_each(|v| *v /= n);
        report.mrr /= n;
    }
    Ok(report)
}

/// Binary relevance of the top `max_cutoff` ranked items (index 0 is the
/// positive), with sampled rankings projected onto the full candidate list.
fn ranked_relevance(prediction: &UserPredictions, max_cutoff: usize, sampled: bool) -> Vec<f32> {
    let mut order: Vec<usize> = (0..prediction.scores.len()).collect();
    order.sort_by(|&a, &b| {
        prediction.scores[b]
            .partial_cmp(&prediction.scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let relevance: Vec<f32> = order
        .iter()
        .take(max_cutoff)
        .map(|&idx| if idx == 0 { 1.0 } else { 0.0 })
        .collect();

    if sampled {
        rank_corrected(&relevance, prediction.scores.len(), prediction.num_candidates)
    } else {
        relevance
    }
}

/// Aggregated binary contrast metrics, averaged over evaluation batches.
#[derive(Debug, Clone, PartialEq)]
pub struct ContrastReport {
    /// Fraction of probabilities on the right side of 0.5.
    pub accuracy: f32,
    /// Area under the precision-recall curve.
    pub average_precision: f32,
    /// F1 of the positive class at the 0.5 threshold.
    pub f1: f32,
    /// Area under the ROC curve.
    pub auc: f32,
    /// Number of batches evaluated.
    pub num_batches: usize,
}

/// Evaluate contrastive probabilities over chronological test batches.
///
/// Each batch scores its positive destinations against caller-provided
/// background nodes; positives are labeled true, backgrounds false, and
/// probabilities are thresholded at 0.5 for accuracy and F1.
pub fn evaluate_contrast<N>(
    model: &TemporalGraphNet,
    index: &N,
    src: &[usize],
    dst: &[usize],
    background: &[usize],
    times: &[f64],
    neighbor_width: usize,
    batch_size: usize,
) -> Result<ContrastReport>
where
    N: TemporalNeighborhood + ?Sized,
{
    if src.len() != dst.len() || src.len() != background.len() || src.len() != times.len() {
        return Err(CoreError::DimensionMismatch {
            expected: src.len(),
            actual: dst.len().min(background.len()).min(times.len()),
        });
    }
    if batch_size == 0 {
        return Err(CoreError::Config("batch_size must be at least 1".into()));
    }

    let mut report = ContrastReport {
        accuracy: 0.0,
        average_precision: 0.0,
        f1: 0.0,
        auc: 0.0,
        num_batches: 0,
    };

    for start in (0..src.len()).step_by(batch_size) {
        let end = (start + batch_size).min(src.len());
        let (pos, neg) = model.contrast(
            index,
            &src[start..end],
            &dst[start..end],
            &background[start..end],
            &times[start..end],
            neighbor_width,
        )?;

        let size = end - start;
        let mut scores = Vec::with_capacity(2 * size);
        scores.extend_from_slice(&pos);
        scores.extend_from_slice(&neg);
        let labels: Vec<bool> = (0..2 * size).map(|j| j < size).collect();
        let thresholded: Vec<bool> = scores.iter().map(|&p| p > 0.5).collect();

        report.accuracy += accuracy(&labels, &thresholded);
        report.average_precision += average_precision_score(&labels, &scores);
        report.f1 += binary_f1(&labels, &thresholded);
        report.auc += roc_auc(&labels, &scores);
        report.num_batches += 1;
    }

    if report.num_batches > 0 {
        let n = report.num_batches as f32;
        report.accuracy /= n;
        report.average_precision /= n;
        report.f1 /= n;
        report.auc /= n;
    }
    Ok(report)
}
