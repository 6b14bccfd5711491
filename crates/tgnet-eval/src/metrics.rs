//! Ranking and binary classification metrics.
//!
//! Relevance vectors are binary (nonzero is relevant), ordered by predicted
//! rank, best first. All metrics are pure slice math.

/// Precision over the first `k` ranked items.
pub fn precision_at_k(relevance: &[f32], k: usize) -> f32 {
    let k = k.min(relevance.len());
    if k == 0 {
        return 0.0;
    }
    relevance[..k].iter().sum::<f32>() / k as f32
}

/// Recall over the first `k` ranked items given the total positive count.
pub fn recall_at_k(relevance: &[f32], k: usize, num_positives: usize) -> f32 {
    if num_positives == 0 {
        return 0.0;
    }
    let k = k.min(relevance.len());
    relevance[..k].iter().sum::<f32>() / num_positives as f32
}

/// Average precision (area under the precision-recall curve) over the first
/// `cut` ranked items.
pub fn average_precision(relevance: &[f32], cut: usize) -> f32 {
    let cut = cut.min(relevance.len());
    let mut total = 0.0;
    for k in 0..cut {
        if relevance[k] > 0.0 {
            total += precision_at_k(relevance, k + 1);
        }
    }
    if total == 0.0 {
        return 0.0;
    }
    let num_relevant: f32 = relevance.iter().sum();
    total / (cut as f32).min(num_relevant)
}

/// Discounted cumulative gain over the first `k` items (log2 discounting,
/// every position discounted).
pub fn dcg_at_k(relevance: &[f32], k: usize) -> f32 {
    let k = k.min(relevance.len());
    relevance[..k]
        .iter()
        .enumerate()
        .map(|(i, &r)| r / ((i + 2) as f32).log2())
        .sum()
}

/// Normalized discounted cumulative gain over the first `k` items.
pub fn ndcg_at_k(relevance: &[f32], k: usize) -> f32 {
    let mut ideal = relevance.to_vec();
    ideal.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let dcg_max = dcg_at_k(&ideal, k);
    if dcg_max == 0.0 {
        return 0.0;
    }
    dcg_at_k(relevance, k) / dcg_max
}

/// 1.0 when any of the first `k` items is relevant, else 0.0.
pub fn hit_at_k(relevance: &[f32], k: usize) -> f32 {
    let k = k.min(relevance.len());
    if relevance[..k].iter().any(|&r| r > 0.0) {
        1.0
    } else {
        0.0
    }
}

/// Reciprocal rank of the first relevant item, 0.0 when none is.
pub fn mean_reciprocal_rank(relevance: &[f32]) -> f32 {
    relevance
        .iter()
        .position(|&r| r > 0.5)
        .map_or(0.0, |rank| 1.0 / (rank + 1) as f32)
}

/// Harmonic mean of precision and recall, 0.0 when both are zero.
pub fn f1_from(precision: f32, recall: f32) -> f32 {
    if precision + recall > 0.0 {
        (2.0 * precision * recall) / (precision + recall)
    } else {
        0.0
    }
}

/// Fraction of predictions matching the labels.
pub fn accuracy(labels: &[bool], predictions: &[bool]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = labels
        .iter()
        .zip(predictions.iter())
        .filter(|(l, p)| l == p)
        .count();
    correct as f32 / labels.len() as f32
}

/// F1 of the positive class from binary labels and predictions.
pub fn binary_f1(labels: &[bool], predictions: &[bool]) -> f32 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&label, &pred) in labels.iter().zip(predictions.iter()) {
        match (label, pred) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return 0.0;
    }
    let precision = tp as f32 / (tp + fp) as f32;
    let recall = tp as f32 / (tp + fn_) as f32;
    f1_from(precision, recall)
}

/// Area under the ROC curve via the rank (Mann-Whitney U) formulation,
/// averaging ranks across ties. Degenerate input (a single class) scores
/// 0.0 rather than failing.
pub fn roc_auc(labels: &[bool], scores: &[f32]) -> f32 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average 1-based ranks over tied score runs.
    let mut ranks = vec![0.0f64; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let mean_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = mean_rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|(&l, _)| l)
        .map(|(_, &r)| r)
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    (u / (n_pos * n_neg) as f64) as f32
}

/// Average precision over score-ranked labels (area under the PR curve).
pub fn average_precision_score(labels: &[bool], scores: &[f32]) -> f32 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    if n_pos == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut tp = 0usize;
    let mut total = 0.0f32;
    for (position, &idx) in order.iter().enumerate() {
        if labels[idx] {
            tp += 1;
            total += tp as f32 / (position + 1) as f32;
        }
    }
    total / n_pos as f32
}

/// Project hit positions from a sampled candidate ranking onto the full
/// candidate ranking: a hit at position `p` among `num_scored` items maps to
/// position `floor((num_candidates - 1) * p / num_scored)`. Hits that map
/// past the end are dropped; the corrected vector carries at most one hit.
pub fn rank_corrected(relevance: &[f32], num_scored: usize, num_candidates: usize) -> Vec<f32> {
    let mut corrected = vec![0.0; relevance.len()];
    if num_scored == 0 {
        return corrected;
    }
    for (position, &r) in relevance.iter().enumerate() {
        if r > 0.5 {
            let projected = (num_candidates.saturating_sub(1) * position) / num_scored;
            if projected + 1 >= corrected.len() {
                continue;
            }
            corrected[projected] = 1.0;
        }
    }
    debug_assert!(corrected.iter().sum::<f32>() <= 1.0);
    corrected
}
