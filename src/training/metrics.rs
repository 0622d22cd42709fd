//! Classification metrics on the held-out split
//!
//! Labels are class indices. Binary-only metrics (AUC, ROC, threshold sweep)
//! take the positive-class probability and a `bool` truth vector.

use serde::{Deserialize, Serialize};

use crate::stats::round_to;

/// Points kept from the full ROC curve
pub const ROC_POINTS: usize = 20;
/// Thresholds 0.00, 0.05, ..., 1.00
pub const SWEEP_STEPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Support-weighted precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    ratio(correct as f64, y_true.len() as f64)
}

/// `matrix[actual][predicted]`
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Per-class scores averaged with weights equal to each class's support
/// in `y_true`; undefined ratios count as zero
pub fn weighted_scores(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> WeightedScores {
    let cm = confusion_matrix(y_true, y_pred, n_classes);
    let total = y_true.len() as f64;
    let mut out = WeightedScores::default();
    if total == 0.0 {
        return out;
    }

    for c in 0..n_classes {
        let tp = cm[c][c] as f64;
        let support: f64 = cm[c].iter().sum::<usize>() as f64;
        let predicted: f64 = cm.iter().map(|row| row[c]).sum::<usize>() as f64;

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let weight = support / total;
        out.precision += weight * precision;
        out.recall += weight * recall;
        out.f1 += weight * f1(precision, recall);
    }
    out
}

/// Area under the ROC curve via the Mann-Whitney U statistic with
/// average ranks for ties. `None` unless both classes are present.
pub fn roc_auc(y_true: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j share their average
        let avg = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = avg;
        }
        i = j;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(y_true)
        .filter(|(_, t)| **t)
        .map(|(r, _)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

/// Full ROC curve, one point per distinct score plus the origin.
///
/// The origin carries threshold `max_score + 1`. Empty unless both classes
/// are present.
pub fn roc_curve(y_true: &[bool], scores: &[f64]) -> Vec<RocPoint> {
    let n_pos = y_true.iter().filter(|&&t| t).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let top = scores[order[0]];
    let mut curve = vec![RocPoint { fpr: 0.0, tpr: 0.0, threshold: top + 1.0 }];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (k, &idx) in order.iter().enumerate() {
        if y_true[idx] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = order.get(k + 1).map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_tie {
            curve.push(RocPoint {
                fpr: fp / n_neg,
                tpr: tp / n_pos,
                threshold: scores[idx],
            });
        }
    }
    curve
}

/// Keep `n` evenly spaced points (first and last included)
pub fn downsample<T: Copy>(points: &[T], n: usize) -> Vec<T> {
    if points.len() <= n || n < 2 {
        return points.to_vec();
    }
    let last = (points.len() - 1) as f64;
    (0..n)
        .map(|i| points[(i as f64 * last / (n - 1) as f64).floor() as usize])
        .collect()
}

/// Precision, recall and F1 of the positive class when predicting positive
/// for `p >= t`, at `t = 0.00, 0.05, ..., 1.00`
pub fn threshold_sweep(y_true: &[bool], proba: &[f64]) -> Vec<ThresholdPoint> {
    (0..=SWEEP_STEPS)
        .map(|k| {
            let threshold = round_to(k as f64 / SWEEP_STEPS as f64, 2);
            let (mut tp, mut fp, mut fn_) = (0.0, 0.0, 0.0);
            for (&truth, &p) in y_true.iter().zip(proba) {
                match (truth, p >= threshold) {
                    (true, true) => tp += 1.0,
                    (false, true) => fp += 1.0,
                    (true, false) => fn_ += 1.0,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            ThresholdPoint {
                threshold,
                precision,
                recall,
                f1: f1(precision, recall),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_and_accuracy() {
        let t = [0, 0, 1, 1, 1];
        let p = [0, 1, 1, 1, 0];
        assert_eq!(confusion_matrix(&t, &p, 2), vec![vec![1, 1], vec![1, 2]]);
        assert!((accuracy(&t, &p) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_scores() {
        let t = [0, 0, 1, 1, 1];
        let p = [0, 1, 1, 1, 0];
        let s = weighted_scores(&t, &p, 2);
        // class 0: p=0.5 r=0.5; class 1: p=2/3 r=2/3
        let expected = 0.4 * 0.5 + 0.6 * (2.0 / 3.0);
        assert!((s.precision - expected).abs() < 1e-12);
        assert!((s.recall - expected).abs() < 1e-12);
        assert!((s.f1 - expected).abs() < 1e-12);

        // never predicted class scores zero instead of NaN
        let s = weighted_scores(&[0, 1], &[0, 0], 2);
        assert!(s.precision.is_finite());
        assert!((s.precision - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_auc() {
        let t = [false, false, true, true];
        assert_eq!(roc_auc(&t, &[0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&t, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&t, &[0.5, 0.5, 0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.2]), None);
    }

    #[test]
    fn test_roc_curve_endpoints() {
        let t = [false, false, true, true];
        let curve = roc_curve(&t, &[0.1, 0.4, 0.35, 0.8]);
        assert_eq!(curve.first().map(|p| (p.fpr, p.tpr)), Some((0.0, 0.0)));
        assert_eq!(curve.last().map(|p| (p.fpr, p.tpr)), Some((1.0, 1.0)));
        assert_eq!(curve.len(), 5);
        assert!(roc_curve(&[false, false], &[0.1, 0.2]).is_empty());
    }

    #[test]
    fn test_downsample() {
        let points: Vec<usize> = (0..100).collect();
        let picked = downsample(&points, ROC_POINTS);
        assert_eq!(picked.len(), ROC_POINTS);
        assert_eq!(picked[0], 0);
        assert_eq!(picked[ROC_POINTS - 1], 99);
        assert_eq!(downsample(&points[..5], ROC_POINTS).len(), 5);
    }

    #[test]
    fn test_threshold_sweep() {
        let sweep = threshold_sweep(&[false, true, true], &[0.2, 0.6, 0.9]);
        assert_eq!(sweep.len(), 21);
        assert_eq!(sweep[0].threshold, 0.0);
        assert_eq!(sweep[20].threshold, 1.0);
        assert_eq!(sweep[1].threshold, 0.05);
        // t = 0 predicts everything positive
        assert!((sweep[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(sweep[0].recall, 1.0);
        // t = 0.5 is perfect
        assert_eq!(sweep[10].f1, 1.0);
        // t = 1.0 predicts nothing
        assert_eq!(sweep[20].precision, 0.0);
        assert_eq!(sweep[20].f1, 0.0);
    }
}
