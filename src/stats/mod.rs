//! Numeric kernels shared by the profiler, the comparison engine and imputation.
//!
//! All functions take values with nulls already removed unless stated
//! otherwise, and return `None` rather than `NaN` when a statistic is undefined.

use serde::Serialize;

/// Number of histogram bins used everywhere in the lab
pub const HISTOGRAM_BINS: usize = 20;

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Sorted copy, NaN-safe
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Quantile of already sorted data, linear interpolation between order statistics
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile_sorted(&sorted(values), 0.5)
}

/// Min, quartiles, max
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl FiveNumberSummary {
    pub fn compute(values: &[f64]) -> Option<Self> {
        let s = sorted(values);
        Some(Self {
            min: *s.first()?,
            q1: quantile_sorted(&s, 0.25)?,
            median: quantile_sorted(&s, 0.5)?,
            q3: quantile_sorted(&s, 0.75)?,
            max: *s.last()?,
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// `(Q1 - 1.5 IQR, Q3 + 1.5 IQR)`
    pub fn fences(&self) -> (f64, f64) {
        let iqr = self.iqr();
        (self.q1 - 1.5 * iqr, self.q3 + 1.5 * iqr)
    }

    /// Values strictly outside the fences
    pub fn count_outliers(&self, values: &[f64]) -> usize {
        let (lower, upper) = self.fences();
        values.iter().filter(|&&v| v < lower || v > upper).count()
    }
}

/// Equal-width histogram
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` boundaries
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Histogram over the observed range of `values`. A degenerate range
    /// `[v, v]` is widened to `[v - 0.5, v + 0.5]`.
    pub fn over_range(values: &[f64], bins: usize) -> Option<Self> {
        let (lo, hi) = min_max(values)?;
        Some(Self::with_edges(values, equal_width_edges(lo, hi, bins)))
    }

    /// Count `values` into the given edges. The last bin is closed on the
    /// right; values outside `[first, last]` are ignored.
    pub fn with_edges(values: &[f64], edges: Vec<f64>) -> Self {
        let n_bins = edges.len().saturating_sub(1);
        let mut counts = vec![0usize; n_bins];
        if n_bins > 0 {
            let (first, last) = (edges[0], edges[n_bins]);
            for &v in values {
                if v < first || v > last {
                    continue;
                }
                let idx = edges.partition_point(|&e| e <= v).saturating_sub(1);
                counts[idx.min(n_bins - 1)] += 1;
            }
        }
        Self { edges, counts }
    }

    /// `(label, count)` pairs labelled `"{lower:.1}-{upper:.1}"`
    pub fn labelled(&self) -> impl Iterator<Item = (String, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(w, &c)| (bin_label(w[0], w[1]), c))
    }
}

pub fn bin_label(lower: f64, upper: f64) -> String {
    format!("{:.1}-{:.1}", lower, upper)
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// `bins + 1` evenly spaced edges from `lo` to `hi`; the last edge is exactly `hi`
pub fn equal_width_edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let step = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * step).collect();
    if let Some(last) = edges.last_mut() {
        *last = hi;
    }
    edges
}

/// Pearson correlation over rows where both sides are present.
/// `None` when fewer than two complete pairs exist or either side is constant.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
