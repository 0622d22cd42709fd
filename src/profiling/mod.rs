//! Exploratory statistics over a dataset
//!
//! Every block is computed independently and tolerates datasets without any
//! numeric column.

use indexmap::IndexMap;
use serde::Serialize;

use crate::data::{Column, Dataset};
use crate::stats::{self, FiveNumberSummary, Histogram, HISTOGRAM_BINS};

/// Descriptive statistics of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q1: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

impl Description {
    fn compute(values: &[f64]) -> Self {
        let summary = FiveNumberSummary::compute(values);
        Self {
            count: values.len(),
            mean: stats::mean(values),
            std: stats::std_dev(values),
            min: summary.map(|s| s.min),
            q1: summary.map(|s| s.q1),
            median: summary.map(|s| s.median),
            q3: summary.map(|s| s.q3),
            max: summary.map(|s| s.max),
        }
    }
}

/// One histogram bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub name: String,
    pub count: usize,
}

/// One cell of the correlation matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationCell {
    pub x: String,
    pub y: String,
    pub value: f64,
}

/// Frequency of one target class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Boxplot and outlier figures of one numeric feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierSummary {
    pub column: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub outliers: usize,
    pub outlier_percentage: f64,
}

/// Full exploratory report
#[derive(Debug, Clone, Serialize)]
pub struct EdaReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub target: Option<String>,
    pub null_counts: IndexMap<String, usize>,
    pub description: IndexMap<String, Description>,
    pub histograms: IndexMap<String, Vec<HistogramBin>>,
    pub correlation: Vec<CorrelationCell>,
    pub class_distribution: Vec<ClassCount>,
    pub boxplots: Vec<OutlierSummary>,
}

/// Computes [`EdaReport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetProfiler;

impl DatasetProfiler {
    pub fn profile(&self, dataset: &Dataset) -> EdaReport {
        let target = dataset.default_target().map(str::to_string);
        EdaReport {
            total_rows: dataset.n_rows(),
            total_columns: dataset.n_cols(),
            columns: dataset.column_names(),
            null_counts: dataset.null_counts(),
            description: describe(dataset),
            histograms: histograms(dataset),
            correlation: correlation(dataset),
            class_distribution: target
                .as_deref()
                .and_then(|t| dataset.column(t))
                .map(|col| class_distribution(col, dataset.n_rows()))
                .unwrap_or_default(),
            boxplots: boxplots(dataset, target.as_deref()),
            target,
        }
    }
}

pub fn describe(dataset: &Dataset) -> IndexMap<String, Description> {
    dataset
        .numeric_columns()
        .map(|c| (c.name().to_string(), Description::compute(&c.non_null_f64())))
        .collect()
}

/// Histogram of one column over its own non-null range; empty when all null
pub fn column_histogram(column: &Column) -> Vec<HistogramBin> {
    Histogram::over_range(&column.non_null_f64(), HISTOGRAM_BINS)
        .map(|h| {
            h.labelled()
                .map(|(name, count)| HistogramBin { name, count })
                .collect()
        })
        .unwrap_or_default()
}

pub fn histograms(dataset: &Dataset) -> IndexMap<String, Vec<HistogramBin>> {
    dataset
        .numeric_columns()
        .map(|c| (c.name().to_string(), column_histogram(c)))
        .collect()
}

/// Flattened Pearson matrix over numeric columns; undefined entries become 0
pub fn correlation(dataset: &Dataset) -> Vec<CorrelationCell> {
    let numeric: Vec<&Column> = dataset.numeric_columns().collect();
    let mut cells = Vec::with_capacity(numeric.len() * numeric.len());
    for a in &numeric {
        for b in &numeric {
            let value = if a.name() == b.name() {
                1.0
            } else {
                match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => stats::pearson(x, y).unwrap_or(0.0),
                    _ => 0.0,
                }
            };
            cells.push(CorrelationCell {
                x: a.name().to_string(),
                y: b.name().to_string(),
                value,
            });
        }
    }
    cells
}

/// Value counts of the target, most frequent first. Percentages are relative
/// to all rows (including rows with a missing label), one decimal.
pub fn class_distribution(target: &Column, total_rows: usize) -> Vec<ClassCount> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for row in 0..target.len() {
        if let Some(label) = target.label_at(row) {
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    // stable: ties keep first-seen order
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts
        .into_iter()
        .map(|(label, count)| ClassCount {
            percentage: if total_rows > 0 {
                stats::round_to(count as f64 * 100.0 / total_rows as f64, 1)
            } else {
                0.0
            },
            label,
            count,
        })
        .collect()
}

/// 1.5 x IQR outlier summary for numeric non-target columns with data
pub fn boxplots(dataset: &Dataset, target: Option<&str>) -> Vec<OutlierSummary> {
    dataset
        .numeric_columns()
        .filter(|c| Some(c.name()) != target)
        .filter_map(|c| {
            let values = c.non_null_f64();
            let summary = FiveNumberSummary::compute(&values)?;
            let (lower_fence, upper_fence) = summary.fences();
            let outliers = summary.count_outliers(&values);
            Some(OutlierSummary {
                column: c.name().to_string(),
                min: summary.min,
                q1: summary.q1,
                median: summary.median,
                q3: summary.q3,
                max: summary.max,
                lower_fence,
                upper_fence,
                outliers,
                outlier_percentage: stats::round_to(
                    outliers as f64 * 100.0 / values.len() as f64,
                    2,
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn dataset() -> Dataset {
        let a: Vec<Option<f64>> = (0..40)
            .map(|i| if i % 10 == 0 { None } else { Some(i as f64) })
            .collect();
        let b: Vec<Option<f64>> = (0..40).map(|i| Some(80.0 - 2.0 * i as f64)).collect();
        let label: Vec<Option<i64>> = (0..40).map(|i| Some(i64::from(i % 4 == 0))).collect();
        Dataset::new(vec![
            Column::numeric("a", a),
            Column::numeric("b", b),
            Column::categorical("site", (0..40).map(|i| Some(format!("s{}", i % 3))).collect()),
            Column::integer("Potability", label),
        ])
        .unwrap()
    }

    #[test]
    fn test_histograms_cover_non_null_values() {
        let report = DatasetProfiler.profile(&dataset());
        for (name, bins) in &report.histograms {
            let total: usize = bins.iter().map(|b| b.count).sum();
            let expected = 40 - report.null_counts[name];
            assert_eq!(total, expected, "column {}", name);
            assert_eq!(bins.len(), HISTOGRAM_BINS);
        }
        assert!(!report.histograms.contains_key("site"));
    }

    #[test]
    fn test_all_null_column_gets_empty_histogram_and_no_boxplot() {
        let ds = Dataset::new(vec![
            Column::numeric("empty", vec![None, None]),
            Column::integer("y", vec![Some(0), Some(1)]),
        ])
        .unwrap();
        let report = DatasetProfiler.profile(&ds);
        assert!(report.histograms["empty"].is_empty());
        assert!(report.boxplots.is_empty());
        assert_eq!(report.description["empty"].count, 0);
        assert_eq!(report.description["empty"].mean, None);
    }

    #[test]
    fn test_correlation_is_full_square_with_unit_diagonal() {
        let report = DatasetProfiler.profile(&dataset());
        // a, b, Potability are numeric
        assert_eq!(report.correlation.len(), 9);
        for cell in report.correlation.iter().filter(|c| c.x == c.y) {
            assert_eq!(cell.value, 1.0);
        }
        let ab = report
            .correlation
            .iter()
            .find(|c| c.x == "a" && c.y == "b")
            .unwrap();
        assert!((ab.value + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_class_distribution() {
        let report = DatasetProfiler.profile(&dataset());
        assert_eq!(report.target.as_deref(), Some("Potability"));
        assert_eq!(report.class_distribution.len(), 2);
        assert_eq!(report.class_distribution[0].label, "0");
        assert_eq!(report.class_distribution[0].count, 30);
        assert_eq!(report.class_distribution[0].percentage, 75.0);
        assert_eq!(report.class_distribution[1].percentage, 25.0);
    }

    #[test]
    fn test_outliers_skip_target() {
        let report = DatasetProfiler.profile(&dataset());
        let names: Vec<&str> = report.boxplots.iter().map(|o| o.column.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(report.boxplots.iter().all(|o| o.outliers == 0));
    }

    #[test]
    fn test_no_numeric_columns() {
        let ds = Dataset::new(vec![Column::categorical(
            "only",
            vec![Some("x".into()), None],
        )])
        .unwrap();
        let report = DatasetProfiler.profile(&ds);
        assert!(report.histograms.is_empty());
        assert!(report.correlation.is_empty());
        assert_eq!(report.class_distribution.len(), 1);
        assert_eq!(report.class_distribution[0].percentage, 50.0);
    }
}
