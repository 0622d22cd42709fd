//! Before/after histograms between the raw and cleaned dataset
//!
//! Both sides of a column are counted into the same 20 bins so the two series
//! can be drawn on one chart.

use indexmap::IndexMap;
use serde::Serialize;

use crate::data::Dataset;
use crate::stats::{self, Histogram, HISTOGRAM_BINS};

/// One bar pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonBin {
    pub name: String,
    #[serde(rename = "Raw")]
    pub raw: usize,
    #[serde(rename = "Cleaned")]
    pub cleaned: usize,
}

/// Aligned histograms of one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnComparison {
    pub edges: Vec<f64>,
    pub raw: Histogram,
    pub cleaned: Histogram,
}

impl ColumnComparison {
    pub fn bins(&self) -> Vec<ComparisonBin> {
        self.raw
            .labelled()
            .zip(&self.cleaned.counts)
            .map(|((name, raw), &cleaned)| ComparisonBin { name, raw, cleaned })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComparisonReport {
    pub columns: IndexMap<String, ColumnComparison>,
}

/// Wire shape: `{"comparisons": {column: [bins]}, "bin_edges": {column: [edges]}}`
#[derive(Serialize)]
struct ComparisonBody<'a> {
    comparisons: IndexMap<&'a str, Vec<ComparisonBin>>,
    bin_edges: IndexMap<&'a str, &'a [f64]>,
}

impl Serialize for ComparisonReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ComparisonBody {
            comparisons: self
                .columns
                .iter()
                .map(|(name, c)| (name.as_str(), c.bins()))
                .collect(),
            bin_edges: self
                .columns
                .iter()
                .map(|(name, c)| (name.as_str(), c.edges.as_slice()))
                .collect(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine;

impl ComparisonEngine {
    /// Compare every cleaned numeric column that is also numeric in `raw`.
    /// Columns with no values on either side are skipped.
    pub fn compare(&self, raw: &Dataset, cleaned: &Dataset) -> ComparisonReport {
        let mut columns = IndexMap::new();
        for clean_col in cleaned.numeric_columns() {
            let Some(raw_col) = raw.column(clean_col.name()).filter(|c| c.is_numeric()) else {
                continue;
            };
            let raw_values = raw_col.non_null_f64();
            let clean_values = clean_col.non_null_f64();
            let (Some((raw_lo, raw_hi)), Some((clean_lo, clean_hi))) =
                (stats::min_max(&raw_values), stats::min_max(&clean_values))
            else {
                continue;
            };

            let edges = stats::equal_width_edges(
                raw_lo.min(clean_lo),
                raw_hi.max(clean_hi),
                HISTOGRAM_BINS,
            );
            columns.insert(
                clean_col.name().to_string(),
                ColumnComparison {
                    raw: Histogram::with_edges(&raw_values, edges.clone()),
                    cleaned: Histogram::with_edges(&clean_values, edges.clone()),
                    edges,
                },
            );
        }
        ComparisonReport { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    #[test]
    fn test_shared_edges() {
        let raw = Dataset::new(vec![
            Column::numeric("x", vec![Some(0.0), None, Some(10.0), None]),
            Column::categorical("c", vec![None, None, None, None]),
        ])
        .unwrap();
        let cleaned = Dataset::new(vec![
            Column::numeric("x", vec![Some(0.0), Some(5.0), Some(10.0), Some(5.0)]),
            Column::categorical("c", vec![None, None, None, None]),
        ])
        .unwrap();

        let report = ComparisonEngine.compare(&raw, &cleaned);
        assert_eq!(report.columns.len(), 1);
        let x = &report.columns["x"];
        assert_eq!(x.edges.len(), HISTOGRAM_BINS + 1);
        assert_eq!(x.raw.edges, x.cleaned.edges);
        assert_eq!(x.raw.counts.iter().sum::<usize>(), 2);
        assert_eq!(x.cleaned.counts.iter().sum::<usize>(), 4);

        let bins = x.bins();
        assert_eq!(bins.len(), HISTOGRAM_BINS);
        assert_eq!(bins[0].name, "0.0-0.5");
        assert_eq!(bins[10].cleaned, 2);
    }

    #[test]
    fn test_skips_empty_and_missing_columns() {
        let raw = Dataset::new(vec![Column::numeric("x", vec![None, None])]).unwrap();
        let cleaned = Dataset::new(vec![
            Column::numeric("x", vec![Some(1.0), Some(2.0)]),
            Column::numeric("new", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();
        let report = ComparisonEngine.compare(&raw, &cleaned);
        assert!(report.columns.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let ds = Dataset::new(vec![Column::numeric("x", vec![Some(1.0), Some(2.0)])]).unwrap();
        let value = serde_json::to_value(ComparisonEngine.compare(&ds, &ds)).unwrap();
        assert_eq!(value["comparisons"]["x"].as_array().unwrap().len(), 20);
        assert_eq!(value["comparisons"]["x"][0]["Raw"], 1);
        assert_eq!(value["bin_edges"]["x"].as_array().unwrap().len(), 21);
    }
}
