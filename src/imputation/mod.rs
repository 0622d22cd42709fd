//! Per-column null imputation
//!
//! Provides the strategies a user can pick per column:
//! - mean / median (numeric columns only, otherwise a no-op)
//! - mode (most frequent non-null value, any column type)
//! - drop_row (remove rows with a null in the column)
//!
//! Strategies run in the order they were given, so a `drop_row` listed first
//! changes the statistics a later `mean` sees.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{Column, ColumnValues, Dataset};
use crate::error::{DatalabError, Result};
use crate::stats;

/// How to treat nulls in one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Median,
    Mode,
    DropRow,
}

impl ImputeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImputeStrategy::Mean => "mean",
            ImputeStrategy::Median => "median",
            ImputeStrategy::Mode => "mode",
            ImputeStrategy::DropRow => "drop_row",
        }
    }
}

impl fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImputeStrategy {
    type Err = DatalabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ImputeStrategy::Mean),
            "median" => Ok(ImputeStrategy::Median),
            "mode" => Ok(ImputeStrategy::Mode),
            "drop_row" => Ok(ImputeStrategy::DropRow),
            other => Err(DatalabError::InvalidInput(format!(
                "Unknown imputation strategy: {}",
                other
            ))),
        }
    }
}

/// Ordered column → strategy mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyMap {
    entries: IndexMap<String, ImputeStrategy>,
}

impl StrategyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, strategy: ImputeStrategy) -> Self {
        self.insert(column, strategy);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, strategy: ImputeStrategy) {
        self.entries.insert(column.into(), strategy);
    }

    /// Build from a decoded JSON object, keeping key order.
    ///
    /// Non-string values are rejected; unrecognised strategy names are
    /// skipped with a warning.
    pub fn from_json(object: &IndexMap<String, serde_json::Value>) -> Result<Self> {
        let mut map = Self::new();
        for (column, value) in object {
            let name = value.as_str().ok_or_else(|| {
                DatalabError::InvalidInput(format!(
                    "Strategy for column '{}' must be a string",
                    column
                ))
            })?;
            match name.parse::<ImputeStrategy>() {
                Ok(strategy) => map.insert(column.clone(), strategy),
                Err(_) => warn!(column = %column, strategy = %name, "Ignoring unknown imputation strategy"),
            }
        }
        Ok(map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ImputeStrategy)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of applying a [`StrategyMap`]
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    pub dataset: Dataset,
    pub rows_dropped: usize,
}

impl ImputationOutcome {
    pub fn remaining_nulls(&self) -> IndexMap<String, usize> {
        self.dataset.null_counts()
    }
}

/// Applies a [`StrategyMap`] to a dataset
#[derive(Debug, Clone)]
pub struct Imputer {
    strategies: StrategyMap,
}

impl Imputer {
    pub fn new(strategies: StrategyMap) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &StrategyMap {
        &self.strategies
    }

    pub fn transform(&self, mut dataset: Dataset) -> ImputationOutcome {
        let initial_rows = dataset.n_rows();

        for (name, strategy) in self.strategies.iter() {
            let Some(column) = dataset.column(name) else {
                debug!(column = %name, "Skipping strategy for unknown column");
                continue;
            };

            match strategy {
                ImputeStrategy::DropRow => {
                    let keep: Vec<bool> = (0..column.len()).map(|i| !column.is_null(i)).collect();
                    dataset.retain_rows(&keep);
                }
                ImputeStrategy::Mean | ImputeStrategy::Median | ImputeStrategy::Mode => {
                    if let Some(column) = dataset.column_mut(name) {
                        fill_column(column, strategy);
                    }
                }
            }
        }

        ImputationOutcome {
            rows_dropped: initial_rows - dataset.n_rows(),
            dataset,
        }
    }
}

fn fill_column(column: &mut Column, strategy: ImputeStrategy) {
    match column.values_mut() {
        ColumnValues::Numeric { values, integral } => {
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            let fill = match strategy {
                ImputeStrategy::Mean => stats::mean(&present),
                ImputeStrategy::Median => stats::median(&present),
                ImputeStrategy::Mode => most_frequent(&present, |a, b| a.total_cmp(b)),
                ImputeStrategy::DropRow => None,
            };
            if let Some(fill) = fill {
                let mut filled = false;
                for v in values.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(fill);
                    filled = true;
                }
                if filled && fill.fract() != 0.0 {
                    *integral = false;
                }
            }
        }
        ColumnValues::Categorical(values) => {
            if strategy != ImputeStrategy::Mode {
                return;
            }
            let present: Vec<String> = values.iter().flatten().cloned().collect();
            if let Some(fill) = most_frequent(&present, |a, b| a.cmp(b)) {
                for v in values.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(fill.clone());
                }
            }
        }
    }
}

/// Most frequent value; ties go to the smallest value
fn most_frequent<T, F>(values: &[T], cmp: F) -> Option<T>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut sorted = values.to_vec();
    sorted.sort_by(&cmp);

    let mut best: Option<(&T, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && cmp(&sorted[i], &sorted[j]) == Ordering::Equal {
            j += 1;
        }
        let run = j - i;
        if best.map_or(true, |(_, n)| run > n) {
            best = Some((&sorted[i], run));
        }
        i = j;
    }
    best.map(|(v, _)| v.clone())
}
