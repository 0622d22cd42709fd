//! Tabular dataset model
//!
//! Columns are either numeric (stored as `f64`, remembering whether the source
//! was an integer type) or categorical. Missing values are `None`; a float
//! `NaN` coming from the CSV reader is normalised to `None` on load.

mod loader;
pub mod sample;

pub use loader::{read_csv, read_csv_head, write_csv};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{DatalabError, Result};

/// Name of the label column preferred by the target fallback rule
pub const DEFAULT_TARGET: &str = "Potability";

/// Values of a single column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric {
        values: Vec<Option<f64>>,
        /// Source column was an integer type
        integral: bool,
    },
    Categorical(Vec<Option<String>>),
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Self {
            name: name.into(),
            values: ColumnValues::Numeric { values, integral: false },
        }
    }

    pub fn integer(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric {
                values: values.into_iter().map(|v| v.map(|x| x as f64)).collect(),
                integral: true,
            },
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Categorical(values),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ColumnValues {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric { values, .. } => values.len(),
            ColumnValues::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.values, ColumnValues::Numeric { .. })
    }

    pub fn is_null(&self, row: usize) -> bool {
        match &self.values {
            ColumnValues::Numeric { values, .. } => values[row].is_none(),
            ColumnValues::Categorical(values) => values[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    /// Numeric values with nulls dropped. Empty for categorical columns.
    pub fn non_null_f64(&self) -> Vec<f64> {
        match &self.values {
            ColumnValues::Numeric { values, .. } => values.iter().flatten().copied().collect(),
            ColumnValues::Categorical(_) => Vec::new(),
        }
    }

    /// Raw numeric slice, if numeric
    pub fn as_f64(&self) -> Option<&[Option<f64>]> {
        match &self.values {
            ColumnValues::Numeric { values, .. } => Some(values),
            ColumnValues::Categorical(_) => None,
        }
    }

    /// Display form of a cell, used for class labels
    pub fn label_at(&self, row: usize) -> Option<String> {
        match &self.values {
            ColumnValues::Numeric { values, integral } => {
                values[row].map(|v| format_number(v, *integral))
            }
            ColumnValues::Categorical(values) => values[row].clone(),
        }
    }

    /// JSON form of a cell; nulls are rendered as an empty string
    pub fn json_at(&self, row: usize) -> serde_json::Value {
        match &self.values {
            ColumnValues::Numeric { values, integral } => match values[row] {
                Some(v) if *integral && v.fract() == 0.0 => serde_json::Value::from(v as i64),
                Some(v) => serde_json::Number::from_f64(v)
                    .map(serde_json::Value::Number)
                    .unwrap_or_else(|| serde_json::Value::String(String::new())),
                None => serde_json::Value::String(String::new()),
            },
            ColumnValues::Categorical(values) => {
                serde_json::Value::String(values[row].clone().unwrap_or_default())
            }
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        fn filter<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(keep)
                .filter_map(|(v, &k)| k.then(|| v.clone()))
                .collect()
        }
        self.values = match &self.values {
            ColumnValues::Numeric { values, integral } => ColumnValues::Numeric {
                values: filter(values, keep),
                integral: *integral,
            },
            ColumnValues::Categorical(values) => ColumnValues::Categorical(filter(values, keep)),
        };
    }
}

/// Integral values print without a fractional part ("1" rather than "1.0")
pub(crate) fn format_number(value: f64, integral: bool) -> String {
    if integral || (value.fract() == 0.0 && value.abs() < 1e15) {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Ordered collection of equally long, uniquely named columns
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

/// First rows of a dataset, for display
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<IndexMap<String, serde_json::Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(DatalabError::ShapeError {
                expected: format!("{} rows", n_rows),
                actual: format!("{} rows in column '{}'", bad.len(), bad.name()),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for col in &columns {
            if !seen.insert(col.name()) {
                return Err(DatalabError::InvalidInput(format!(
                    "Duplicate column name: {}",
                    col.name()
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_numeric())
    }

    /// Missing values per column, in column order
    pub fn null_counts(&self) -> IndexMap<String, usize> {
        self.columns
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect()
    }

    /// `Potability` when present, otherwise the last column
    pub fn default_target(&self) -> Option<&str> {
        if self.column(DEFAULT_TARGET).is_some() {
            return Some(DEFAULT_TARGET);
        }
        self.columns.last().map(Column::name)
    }

    /// Keep only rows whose mask entry is `true`
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.n_rows);
        for col in &mut self.columns {
            col.retain(keep);
        }
        self.n_rows = keep.iter().filter(|&&k| k).count();
    }

    pub fn preview(&self, n: usize) -> Preview {
        let rows = (0..self.n_rows.min(n))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name().to_string(), c.json_at(row)))
                    .collect()
            })
            .collect();
        Preview {
            columns: self.column_names(),
            rows,
        }
    }
}
