//! CSV codec between raw artifact bytes and [`Dataset`]

use std::io::Cursor;

use polars::prelude::{
    CsvParseOptions, CsvReadOptions, CsvWriter, DataFrame, DataType, IntoColumn, NamedFrom,
    NullValues, SerReader, SerWriter, Series,
};

use super::{Column, ColumnValues, Dataset};
use crate::error::{DatalabError, Result};

/// Tokens read as missing, in addition to empty fields
const NULL_TOKENS: [&str; 6] = ["NA", "N/A", "NaN", "nan", "null", "NULL"];

fn parse_options() -> CsvParseOptions {
    CsvParseOptions::default().with_null_values(Some(NullValues::AllColumns(
        NULL_TOKENS.iter().map(|t| (*t).into()).collect(),
    )))
}

fn read(bytes: &[u8], n_rows: Option<usize>) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        // full scan so a late non-numeric value turns the column categorical
        .with_infer_schema_length(None)
        .with_n_rows(n_rows)
        .with_parse_options(parse_options())
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| DatalabError::InvalidInput(format!("Invalid CSV file: {}", e)))
}

/// Parse a whole CSV artifact
pub fn read_csv(bytes: &[u8]) -> Result<Dataset> {
    from_dataframe(&read(bytes, None)?)
}

/// Parse only the first `n` data rows; used to validate uploads cheaply
pub fn read_csv_head(bytes: &[u8], n: usize) -> Result<Dataset> {
    from_dataframe(&read(bytes, Some(n))?)
}

fn from_dataframe(df: &DataFrame) -> Result<Dataset> {
    if df.width() == 0 {
        return Err(DatalabError::InvalidInput(
            "Invalid CSV file: no columns found".to_string(),
        ));
    }

    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let series = column.as_materialized_series();
            match series.dtype() {
                // no value to infer a type from; keep it numeric so it still
                // shows up (empty) in histograms and descriptions
                DataType::Null => Ok(Column::numeric(name, vec![None; series.len()])),
                _ if series.null_count() == series.len() => {
                    Ok(Column::numeric(name, vec![None; series.len()]))
                }
                DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 => {
                    let cast = series.cast(&DataType::Int64)?;
                    let values = cast.i64()?.into_iter().collect();
                    Ok(Column::integer(name, values))
                }
                DataType::Float64 | DataType::Float32 => {
                    let cast = series.cast(&DataType::Float64)?;
                    let values = cast.f64()?.into_iter().collect();
                    Ok(Column::numeric(name, values))
                }
                _ => {
                    let cast = series.cast(&DataType::String)?;
                    let values = cast
                        .str()?
                        .into_iter()
                        .map(|v| v.map(str::to_string))
                        .collect();
                    Ok(Column::categorical(name, values))
                }
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Dataset::new(columns)
}

fn to_series(column: &Column) -> Series {
    let name = column.name();
    match column.values() {
        ColumnValues::Numeric { values, integral }
            if *integral && values.iter().flatten().all(|v| v.fract() == 0.0) =>
        {
            let ints: Vec<Option<i64>> = values.iter().map(|v| v.map(|x| x as i64)).collect();
            Series::new(name.into(), ints)
        }
        ColumnValues::Numeric { values, .. } => Series::new(name.into(), values.clone()),
        ColumnValues::Categorical(values) => Series::new(name.into(), values.clone()),
    }
}

/// Serialise a dataset back to CSV bytes (header included, nulls as empty fields)
pub fn write_csv(dataset: &Dataset) -> Result<Vec<u8>> {
    let columns = dataset
        .columns()
        .iter()
        .map(|c| to_series(c).into_column())
        .collect();
    let mut df = DataFrame::new(columns)?;

    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)?;
    Ok(buf)
}
