//! Precomputed and fetched prediction tables.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};

/// Candidate value columns, in priority order.
pub static VALUE_COLUMNS: &[&str] = &["forecast", "Residual load", "prediction"];

pub const DATE_COLUMN: &str = "Date";

/// Where a prediction table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PredictionModel {
    Csv,
    Api,
    Fallback,
}

impl fmt::Display for PredictionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PredictionModel::Csv => "CSV Model",
            PredictionModel::Api => "API Model",
            PredictionModel::Fallback => "Fallback Model",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    #[serde(rename = "Date")]
    pub date: Option<NaiveDateTime>,
    pub forecast: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    pub model: PredictionModel,
    /// Name of the input column the forecast values were taken from.
    pub value_column: String,
    pub rows: Vec<PredictionRow>,
}

impl PredictionTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Keeps the first `n` rows.
    pub fn head(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }

    /// Drops rows whose date could not be parsed.
    pub fn dated(mut self) -> Self {
        self.rows.retain(|r| r.date.is_some());
        self
    }
}

/// Picks the value column from a header list.
///
/// This guesses from loosely specified inputs: the first of
/// [`VALUE_COLUMNS`] that is present, else the second column.
pub fn resolve_value_column(headers: &[&str]) -> PipelineResult<String> {
    if let Some(name) = VALUE_COLUMNS.iter().find(|c| headers.contains(*c)) {
        return Ok((*name).to_string());
    }
    match headers.get(1) {
        Some(second) => Ok((*second).to_string()),
        None => Err(PipelineError::ParseFailure(format!(
            "no prediction value column in {headers:?}"
        ))),
    }
}

/// Daily axis used when an input has no date column.
pub fn synthetic_dates(len: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (0..len)
        .map(|i| start + Duration::days(i as i64))
        .collect()
}
