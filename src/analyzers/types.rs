//! Data types produced by the analysis pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::record::{CalendarFields, TIMESTAMP_FORMAT};

/// Time bucket used for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Daily,
    Monthly,
    Quarterly,
    Yearly,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Granularity::Daily),
            "monthly" | "month" => Ok(Granularity::Monthly),
            "quarterly" | "quarter" => Ok(Granularity::Quarterly),
            "yearly" | "year" => Ok(Granularity::Yearly),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

/// Key of one aggregate bucket. Ordering is chronological within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Day(NaiveDateTime),
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year(i32),
}

impl BucketKey {
    pub fn new(granularity: Granularity, start: NaiveDateTime, calendar: &CalendarFields) -> Self {
        match granularity {
            Granularity::Daily => BucketKey::Day(start),
            Granularity::Monthly => BucketKey::Month {
                year: calendar.year,
                month: calendar.month,
            },
            Granularity::Quarterly => BucketKey::Quarter {
                year: calendar.year,
                quarter: calendar.quarter,
            },
            Granularity::Yearly => BucketKey::Year(calendar.year),
        }
    }

    pub fn label(&self) -> String {
        match self {
            BucketKey::Day(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            BucketKey::Month { year, month } => format!("{year:04}-{month:02}"),
            BucketKey::Quarter { year, quarter } => format!("{year} Q{quarter}"),
            BucketKey::Year(year) => year.to_string(),
        }
    }
}

/// One row of the consumption-vs-generation trend table.
///
/// A side is `None` when the bucket has no rows in that table, which is
/// different from a bucket whose values sum to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    #[serde(skip)]
    pub bucket: BucketKey,
    #[serde(rename = "Date")]
    pub label: String,
    #[serde(rename = "Consumption")]
    pub consumption: Option<f64>,
    #[serde(rename = "Generation")]
    pub generation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTotal {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Generation (MWh)")]
    pub generation_mwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeriesRow {
    pub bucket: BucketKey,
    pub label: String,
    /// One value per source, in [`SourceSeries::sources`] order.
    pub values: Vec<f64>,
}

/// Per-source sums on a shared time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    pub granularity: Granularity,
    pub sources: Vec<String>,
    pub rows: Vec<SourceSeriesRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyProfileRow {
    pub month: u32,
    pub month_name: &'static str,
    pub mean_consumption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayProfileRow {
    pub weekday: &'static str,
    pub mean_consumption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPoint {
    pub label: String,
    /// Generation as a percentage of consumption.
    pub ratio_pct: Option<f64>,
}

/// Whether generation covered consumption on average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BalanceInsight {
    Deficit { coverage_pct: f64 },
    Surplus { excess_pct: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceChange {
    pub source: String,
    pub change_pct: f64,
}

/// Monthly consumption total, dated on the first of the month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}
