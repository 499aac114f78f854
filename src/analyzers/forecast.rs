//! Seasonal-repeat consumption forecast.
//!
//! The last twelve monthly totals are taken as a template and repeated,
//! each repetition scaled by another power of a fixed growth factor. There
//! is no confidence interval; the ±band in [`Forecast::to_prediction_table`]
//! is applied only when the forecast stands in for missing prediction data.
//!
//! Forecast dates step by 30 days from the last historical month rather than
//! by calendar month.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::analyzers::types::{ForecastPoint, MonthlyPoint};
use crate::analyzers::utility::mean;
use crate::prediction::{PredictionModel, PredictionRow, PredictionTable};
use crate::record::ConsumptionTable;

/// Annual growth assumed by the default forecaster.
pub const GROWTH_FACTOR: f64 = 1.02;

/// Months in one seasonal cycle; also the minimum history.
pub const SEASON_LENGTH: usize = 12;

pub const STEP_DAYS: i64 = 30;

/// Monthly history and its projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub historical: Vec<MonthlyPoint>,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Last historical date; charts draw the history/forecast split here.
    pub fn split_point(&self) -> Option<NaiveDate> {
        self.historical.last().map(|p| p.date)
    }

    /// Percentage change of the mean forecast over the mean history.
    pub fn change_pct(&self) -> Option<f64> {
        let hist: Vec<f64> = self.historical.iter().map(|p| p.value).collect();
        let proj: Vec<f64> = self.points.iter().map(|p| p.value).collect();
        let hist_mean = mean(&hist);
        if hist_mean == 0.0 || proj.is_empty() {
            return None;
        }
        Some((mean(&proj) - hist_mean) / hist_mean * 100.0)
    }

    /// Converts the projection into a prediction table with a symmetric
    /// `band` (0.10 for ±10%).
    pub fn to_prediction_table(&self, band: f64) -> PredictionTable {
        PredictionTable {
            model: PredictionModel::Fallback,
            value_column: "forecast".to_string(),
            rows: self
                .points
                .iter()
                .map(|p| PredictionRow {
                    date: p.date.and_hms_opt(0, 0, 0),
                    forecast: Some(p.value),
                    lower: Some(p.value * (1.0 - band)),
                    upper: Some(p.value * (1.0 + band)),
                })
                .collect(),
        }
    }
}

/// Seasonal-repeat-with-growth forecaster.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalRepeat {
    pub growth: f64,
}

impl Default for SeasonalRepeat {
    fn default() -> Self {
        Self {
            growth: GROWTH_FACTOR,
        }
    }
}

impl SeasonalRepeat {
    /// Aggregates consumption to monthly totals and projects `periods` steps.
    ///
    /// Returns `None` when fewer than [`SEASON_LENGTH`] months of history exist.
    pub fn forecast(&self, consumption: &ConsumptionTable, periods: usize) -> Option<Forecast> {
        let historical = monthly_history(consumption);
        let points = self.project(&historical, periods)?;
        Some(Forecast { historical, points })
    }

    /// Projects `periods` steps from a monthly history.
    ///
    /// The projection stops early at the last step whose date is
    /// representable.
    pub fn project(&self, history: &[MonthlyPoint], periods: usize) -> Option<Vec<ForecastPoint>> {
        if history.len() < SEASON_LENGTH {
            return None;
        }
        let template = &history[history.len() - SEASON_LENGTH..];
        let last_date = history[history.len() - 1].date;

        Some(
            (0..periods)
                .map_while(|i| {
                    let date = step_date(last_date, i + 1)?;
                    let cycle = i32::try_from(i / SEASON_LENGTH + 1).unwrap_or(i32::MAX);
                    Some(ForecastPoint {
                        date,
                        value: template[i % SEASON_LENGTH].value * self.growth.powi(cycle),
                    })
                })
                .collect(),
        )
    }
}

/// Date `steps` 30-day steps after `from`, or `None` past the calendar range.
fn step_date(from: NaiveDate, steps: usize) -> Option<NaiveDate> {
    let days = i64::try_from(steps).ok()?.checked_mul(STEP_DAYS)?;
    from.checked_add_signed(Duration::try_days(days)?)
}

/// Forecast with the default 2% growth factor.
pub fn forecast(consumption: &ConsumptionTable, periods: usize) -> Option<Forecast> {
    SeasonalRepeat::default().forecast(consumption, periods)
}

/// Monthly consumption totals in chronological order. Undated rows are
/// skipped; missing loads count as zero.
pub fn monthly_history(consumption: &ConsumptionTable) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for row in &consumption.rows {
        if let Some(cal) = row.calendar() {
            *months.entry((cal.year, cal.month)).or_default() += row.total_load.unwrap_or(0.0);
        }
    }

    months
        .into_iter()
        .filter_map(|((year, month), value)| {
            NaiveDate::from_ymd_opt(year, month, 1).map(|date| MonthlyPoint { date, value })
        })
        .collect()
}
