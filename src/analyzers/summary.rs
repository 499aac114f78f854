//! Headline KPIs over the filtered tables.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analyzers::utility::{Describe, describe, mean, sum_present};
use crate::error::{PipelineError, PipelineResult};
use crate::record::{ConsumptionTable, GenerationTable};

/// Dashboard KPIs. Either fully computed or not produced at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_consumption: f64,
    pub total_generation: f64,
    /// Total generation as a percentage of total consumption.
    pub efficiency_ratio: f64,
    /// Latest year's consumption against the year before, in percent.
    pub yoy_growth: f64,
    pub peak_consumption: f64,
    pub peak_date: Option<NaiveDateTime>,
    pub renewable_percentage: f64,
    /// Quarter (1-4) with the highest mean consumption.
    pub highest_quarter: Option<u32>,
    pub consumption_by_year: BTreeMap<i32, f64>,
}

fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

/// Computes the KPIs.
///
/// Fails with a compute failure when no consumption row carries a load
/// value, since there is no peak to report.
pub fn summarize(
    generation: &GenerationTable,
    consumption: &ConsumptionTable,
) -> PipelineResult<Metrics> {
    let total_consumption = sum_present(consumption.rows.iter().map(|r| r.total_load));

    let catalog = &generation.catalog;
    let total_generation = sum_present(
        generation
            .rows
            .iter()
            .flat_map(|r| catalog.iter().map(move |s| r.value(s.index))),
    );
    let renewable_generation = sum_present(
        generation
            .rows
            .iter()
            .flat_map(|r| catalog.renewables().map(move |s| r.value(s.index))),
    );

    let mut consumption_by_year: BTreeMap<i32, f64> = BTreeMap::new();
    let mut by_quarter: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for row in &consumption.rows {
        let Some(cal) = row.calendar() else { continue };
        *consumption_by_year.entry(cal.year).or_default() += row.total_load.unwrap_or(0.0);
        if let Some(load) = row.total_load {
            by_quarter.entry(cal.quarter).or_default().push(load);
        }
    }

    let mut latest_years = consumption_by_year.values().rev().copied();
    let yoy_growth = match (latest_years.next(), latest_years.next()) {
        (Some(latest), Some(previous)) if previous != 0.0 => (latest / previous - 1.0) * 100.0,
        _ => 0.0,
    };

    let (peak_consumption, peak_date) = consumption
        .rows
        .iter()
        .filter_map(|r| r.total_load.map(|v| (v, r.start_time())))
        .fold(None, |best: Option<(f64, Option<NaiveDateTime>)>, (v, ts)| match best {
            Some((b, _)) if b >= v => best,
            _ => Some((v, ts)),
        })
        .ok_or_else(|| {
            PipelineError::ComputeFailure("no consumption values to summarize".to_string())
        })?;

    let highest_quarter = by_quarter
        .iter()
        .map(|(q, loads)| (*q, mean(loads)))
        .fold(None, |best: Option<(u32, f64)>, (q, m)| match best {
            Some((_, b)) if b >= m => best,
            _ => Some((q, m)),
        })
        .map(|(q, _)| q);

    Ok(Metrics {
        total_consumption,
        total_generation,
        efficiency_ratio: percent(total_generation, total_consumption),
        yoy_growth,
        peak_consumption,
        peak_date,
        renewable_percentage: percent(renewable_generation, total_generation),
        highest_quarter,
        consumption_by_year,
    })
}

/// Distribution of the consumption load and of per-row total generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStatistics {
    pub consumption: Describe,
    pub generation: Describe,
}

/// Describes the filtered tables. Missing loads are left out; a generation
/// row's total sums its present source values, so an all-empty row counts
/// as zero.
pub fn data_statistics(
    generation: &GenerationTable,
    consumption: &ConsumptionTable,
) -> DataStatistics {
    let loads: Vec<f64> = consumption.rows.iter().filter_map(|r| r.total_load).collect();
    let catalog = &generation.catalog;
    let totals: Vec<f64> = generation
        .rows
        .iter()
        .map(|r| sum_present(catalog.iter().map(|s| r.value(s.index))))
        .collect();

    DataStatistics {
        consumption: describe(&loads),
        generation: describe(&totals),
    }
}
