use crate::analyzers::types::{
    BalanceInsight, BucketKey, Granularity, MonthlyProfileRow, RatioPoint, SourceChange,
    SourceSeries, SourceSeriesRow, SourceTotal, TrendRow, WeekdayProfileRow,
};
use crate::analyzers::utility::{mean, sum_present};
use crate::error::{PipelineError, PipelineResult};
use crate::record::{
    ConsumptionRecord, ConsumptionTable, GenerationRecord, GenerationTable, MONTH_NAMES,
    WEEKDAY_NAMES,
};
use crate::schema::{Source, SourceCatalog};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Looks up every selected source name in the catalog.
///
/// An unknown name is a compute failure: the caller asked for a column
/// the generation file does not have.
pub fn resolve_sources<'a>(
    catalog: &'a SourceCatalog,
    selected: &[String],
) -> PipelineResult<Vec<&'a Source>> {
    selected
        .iter()
        .map(|name| {
            catalog.get(name).ok_or_else(|| {
                PipelineError::ComputeFailure(format!("unknown generation source '{name}'"))
            })
        })
        .collect()
}

fn row_generation(row: &GenerationRecord, sources: &[&Source]) -> f64 {
    sum_present(sources.iter().map(|s| row.value(s.index)))
}

fn bucket_of_generation(row: &GenerationRecord, granularity: Granularity) -> Option<BucketKey> {
    let start = row.start_time()?;
    row.calendar()
        .map(|c| BucketKey::new(granularity, start, c))
}

fn bucket_of_consumption(row: &ConsumptionRecord, granularity: Granularity) -> Option<BucketKey> {
    let start = row.start_time()?;
    row.calendar()
        .map(|c| BucketKey::new(granularity, start, c))
}

/// Builds the consumption-vs-generation trend table.
///
/// Daily rows pair the two tables by position and fall back to `None` for
/// generation when their dated row counts differ. Coarser buckets are
/// summed per table and joined on the bucket key.
pub fn trends(
    generation: &GenerationTable,
    consumption: &ConsumptionTable,
    selected: &[String],
    granularity: Granularity,
) -> PipelineResult<Vec<TrendRow>> {
    let sources = resolve_sources(&generation.catalog, selected)?;

    if granularity == Granularity::Daily {
        return Ok(daily_trends(generation, consumption, &sources));
    }

    let mut cons: BTreeMap<BucketKey, f64> = BTreeMap::new();
    for row in &consumption.rows {
        if let Some(key) = bucket_of_consumption(row, granularity) {
            *cons.entry(key).or_default() += row.total_load.unwrap_or(0.0);
        }
    }

    let mut gen_totals: BTreeMap<BucketKey, f64> = BTreeMap::new();
    for row in &generation.rows {
        if let Some(key) = bucket_of_generation(row, granularity) {
            *gen_totals.entry(key).or_default() += row_generation(row, &sources);
        }
    }

    let keys: BTreeSet<BucketKey> = cons.keys().chain(gen_totals.keys()).copied().collect();
    let unmatched = keys
        .iter()
        .filter(|k| !cons.contains_key(k) || !gen_totals.contains_key(k))
        .count();
    if unmatched > 0 {
        debug!(unmatched, %granularity, "Buckets present in only one table");
    }

    Ok(keys
        .into_iter()
        .map(|bucket| TrendRow {
            bucket,
            label: bucket.label(),
            consumption: cons.get(&bucket).copied(),
            generation: gen_totals.get(&bucket).copied(),
        })
        .collect())
}

fn daily_trends(
    generation: &GenerationTable,
    consumption: &ConsumptionTable,
    sources: &[&Source],
) -> Vec<TrendRow> {
    let cons_rows: Vec<(BucketKey, Option<f64>)> = consumption
        .rows
        .iter()
        .filter_map(|r| bucket_of_consumption(r, Granularity::Daily).map(|k| (k, r.total_load)))
        .collect();
    let gen_values: Vec<f64> = generation
        .rows
        .iter()
        .filter(|r| r.calendar().is_some())
        .map(|r| row_generation(r, sources))
        .collect();

    let aligned = gen_values.len() == cons_rows.len();
    if !aligned {
        debug!(
            consumption_rows = cons_rows.len(),
            generation_rows = gen_values.len(),
            "Daily row counts differ; generation left empty"
        );
    }

    cons_rows
        .into_iter()
        .enumerate()
        .map(|(i, (bucket, load))| TrendRow {
            bucket,
            label: bucket.label(),
            consumption: load,
            generation: if aligned { Some(gen_values[i]) } else { None },
        })
        .collect()
}

/// Total generation per selected source over the whole window.
pub fn source_totals(
    generation: &GenerationTable,
    selected: &[String],
) -> PipelineResult<Vec<SourceTotal>> {
    let sources = resolve_sources(&generation.catalog, selected)?;

    Ok(sources
        .iter()
        .map(|s| SourceTotal {
            source: s.name.clone(),
            generation_mwh: sum_present(generation.rows.iter().map(|r| r.value(s.index))),
        })
        .collect())
}

/// Per-source sums bucketed on a shared time axis.
pub fn source_time_series(
    generation: &GenerationTable,
    selected: &[String],
    granularity: Granularity,
) -> PipelineResult<SourceSeries> {
    let sources = resolve_sources(&generation.catalog, selected)?;

    let mut buckets: BTreeMap<BucketKey, Vec<f64>> = BTreeMap::new();
    for row in &generation.rows {
        let Some(key) = bucket_of_generation(row, granularity) else {
            continue;
        };
        let sums = buckets
            .entry(key)
            .or_insert_with(|| vec![0.0; sources.len()]);
        for (sum, source) in sums.iter_mut().zip(&sources) {
            *sum += row.value(source.index).unwrap_or(0.0);
        }
    }

    Ok(SourceSeries {
        granularity,
        sources: sources.iter().map(|s| s.name.clone()).collect(),
        rows: buckets
            .into_iter()
            .map(|(bucket, values)| SourceSeriesRow {
                bucket,
                label: bucket.label(),
                values,
            })
            .collect(),
    })
}

/// Mean load per calendar month, for months that have data.
pub fn monthly_profile(consumption: &ConsumptionTable) -> Vec<MonthlyProfileRow> {
    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for row in &consumption.rows {
        if let (Some(cal), Some(load)) = (row.calendar(), row.total_load) {
            by_month.entry(cal.month).or_default().push(load);
        }
    }

    by_month
        .into_iter()
        .map(|(month, loads)| MonthlyProfileRow {
            month,
            month_name: MONTH_NAMES[(month - 1) as usize],
            mean_consumption: mean(&loads),
        })
        .collect()
}

/// Mean load per weekday, Monday first.
pub fn weekday_profile(consumption: &ConsumptionTable) -> Vec<WeekdayProfileRow> {
    let mut by_day: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for row in &consumption.rows {
        if let (Some(cal), Some(load)) = (row.calendar(), row.total_load) {
            by_day
                .entry(cal.weekday.num_days_from_monday())
                .or_default()
                .push(load);
        }
    }

    by_day
        .into_iter()
        .map(|(day, loads)| WeekdayProfileRow {
            weekday: WEEKDAY_NAMES[day as usize],
            mean_consumption: mean(&loads),
        })
        .collect()
}

/// Generation as a percentage of consumption for each trend row.
pub fn ratio_series(rows: &[TrendRow]) -> Vec<RatioPoint> {
    rows.iter()
        .map(|r| RatioPoint {
            label: r.label.clone(),
            ratio_pct: match (r.generation, r.consumption) {
                (Some(g), Some(c)) if c != 0.0 => Some(g / c * 100.0),
                _ => None,
            },
        })
        .collect()
}

/// Classifies the mean ratio as a deficit (below 100%) or a surplus.
pub fn balance_insight(ratios: &[RatioPoint]) -> Option<BalanceInsight> {
    let present: Vec<f64> = ratios.iter().filter_map(|r| r.ratio_pct).collect();
    if present.is_empty() {
        return None;
    }
    let avg = mean(&present);
    Some(if avg < 100.0 {
        BalanceInsight::Deficit { coverage_pct: avg }
    } else {
        BalanceInsight::Surplus {
            excess_pct: avg - 100.0,
        }
    })
}

/// Percentage change per source from the first to the last bucket.
///
/// Sources starting at zero are skipped.
pub fn source_changes(series: &SourceSeries) -> Vec<SourceChange> {
    let (Some(first), Some(last)) = (series.rows.first(), series.rows.last()) else {
        return Vec::new();
    };
    if series.rows.len() < 2 {
        return Vec::new();
    }

    series
        .sources
        .iter()
        .enumerate()
        .filter(|(i, _)| first.values[*i] != 0.0)
        .map(|(i, source)| SourceChange {
            source: source.clone(),
            change_pct: (last.values[i] - first.values[i]) / first.values[i] * 100.0,
        })
        .collect()
}

pub fn fastest_growing(changes: &[SourceChange]) -> Option<&SourceChange> {
    changes
        .iter()
        .max_by(|a, b| a.change_pct.total_cmp(&b.change_pct))
}

pub fn fastest_declining(changes: &[SourceChange]) -> Option<&SourceChange> {
    changes
        .iter()
        .min_by(|a, b| a.change_pct.total_cmp(&b.change_pct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_timestamp;

    fn catalog() -> SourceCatalog {
        SourceCatalog::from_headers([
            "Solar [MWh] Calculated resolutions",
            "Wind Onshore [MWh] Calculated resolutions",
        ])
    }

    fn generation(rows: &[(&str, f64, f64)]) -> GenerationTable {
        GenerationTable {
            catalog: catalog(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, (ts, solar, wind))| {
                    GenerationRecord::new(
                        i + 1,
                        parse_timestamp(ts),
                        None,
                        vec![Some(*solar), Some(*wind)],
                    )
                })
                .collect(),
        }
    }

    fn consumption(rows: &[(&str, f64)]) -> ConsumptionTable {
        ConsumptionTable {
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, (ts, load))| ConsumptionRecord::new(i + 1, parse_timestamp(ts), Some(*load)))
                .collect(),
        }
    }

    fn all() -> Vec<String> {
        vec!["Solar".to_string(), "Wind Onshore".to_string()]
    }

    #[test]
    fn test_monthly_trends_sum_and_label() {
        let g = generation(&[
            ("2023-01-01 00:00:00", 50.0, 5.0),
            ("2023-01-02 00:00:00", 10.0, 5.0),
            ("2023-02-01 00:00:00", 60.0, 0.0),
        ]);
        let c = consumption(&[
            ("2023-01-01 00:00:00", 100.0),
            ("2023-01-02 00:00:00", 20.0),
            ("2023-02-01 00:00:00", 120.0),
        ]);
        let rows = trends(&g, &c, &["Solar".to_string()], Granularity::Monthly).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "2023-01");
        assert_eq!(rows[0].consumption, Some(120.0));
        assert_eq!(rows[0].generation, Some(60.0));
        assert_eq!(rows[1].generation, Some(60.0));
    }

    #[test]
    fn test_missing_bucket_is_none_not_zero() {
        let g = generation(&[("2023-01-01 00:00:00", 1.0, 1.0)]);
        let c = consumption(&[("2023-01-01 00:00:00", 5.0), ("2023-04-01 00:00:00", 7.0)]);
        let rows = trends(&g, &c, &all(), Granularity::Quarterly).unwrap();
        assert_eq!(rows[0].label, "2023 Q1");
        assert_eq!(rows[1].label, "2023 Q2");
        assert_eq!(rows[1].consumption, Some(7.0));
        assert_eq!(rows[1].generation, None);
    }

    #[test]
    fn test_key_alignment_ignores_row_order() {
        let g = generation(&[("2024-01-01 00:00:00", 3.0, 0.0), ("2023-01-01 00:00:00", 2.0, 0.0)]);
        let c = consumption(&[("2023-06-01 00:00:00", 10.0), ("2024-06-01 00:00:00", 20.0)]);
        let rows = trends(&g, &c, &["Solar".to_string()], Granularity::Yearly).unwrap();
        assert_eq!(rows[0].label, "2023");
        assert_eq!((rows[0].consumption, rows[0].generation), (Some(10.0), Some(2.0)));
        assert_eq!((rows[1].consumption, rows[1].generation), (Some(20.0), Some(3.0)));
    }

    #[test]
    fn test_sum_of_parts_equals_whole() {
        let g = generation(&[
            ("2022-03-01 00:00:00", 1.5, 2.0),
            ("2022-07-01 00:00:00", 2.5, 3.0),
            ("2023-11-01 00:00:00", 4.0, 1.0),
        ]);
        let c = consumption(&[
            ("2022-03-01 00:00:00", 10.0),
            ("2022-07-01 00:00:00", 11.0),
            ("2023-11-01 00:00:00", 12.0),
        ]);
        for granularity in [Granularity::Monthly, Granularity::Quarterly, Granularity::Yearly] {
            let rows = trends(&g, &c, &all(), granularity).unwrap();
            let cons: f64 = rows.iter().filter_map(|r| r.consumption).sum();
            let generation: f64 = rows.iter().filter_map(|r| r.generation).sum();
            assert_eq!(cons, 33.0);
            assert_eq!(generation, 14.0);
        }
    }

    #[test]
    fn test_daily_pairs_by_position() {
        let g = generation(&[("2023-01-01 00:00:00", 1.0, 2.0), ("2023-01-01 01:00:00", 3.0, 4.0)]);
        let c = consumption(&[("2023-01-01 00:00:00", 9.0), ("2023-01-01 01:00:00", 8.0)]);
        let rows = trends(&g, &c, &all(), Granularity::Daily).unwrap();
        assert_eq!(rows[0].label, "2023-01-01 00:00:00");
        assert_eq!(rows[0].generation, Some(3.0));
        assert_eq!(rows[1].generation, Some(7.0));
    }

    #[test]
    fn test_daily_length_mismatch_leaves_generation_empty() {
        let g = generation(&[("2023-01-01 00:00:00", 1.0, 2.0)]);
        let c = consumption(&[("2023-01-01 00:00:00", 9.0), ("2023-01-01 01:00:00", 8.0)]);
        let rows = trends(&g, &c, &all(), Granularity::Daily).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.generation.is_none()));
        assert_eq!(rows[1].consumption, Some(8.0));
    }

    #[test]
    fn test_unknown_source_is_compute_failure() {
        let g = generation(&[]);
        let err = trends(&g, &consumption(&[]), &["Nuclear".to_string()], Granularity::Monthly)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ComputeFailure);
    }

    #[test]
    fn test_source_totals() {
        let g = generation(&[("2023-01-01 00:00:00", 1.0, 2.0), ("2023-02-01 00:00:00", 3.0, 4.0)]);
        let totals = source_totals(&g, &all()).unwrap();
        assert_eq!(totals[0].source, "Solar");
        assert_eq!(totals[0].generation_mwh, 4.0);
        assert_eq!(totals[1].source, "Wind Onshore");
        assert_eq!(totals[1].generation_mwh, 6.0);
    }

    #[test]
    fn test_source_time_series_and_changes() {
        let g = generation(&[
            ("2023-01-01 00:00:00", 10.0, 0.0),
            ("2023-01-02 00:00:00", 10.0, 0.0),
            ("2023-02-01 00:00:00", 30.0, 5.0),
        ]);
        let series = source_time_series(&g, &all(), Granularity::Monthly).unwrap();
        assert_eq!(series.sources, all());
        assert_eq!(series.rows.len(), 2);
        assert_eq!(series.rows[0].values, vec![20.0, 0.0]);
        assert_eq!(series.rows[1].label, "2023-02");

        let changes = source_changes(&series);
        // Wind starts at zero and is skipped.
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_pct, 50.0);
        assert_eq!(fastest_growing(&changes).unwrap().source, "Solar");
        assert_eq!(fastest_declining(&changes).unwrap().source, "Solar");
    }

    #[test]
    fn test_profiles() {
        let c = consumption(&[
            ("2024-01-01 00:00:00", 10.0), // Monday
            ("2024-01-08 00:00:00", 20.0), // Monday
            ("2024-03-03 00:00:00", 6.0),  // Sunday
        ]);
        let months = monthly_profile(&c);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month_name, "January");
        assert_eq!(months[0].mean_consumption, 15.0);
        assert_eq!(months[1].month, 3);

        let days = weekday_profile(&c);
        assert_eq!(days[0].weekday, "Monday");
        assert_eq!(days[0].mean_consumption, 15.0);
        assert_eq!(days[1].weekday, "Sunday");
    }

    #[test]
    fn test_ratio_and_balance() {
        let row = |label: &str, c: Option<f64>, g: Option<f64>| TrendRow {
            bucket: BucketKey::Year(2023),
            label: label.to_string(),
            consumption: c,
            generation: g,
        };
        let rows = vec![
            row("a", Some(100.0), Some(50.0)),
            row("b", Some(100.0), Some(70.0)),
            row("c", Some(0.0), Some(10.0)),
            row("d", Some(100.0), None),
        ];
        let ratios = ratio_series(&rows);
        assert_eq!(ratios[0].ratio_pct, Some(50.0));
        assert_eq!(ratios[2].ratio_pct, None);
        assert_eq!(ratios[3].ratio_pct, None);
        assert_eq!(
            balance_insight(&ratios),
            Some(BalanceInsight::Deficit { coverage_pct: 60.0 })
        );

        let surplus = ratio_series(&[row("x", Some(100.0), Some(125.0))]);
        assert_eq!(
            balance_insight(&surplus),
            Some(BalanceInsight::Surplus { excess_pct: 25.0 })
        );
        assert_eq!(balance_insight(&[]), None);
    }
}
