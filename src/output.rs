//! Output formatting and export of dashboard tables.
//!
//! Supports pretty-printing, JSON records and CSV. The consumption and
//! generation writers use the input column names so an export loads back
//! through the parser unchanged.

use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::summary::DataStatistics;
use crate::analyzers::utility::Describe;
use crate::record::{ConsumptionTable, GenerationTable, TIMESTAMP_FORMAT};
use crate::schema::{CONSUMPTION_COLUMN, END_DATE_COLUMN, START_DATE_COLUMN};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes rows as CSV with a header taken from the first row's field names.
pub fn write_csv<T: Serialize, W: Write>(writer: W, rows: &[T]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes rows as a JSON array of objects.
pub fn write_json_records<T: Serialize, W: Write>(mut writer: W, rows: &[T]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.flush()?;
    Ok(())
}

/// Saves rows to `path`, as JSON records when the extension is `.json` and
/// as CSV otherwise.
pub fn save<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = File::create(path)?;
    let is_json = is_json_path(path);
    debug!(path = %path.display(), rows = rows.len(), is_json, "Saving rows");
    if is_json {
        write_json_records(file, rows)
    } else {
        write_csv(file, rows)
    }
}

fn timestamp_cell(ts: Option<chrono::NaiveDateTime>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_consumption_csv<W: Write>(writer: W, table: &ConsumptionTable) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record([START_DATE_COLUMN, CONSUMPTION_COLUMN])?;
    for row in &table.rows {
        writer.write_record([timestamp_cell(row.start_time()), number_cell(row.total_load)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_generation_csv<W: Write>(writer: W, table: &GenerationTable) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let mut header = vec![START_DATE_COLUMN.to_string(), END_DATE_COLUMN.to_string()];
    header.extend(table.catalog.iter().map(|s| s.column.clone()));
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![timestamp_cell(row.start_time()), timestamp_cell(row.end_time)];
        record.extend(table.catalog.iter().map(|s| number_cell(row.value(s.index))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn json_number(value: Option<f64>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, serde_json::Value::from)
}

fn json_timestamp(ts: Option<chrono::NaiveDateTime>) -> serde_json::Value {
    ts.map_or(serde_json::Value::Null, |t| {
        serde_json::Value::from(t.format(TIMESTAMP_FORMAT).to_string())
    })
}

/// Consumption rows as JSON objects keyed by input column name.
pub fn consumption_records(table: &ConsumptionTable) -> Vec<serde_json::Value> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut record = serde_json::Map::new();
            record.insert(START_DATE_COLUMN.to_string(), json_timestamp(row.start_time()));
            record.insert(CONSUMPTION_COLUMN.to_string(), json_number(row.total_load));
            serde_json::Value::Object(record)
        })
        .collect()
}

/// Generation rows as JSON objects keyed by input column name.
pub fn generation_records(table: &GenerationTable) -> Vec<serde_json::Value> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut record = serde_json::Map::new();
            record.insert(START_DATE_COLUMN.to_string(), json_timestamp(row.start_time()));
            record.insert(END_DATE_COLUMN.to_string(), json_timestamp(row.end_time));
            for source in table.catalog.iter() {
                record.insert(source.column.clone(), json_number(row.value(source.index)));
            }
            serde_json::Value::Object(record)
        })
        .collect()
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn save_consumption(path: &Path, table: &ConsumptionTable) -> Result<()> {
    if is_json_path(path) {
        return save(path, &consumption_records(table));
    }
    write_consumption_csv(File::create(path)?, table)
}

pub fn save_generation(path: &Path, table: &GenerationTable) -> Result<()> {
    if is_json_path(path) {
        return save(path, &generation_records(table));
    }
    write_generation_csv(File::create(path)?, table)
}

fn statistics_rows(stats: &DataStatistics) -> [(&'static str, &Describe); 2] {
    [("consumption", &stats.consumption), ("generation", &stats.generation)]
}

/// Writes one CSV row per described series.
pub fn write_statistics_csv<W: Write>(writer: W, stats: &DataStatistics) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["series", "count", "mean", "std", "min", "25%", "50%", "75%", "max"])?;
    for (series, d) in statistics_rows(stats) {
        let mut record = vec![series.to_string(), d.count.to_string()];
        record.extend(
            [d.mean, d.std, d.min, d.q25, d.median, d.q75, d.max]
                .into_iter()
                .map(number_cell),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Statistics as JSON objects with a `series` field naming each row.
pub fn statistics_records(stats: &DataStatistics) -> Result<Vec<serde_json::Value>> {
    statistics_rows(stats)
        .into_iter()
        .map(|(series, d)| -> Result<serde_json::Value> {
            let mut record = serde_json::to_value(d)?;
            if let Some(object) = record.as_object_mut() {
                object.insert("series".to_string(), serde_json::Value::from(series));
            }
            Ok(record)
        })
        .collect()
}

pub fn save_statistics(path: &Path, stats: &DataStatistics) -> Result<()> {
    if is_json_path(path) {
        return save(path, &statistics_records(stats)?);
    }
    write_statistics_csv(File::create(path)?, stats)
}

/// One page of a table.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    pub rows: &'a [T],
    /// 1-based page number actually shown.
    pub page: usize,
    pub total_pages: usize,
}

/// Slices out page `page` (1-based) of `page_size` rows. Out-of-range pages
/// are clamped and an empty table still has one (empty) page.
pub fn paginate<T>(rows: &[T], page_size: usize, page: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = rows.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * page_size).min(rows.len());
    let end = (start + page_size).min(rows.len());
    Page {
        rows: &rows[start..end],
        page,
        total_pages,
    }
}
