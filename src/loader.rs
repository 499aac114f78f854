//! Locates and parses the CSV snapshots.
//!
//! [`DataLoader`] searches a fixed list of directories for each file by name,
//! then parses it through a content-keyed [`LoadCache`].

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use crate::cache::{Fingerprint, LoadCache};
use crate::error::{PipelineError, PipelineResult};
use crate::prediction::{self, PredictionModel, PredictionRow, PredictionTable};
use crate::record::{
    ConsumptionRecord, ConsumptionTable, EnergyData, GenerationRecord, GenerationTable,
    parse_number, parse_timestamp,
};
use crate::schema::{
    CONSUMPTION_COLUMN, CONSUMPTION_FILE, END_DATE_COLUMN, GENERATION_FILE, PREDICTION_FILE,
    START_DATE_COLUMN, SourceCatalog, UNIT_MARKER,
};

pub struct DataLoader {
    search_dirs: Vec<PathBuf>,
    energy_cache: Arc<LoadCache<EnergyData>>,
    prediction_cache: Arc<LoadCache<PredictionTable>>,
}

impl DataLoader {
    pub fn new(
        search_dirs: Vec<PathBuf>,
        energy_cache: Arc<LoadCache<EnergyData>>,
        prediction_cache: Arc<LoadCache<PredictionTable>>,
    ) -> Self {
        Self {
            search_dirs,
            energy_cache,
            prediction_cache,
        }
    }

    /// Loader with private caches using the default TTL.
    pub fn with_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self::new(
            search_dirs,
            Arc::new(LoadCache::default()),
            Arc::new(LoadCache::default()),
        )
    }

    /// Returns the first candidate directory's copy of `file_name`.
    pub fn locate(&self, file_name: &str) -> PipelineResult<PathBuf> {
        for dir in &self.search_dirs {
            let path = dir.join(file_name);
            if path.is_file() {
                debug!(path = %path.display(), "Located input file");
                return Ok(path);
            }
            debug!(dir = %dir.display(), file_name, "Checked location");
        }
        Err(PipelineError::DataUnavailable(format!(
            "could not find {file_name} in any of {:?}",
            self.search_dirs
        )))
    }

    /// Loads the generation and consumption tables.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> PipelineResult<Arc<EnergyData>> {
        let gen_path = self.locate(GENERATION_FILE)?;
        let cons_path = self.locate(CONSUMPTION_FILE)?;
        let gen_bytes = read_file(&gen_path)?;
        let cons_bytes = read_file(&cons_path)?;

        let key = Fingerprint::of([
            (GENERATION_FILE, gen_bytes.as_slice()),
            (CONSUMPTION_FILE, cons_bytes.as_slice()),
        ]);

        self.energy_cache.get_or_load(key, || -> PipelineResult<EnergyData> {
            let generation = parse_generation(gen_bytes.as_slice())?;
            let consumption = parse_consumption(cons_bytes.as_slice())?;
            info!(
                generation_rows = generation.len(),
                consumption_rows = consumption.len(),
                sources = generation.catalog.len(),
                dir = %gen_path.parent().unwrap_or(Path::new(".")).display(),
                "Loaded energy data"
            );
            Ok(EnergyData {
                generation,
                consumption,
            })
        })
    }

    /// Loads the precomputed prediction table.
    #[tracing::instrument(skip(self))]
    pub fn load_predictions(&self) -> PipelineResult<Arc<PredictionTable>> {
        let path = self.locate(PREDICTION_FILE)?;
        let bytes = read_file(&path)?;
        let key = Fingerprint::of([(PREDICTION_FILE, bytes.as_slice())]);

        self.prediction_cache.get_or_load(key, || -> PipelineResult<PredictionTable> {
            let table = parse_predictions(bytes.as_slice())?;
            info!(
                rows = table.len(),
                value_column = %table.value_column,
                path = %path.display(),
                "Loaded prediction data"
            );
            Ok(table)
        })
    }
}

fn read_file(path: &Path) -> PipelineResult<Vec<u8>> {
    fs::read(path).map_err(|e| PipelineError::DataUnavailable(format!("{}: {e}", path.display())))
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new().trim(Trim::Headers).from_reader(reader)
}

fn headers<R: Read>(rdr: &mut csv::Reader<R>, context: &str) -> PipelineResult<StringRecord> {
    rdr.headers()
        .cloned()
        .map_err(|e| PipelineError::parse(context, e))
}

fn column(headers: &StringRecord, name: &str, context: &str) -> PipelineResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PipelineError::parse(context, format!("missing column '{name}'")))
}

/// Parses a generation CSV; every header containing the unit marker
/// becomes a source.
pub fn parse_generation<R: Read>(reader: R) -> PipelineResult<GenerationTable> {
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, GENERATION_FILE)?;
    let start_idx = column(&headers, START_DATE_COLUMN, GENERATION_FILE)?;
    let end_idx = headers.iter().position(|h| h == END_DATE_COLUMN);

    let catalog = SourceCatalog::from_headers(headers.iter());
    let value_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains(UNIT_MARKER))
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    let mut undated = 0usize;
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| PipelineError::parse(GENERATION_FILE, e))?;
        let start = record.get(start_idx).and_then(parse_timestamp);
        if start.is_none() {
            undated += 1;
        }
        let end = end_idx
            .and_then(|idx| record.get(idx))
            .and_then(parse_timestamp);
        let values = value_idx
            .iter()
            .map(|&idx| record.get(idx).and_then(parse_number))
            .collect();
        rows.push(GenerationRecord::new(i + 1, start, end, values));
    }

    if undated > 0 {
        warn!(undated, file = GENERATION_FILE, "Rows with unparseable start date");
    }

    Ok(GenerationTable { catalog, rows })
}

pub fn parse_consumption<R: Read>(reader: R) -> PipelineResult<ConsumptionTable> {
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, CONSUMPTION_FILE)?;
    let start_idx = column(&headers, START_DATE_COLUMN, CONSUMPTION_FILE)?;
    let load_idx = column(&headers, CONSUMPTION_COLUMN, CONSUMPTION_FILE)?;

    let mut rows = Vec::new();
    let mut undated = 0usize;
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| PipelineError::parse(CONSUMPTION_FILE, e))?;
        let start = record.get(start_idx).and_then(parse_timestamp);
        if start.is_none() {
            undated += 1;
        }
        let load = record.get(load_idx).and_then(parse_number);
        rows.push(ConsumptionRecord::new(i + 1, start, load));
    }

    if undated > 0 {
        warn!(undated, file = CONSUMPTION_FILE, "Rows with unparseable start date");
    }

    Ok(ConsumptionTable { rows })
}

/// Parses a prediction CSV, guessing the value column and synthesizing a
/// daily axis from 2020-01-01 when there is no date column.
pub fn parse_predictions<R: Read>(reader: R) -> PipelineResult<PredictionTable> {
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, PREDICTION_FILE)?;
    let names: Vec<&str> = headers.iter().collect();

    let value_column = prediction::resolve_value_column(&names)?;
    if !prediction::VALUE_COLUMNS.contains(&value_column.as_str()) {
        info!(column = %value_column, "Using fallback column as forecast values");
    }
    let value_idx = column(&headers, &value_column, PREDICTION_FILE)?;
    let date_idx = names.iter().position(|h| *h == prediction::DATE_COLUMN);
    let lower_idx = names.iter().position(|h| *h == "lower");
    let upper_idx = names.iter().position(|h| *h == "upper");

    let records: Vec<StringRecord> = rdr
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| PipelineError::parse(PREDICTION_FILE, e))?;

    let dates: Vec<_> = match date_idx {
        Some(idx) => records
            .iter()
            .map(|r| r.get(idx).and_then(parse_timestamp))
            .collect(),
        None => prediction::synthetic_dates(records.len())
            .into_iter()
            .map(Some)
            .collect(),
    };

    let cell = |r: &StringRecord, idx: Option<usize>| idx.and_then(|i| r.get(i)).and_then(parse_number);

    let rows = records
        .iter()
        .zip(dates)
        .map(|(r, date)| PredictionRow {
            date,
            forecast: cell(r, Some(value_idx)),
            lower: cell(r, lower_idx),
            upper: cell(r, upper_idx),
        })
        .collect();

    Ok(PredictionTable {
        model: PredictionModel::Csv,
        value_column,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::env;

    const GENERATION: &str = "\
Start date,End date,Solar [MWh] Calculated resolutions,Lignite [MWh] Calculated resolutions
2023-01-01 00:00:00,2023-01-01 01:00:00,50,10
bogus,2023-01-01 02:00:00,-,20
";

    const CONSUMPTION: &str = "\
Start date,Total (grid load) [MWh] Calculated resolutions
2023-01-01 00:00:00,100
2023-01-01 01:00:00,n/a
";

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("energy_dashboard_loader_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_generation_builds_catalog_and_ids() {
        let table = parse_generation(GENERATION.as_bytes()).unwrap();
        assert_eq!(table.catalog.names(), vec!["Solar", "Lignite"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].id, 1);
        assert_eq!(table.rows[1].id, 2);
        assert_eq!(table.rows[0].values, vec![Some(50.0), Some(10.0)]);
        assert!(table.rows[0].end_time.is_some());
    }

    #[test]
    fn test_unparseable_dates_keep_row_without_calendar() {
        let table = parse_generation(GENERATION.as_bytes()).unwrap();
        let row = &table.rows[1];
        assert!(row.start_time().is_none());
        assert!(row.calendar().is_none());
        assert_eq!(row.values, vec![None, Some(20.0)]);
    }

    #[test]
    fn test_parse_consumption_coerces_load() {
        let table = parse_consumption(CONSUMPTION.as_bytes()).unwrap();
        assert_eq!(table.rows[0].total_load, Some(100.0));
        assert_eq!(table.rows[1].total_load, None);
        assert_eq!(table.rows[1].calendar().unwrap().year, 2023);
    }

    #[test]
    fn test_missing_column_is_parse_failure() {
        let err = parse_consumption("Start date,Other\n2023-01-01,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_ragged_csv_is_parse_failure() {
        let err = parse_consumption(
            "Start date,Total (grid load) [MWh] Calculated resolutions\n2023-01-01,1,extra\n"
                .as_bytes(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_parse_predictions_without_date_column() {
        let table = parse_predictions("idx,Residual load\n0,1.5\n1,2.5\n".as_bytes()).unwrap();
        assert_eq!(table.value_column, "Residual load");
        assert_eq!(table.rows[1].forecast, Some(2.5));
        assert_eq!(
            table.rows[1].date.unwrap().to_string(),
            "2020-01-02 00:00:00"
        );
    }

    #[test]
    fn test_parse_predictions_with_dates_and_band() {
        let table = parse_predictions(
            "Date,forecast,lower,upper\n2025-06-01,10,9,11\nbad,12,,\n".as_bytes(),
        )
        .unwrap();
        assert_eq!(table.rows[0].lower, Some(9.0));
        assert_eq!(table.rows[0].upper, Some(11.0));
        assert!(table.rows[1].date.is_none());
        assert_eq!(table.dated().len(), 1);
    }

    #[test]
    fn test_locate_reports_data_unavailable() {
        let dir = temp_dir("missing");
        let loader = DataLoader::with_dirs(vec![dir.join("nope"), dir]);
        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn test_load_searches_dirs_and_caches() {
        let empty = temp_dir("search_empty");
        let dir = temp_dir("search_data");
        fs::write(dir.join(GENERATION_FILE), GENERATION).unwrap();
        fs::write(dir.join(CONSUMPTION_FILE), CONSUMPTION).unwrap();

        let loader = DataLoader::with_dirs(vec![empty, dir.clone()]);
        let first = loader.load().unwrap();
        let second = loader.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.consumption.len(), 2);

        // Editing a file changes the fingerprint and forces a reparse.
        fs::write(
            dir.join(CONSUMPTION_FILE),
            format!("{CONSUMPTION}2023-01-01 02:00:00,90\n"),
        )
        .unwrap();
        let third = loader.load().unwrap();
        assert_eq!(third.consumption.len(), 3);

        fs::remove_dir_all(&dir).unwrap();
    }
}
