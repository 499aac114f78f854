use std::env;
use std::fs;
use std::path::PathBuf;

use energy_dashboard::analyzers::aggregate::{source_totals, trends};
use energy_dashboard::analyzers::summary::summarize;
use energy_dashboard::analyzers::types::Granularity;
use energy_dashboard::error::ErrorKind;
use energy_dashboard::filter::{Selection, filter};
use energy_dashboard::loader::{DataLoader, parse_consumption};
use energy_dashboard::output::write_consumption_csv;
use energy_dashboard::prediction::PredictionModel;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_full_pipeline() {
    let loader = DataLoader::with_dirs(vec![PathBuf::from("/nonexistent"), fixtures()]);
    let data = loader.load().expect("Failed to load fixtures");

    let selection = Selection::years(2023, 2023).with_months(vec![1, 2]);
    let (generation, consumption) = filter(&data.generation, &data.consumption, &selection);

    let rows = trends(
        &generation,
        &consumption,
        &["Solar".to_string()],
        Granularity::Monthly,
    )
    .unwrap();
    let flat: Vec<(&str, Option<f64>, Option<f64>)> = rows
        .iter()
        .map(|r| (r.label.as_str(), r.consumption, r.generation))
        .collect();
    assert_eq!(
        flat,
        vec![
            ("2023-01", Some(100.0), Some(50.0)),
            ("2023-02", Some(120.0), Some(60.0)),
        ]
    );

    let metrics = summarize(&generation, &consumption).unwrap();
    assert_eq!(metrics.efficiency_ratio, 50.0);
    assert_eq!(metrics.peak_consumption, 120.0);
}

#[test]
fn test_sum_of_parts_matches_source_totals() {
    let loader = DataLoader::with_dirs(vec![fixtures()]);
    let data = loader.load().unwrap();
    let sources = data.generation.catalog.names();

    let grand: f64 = source_totals(&data.generation, &sources)
        .unwrap()
        .iter()
        .map(|t| t.generation_mwh)
        .sum();
    for granularity in [Granularity::Monthly, Granularity::Quarterly, Granularity::Yearly] {
        let bucketed: f64 = trends(&data.generation, &data.consumption, &sources, granularity)
            .unwrap()
            .iter()
            .filter_map(|r| r.generation)
            .sum();
        assert!((bucketed - grand).abs() < 1e-9, "{granularity}");
    }
}

#[test]
fn test_consumption_csv_round_trip() {
    let loader = DataLoader::with_dirs(vec![fixtures()]);
    let data = loader.load().unwrap();

    let path = env::temp_dir().join("energy_dashboard_round_trip.csv");
    write_consumption_csv(fs::File::create(&path).unwrap(), &data.consumption).unwrap();
    let back = parse_consumption(fs::File::open(&path).unwrap()).unwrap();

    let pairs = |t: &energy_dashboard::record::ConsumptionTable| -> Vec<_> {
        t.rows.iter().map(|r| (r.start_time(), r.total_load)).collect()
    };
    assert_eq!(pairs(&back), pairs(&data.consumption));

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_prediction_fixture_uses_residual_load() {
    let loader = DataLoader::with_dirs(vec![fixtures()]);
    let table = loader.load_predictions().unwrap();
    assert_eq!(table.model, PredictionModel::Csv);
    assert_eq!(table.value_column, "Residual load");
    assert_eq!(table.len(), 4);
    assert_eq!(table.rows[2].forecast, None);
    assert_eq!(table.rows[3].lower, Some(7.0));
}

#[test]
fn test_missing_directory_is_data_unavailable() {
    let loader = DataLoader::with_dirs(vec![PathBuf::from("/nonexistent")]);
    let err = loader.load().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataUnavailable);
}
