//! CLI entry point for the energy dashboard.
//!
//! Loads the generation and consumption snapshots, applies the year/month
//! filter and runs one analysis per subcommand. Results are logged and can
//! be written to CSV or JSON with `--output`.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use energy_dashboard::analyzers::aggregate::{
    balance_insight, fastest_declining, fastest_growing, monthly_profile, ratio_series,
    source_changes, source_time_series, source_totals, trends, weekday_profile,
};
use energy_dashboard::analyzers::anomaly::detect;
use energy_dashboard::analyzers::forecast::forecast;
use energy_dashboard::analyzers::impact::{ELECTRIC_VEHICLES, impact, summarize_predictions, vehicle};
use energy_dashboard::analyzers::summary::{data_statistics, summarize};
use energy_dashboard::analyzers::types::{BalanceInsight, Granularity};
use energy_dashboard::cache::LoadCache;
use energy_dashboard::config::Settings;
use energy_dashboard::fetch::BasicClient;
use energy_dashboard::filter::{Selection, filter, year_bounds};
use energy_dashboard::infra::prediction::client::PredictionServiceClient;
use energy_dashboard::loader::DataLoader;
use energy_dashboard::output::{self, DEFAULT_PAGE_SIZE, paginate};
use energy_dashboard::prediction::{PredictionModel, PredictionTable};
use energy_dashboard::record::{ConsumptionTable, GenerationTable};
use energy_dashboard::schema::is_renewable;
use energy_dashboard::services::prediction_api::PredictionApi;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Anomaly threshold in standard deviations.
const ANOMALY_THRESHOLD: f64 = 2.5;

/// Symmetric band put around the fallback forecast.
const FALLBACK_BAND: f64 = 0.10;

#[derive(Parser)]
#[command(name = "energy_dashboard")]
#[command(about = "Analyze and forecast energy generation and consumption", long_about = None)]
struct Cli {
    /// Directory searched before the configured data directories
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// First year to include (default: earliest year in the data)
    #[arg(long)]
    from_year: Option<i32>,

    /// Last year to include (default: latest year in the data)
    #[arg(long)]
    to_year: Option<i32>,

    /// Months to include, e.g. 1,2,12 (default: all)
    #[arg(long, value_delimiter = ',')]
    months: Option<Vec<u32>>,

    /// Generation sources to include (default: all)
    #[arg(long, value_delimiter = ',')]
    sources: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline KPIs for the selected window
    Summary {
        #[command(flatten)]
        filter: FilterArgs,

        /// JSON file to write the metrics to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Consumption vs generation per time bucket
    Trends {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(short, long, default_value = "monthly")]
        granularity: Granularity,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Per-source generation totals and changes over time
    Sources {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(short, long, default_value = "monthly")]
        granularity: Granularity,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Flag consumption values far from their rolling mean
    Anomalies {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(short, long, default_value = "daily")]
        granularity: Granularity,

        /// Rolling window (default: 30 daily, 7 monthly, 3 otherwise)
        #[arg(short, long)]
        window: Option<usize>,

        #[arg(short, long, default_value_t = ANOMALY_THRESHOLD)]
        threshold: f64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Seasonal-repeat forecast of monthly consumption
    Forecast {
        #[command(flatten)]
        filter: FilterArgs,

        /// Number of 30-day steps to project
        #[arg(short, long, default_value_t = 12)]
        periods: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Energy surplus prediction with real-world impact figures
    Predict {
        #[arg(short, long, value_enum, default_value_t = ModelChoice::Csv)]
        model: ModelChoice,

        /// Days to predict
        #[arg(short, long, default_value_t = 30)]
        days: usize,

        /// Electric vehicle used for the charging equivalent
        #[arg(long, default_value = "Tesla Model 3")]
        vehicle: String,

        /// Page of the prediction table to log
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a filtered table to CSV or JSON
    Export {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(value_enum)]
        table: ExportTable,

        #[arg(short, long, default_value = "monthly")]
        granularity: Granularity,

        /// Destination; a .json extension selects JSON records
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List generation sources found in the data
    ListSources,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelChoice {
    Csv,
    Api,
}

impl ModelChoice {
    /// Only the CSV model is replaced by the banded seasonal forecast when
    /// it yields nothing.
    fn falls_back(self) -> bool {
        matches!(self, ModelChoice::Csv)
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportTable {
    Consumption,
    Generation,
    Trends,
    SourceTotals,
    Statistics,
}

/// Filtered tables plus the resolved source selection.
struct Window {
    generation: GenerationTable,
    consumption: ConsumptionTable,
    sources: Vec<String>,
}

#[derive(Serialize)]
struct AnomalyRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Consumption")]
    consumption: f64,
    rolling_mean: f64,
    rolling_std: f64,
    lower_bound: f64,
    upper_bound: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/energy_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("energy_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(dir) = cli.data_dir {
        settings.prepend_data_dir(dir);
    }
    let loader = DataLoader::new(
        settings.data_dirs.clone(),
        Arc::new(LoadCache::new(settings.cache_ttl)),
        Arc::new(LoadCache::new(settings.cache_ttl)),
    );

    match cli.command {
        Commands::Summary { filter, output } => {
            let window = select(&loader, &filter)?;
            let metrics = summarize(&window.generation, &window.consumption)?;

            info!(
                total_consumption = metrics.total_consumption,
                total_generation = metrics.total_generation,
                efficiency_ratio = metrics.efficiency_ratio,
                yoy_growth = metrics.yoy_growth,
                peak_consumption = metrics.peak_consumption,
                peak_date = ?metrics.peak_date,
                renewable_percentage = metrics.renewable_percentage,
                highest_quarter = ?metrics.highest_quarter,
                "Summary"
            );
            for row in monthly_profile(&window.consumption) {
                info!(month = row.month_name, mean = row.mean_consumption, "Monthly profile");
            }
            for row in weekday_profile(&window.consumption) {
                info!(weekday = row.weekday, mean = row.mean_consumption, "Weekday profile");
            }
            let statistics = data_statistics(&window.generation, &window.consumption);
            for (series, d) in [
                ("consumption", &statistics.consumption),
                ("generation", &statistics.generation),
            ] {
                info!(
                    series,
                    count = d.count,
                    mean = ?d.mean,
                    std = ?d.std,
                    min = ?d.min,
                    q25 = ?d.q25,
                    median = ?d.median,
                    q75 = ?d.q75,
                    max = ?d.max,
                    "Data statistics"
                );
            }

            if let Some(path) = output {
                output::write_json_records(std::fs::File::create(&path)?, &[&metrics])?;
                info!(path = %path.display(), "Metrics written");
            }
        }
        Commands::Trends {
            filter,
            granularity,
            output,
        } => {
            let window = select(&loader, &filter)?;
            let rows = trends(
                &window.generation,
                &window.consumption,
                &window.sources,
                granularity,
            )?;
            output::print_pretty(&rows);

            let ratios = ratio_series(&rows);
            match balance_insight(&ratios) {
                Some(BalanceInsight::Deficit { coverage_pct }) => {
                    info!(coverage_pct, "Generation covers only part of consumption")
                }
                Some(BalanceInsight::Surplus { excess_pct }) => {
                    info!(excess_pct, "Generation exceeds consumption")
                }
                None => info!("No bucket has both generation and consumption"),
            }
            info!(rows = rows.len(), %granularity, "Trend table built");

            if let Some(path) = output {
                output::save(&path, &rows)?;
                info!(path = %path.display(), "Trends written");
            }
        }
        Commands::Sources {
            filter,
            granularity,
            output,
        } => {
            let window = select(&loader, &filter)?;
            let totals = source_totals(&window.generation, &window.sources)?;
            for total in &totals {
                info!(source = %total.source, generation_mwh = total.generation_mwh, "Source total");
            }

            let series = source_time_series(&window.generation, &window.sources, granularity)?;
            let changes = source_changes(&series);
            if let Some(up) = fastest_growing(&changes) {
                info!(source = %up.source, change_pct = up.change_pct, "Fastest growing source");
            }
            if let Some(down) = fastest_declining(&changes) {
                info!(source = %down.source, change_pct = down.change_pct, "Fastest declining source");
            }

            if let Some(path) = output {
                output::save(&path, &totals)?;
                info!(path = %path.display(), "Source totals written");
            }
        }
        Commands::Anomalies {
            filter,
            granularity,
            window: window_len,
            threshold,
            output,
        } => {
            let window = select(&loader, &filter)?;
            let rows = trends(
                &window.generation,
                &window.consumption,
                &window.sources,
                granularity,
            )?;
            let window_len = window_len.unwrap_or_else(|| default_anomaly_window(granularity));
            let anomalies = detect(&rows, |r| r.consumption, window_len, threshold)?;

            info!(
                count = anomalies.len(),
                window = window_len,
                threshold,
                "Detected anomalies in consumption data"
            );
            let flat: Vec<AnomalyRow> = anomalies
                .iter()
                .map(|a| AnomalyRow {
                    date: a.row.label.clone(),
                    consumption: a.value,
                    rolling_mean: a.rolling_mean,
                    rolling_std: a.rolling_std,
                    lower_bound: a.lower_bound,
                    upper_bound: a.upper_bound,
                })
                .collect();
            for row in &flat {
                info!(date = %row.date, consumption = row.consumption, "Anomaly");
            }

            if let Some(path) = output {
                output::save(&path, &flat)?;
                info!(path = %path.display(), "Anomalies written");
            }
        }
        Commands::Forecast {
            filter,
            periods,
            output,
        } => {
            let window = select(&loader, &filter)?;
            let Some(result) = forecast(&window.consumption, periods) else {
                warn!("Insufficient data for forecasting: at least 12 months of history needed");
                return Ok(());
            };

            info!(
                history_months = result.historical.len(),
                points = result.points.len(),
                split_point = ?result.split_point(),
                change_pct = ?result.change_pct(),
                "Forecast built"
            );
            output::print_pretty(&result.points);

            if let Some(path) = output {
                output::save(&path, &result.points)?;
                info!(path = %path.display(), "Forecast written");
            }
        }
        Commands::Predict {
            model,
            days,
            vehicle: vehicle_name,
            page,
            output,
        } => {
            let Some(ev) = vehicle(&vehicle_name) else {
                let known: Vec<&str> = ELECTRIC_VEHICLES.iter().map(|v| v.model).collect();
                bail!("unknown vehicle {vehicle_name:?}; choose one of {known:?}");
            };

            let table = match model {
                ModelChoice::Api => {
                    let client = PredictionServiceClient::new(
                        BasicClient::with_timeout(Duration::from_secs(30))?,
                        settings.prediction_api_url.clone(),
                        LoadCache::new(settings.cache_ttl),
                    );
                    client.fetch(days).await
                }
                ModelChoice::Csv => match loader.load_predictions() {
                    Ok(table) => Some((*table).clone().head(days)),
                    Err(e) => {
                        warn!(error = %e, "Prediction CSV unavailable");
                        None
                    }
                },
            };
            let table = match table.filter(|t| !t.is_empty()) {
                Some(table) => table,
                None if model.falls_back() => fallback_predictions(&loader, days)?,
                None => {
                    warn!(?model, "No prediction data available");
                    return Ok(());
                }
            };
            let table = table.dated();

            let Some(summary) = summarize_predictions(&table) else {
                warn!(model = %table.model, "Prediction table has no values");
                return Ok(());
            };
            let figures = impact(summary.total_surplus, table.len(), ev);
            info!(
                model = %table.model,
                value_column = %table.value_column,
                total_surplus = summary.total_surplus,
                average_daily = summary.average_daily,
                peak_surplus = summary.peak_surplus,
                peak_date = ?summary.peak_date,
                "Prediction summary"
            );
            info!(
                vehicle = figures.vehicle.model,
                full_charges = figures.full_charges,
                homes_powered = figures.homes_powered,
                co2_avoided_tonnes = figures.co2_avoided_tonnes,
                trees_equivalent = figures.trees_equivalent,
                "Impact"
            );

            let shown = paginate(&table.rows, DEFAULT_PAGE_SIZE, page);
            info!(page = shown.page, total_pages = shown.total_pages, "Prediction rows");
            output::print_json(&shown.rows)?;

            if let Some(path) = output {
                output::save(&path, &table.rows)?;
                info!(path = %path.display(), "Predictions written");
            }
        }
        Commands::Export {
            filter,
            table,
            granularity,
            output,
        } => {
            let window = select(&loader, &filter)?;
            match table {
                ExportTable::Consumption => output::save_consumption(&output, &window.consumption)?,
                ExportTable::Generation => output::save_generation(&output, &window.generation)?,
                ExportTable::Trends => {
                    let rows = trends(
                        &window.generation,
                        &window.consumption,
                        &window.sources,
                        granularity,
                    )?;
                    output::save(&output, &rows)?
                }
                ExportTable::SourceTotals => {
                    output::save(&output, &source_totals(&window.generation, &window.sources)?)?
                }
                ExportTable::Statistics => output::save_statistics(
                    &output,
                    &data_statistics(&window.generation, &window.consumption),
                )?,
            }
            info!(path = %output.display(), ?table, "Export written");
        }
        Commands::ListSources => {
            let data = loader.load()?;
            for source in data.generation.catalog.iter() {
                info!(
                    source = %source.name,
                    column = %source.column,
                    renewable = is_renewable(&source.name),
                    "Source"
                );
            }
            info!(total = data.generation.catalog.len(), "Source list");
        }
    }

    Ok(())
}

/// Loads the data and applies the filter flags; missing bounds default to
/// the years present in the data.
#[tracing::instrument(skip(loader))]
fn select(loader: &DataLoader, args: &FilterArgs) -> Result<Window> {
    let data = loader.load()?;
    let bounds = year_bounds(&data.generation, &data.consumption);

    let from_year = args.from_year.or(bounds.map(|(lo, _)| lo)).unwrap_or(i32::MIN);
    let to_year = args.to_year.or(bounds.map(|(_, hi)| hi)).unwrap_or(i32::MAX);
    if from_year > to_year {
        bail!("--from-year {from_year} is after --to-year {to_year}");
    }

    let months = args.months.clone().unwrap_or_else(|| (1..=12).collect());
    if let Some(bad) = months.iter().find(|m| !(1..=12).contains(*m)) {
        bail!("month {bad} is outside 1-12");
    }

    let sources = args
        .sources
        .clone()
        .unwrap_or_else(|| data.generation.catalog.names());

    let selection = Selection::years(from_year, to_year).with_months(months);
    let (generation, consumption) = filter(&data.generation, &data.consumption, &selection);
    info!(
        from_year,
        to_year,
        generation_rows = generation.len(),
        consumption_rows = consumption.len(),
        sources = sources.len(),
        "Filter applied"
    );

    Ok(Window {
        generation,
        consumption,
        sources,
    })
}

fn default_anomaly_window(granularity: Granularity) -> usize {
    match granularity {
        Granularity::Daily => 30,
        Granularity::Monthly => 7,
        Granularity::Quarterly | Granularity::Yearly => 3,
    }
}

/// Seasonal forecast over all loaded consumption, banded, standing in for a
/// missing prediction table.
fn fallback_predictions(loader: &DataLoader, days: usize) -> Result<PredictionTable> {
    let data = loader
        .load()
        .context("no prediction source available and no consumption data to forecast from")?;
    let result = forecast(&data.consumption, days)
        .context("no prediction source available and too little history to forecast")?;
    let table = result.to_prediction_table(FALLBACK_BAND);
    warn!(model = %PredictionModel::Fallback, rows = table.len(), "Using fallback predictions");
    Ok(table)
}
