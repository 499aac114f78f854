use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cache::{Fingerprint, LoadCache};
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::{HttpClient, fetch_json};
use crate::prediction::{
    DATE_COLUMN, PredictionModel, PredictionRow, PredictionTable, resolve_value_column,
    synthetic_dates,
};
use crate::record::{parse_number, parse_timestamp};
use crate::services::prediction_api::PredictionApi;

pub const DEFAULT_API_URL: &str = "https://bettersave-296473938693.europe-west10.run.app/predict";

const CONFIDENCE_INTERVAL: &str = "confidence_interval";
const LOWER_BOUND_KEY: &str = "lower Residual load";
const UPPER_BOUND_KEY: &str = "upper Residual load";
const LOWER: &str = "lower";
const UPPER: &str = "upper";

/// Client for the hosted residual-load prediction service.
///
/// Successful responses are cached per step count for the cache TTL.
pub struct PredictionServiceClient<C> {
    client: C,
    url: String,
    cache: LoadCache<PredictionTable>,
}

impl<C: HttpClient> PredictionServiceClient<C> {
    pub fn new(client: C, url: impl Into<String>, cache: LoadCache<PredictionTable>) -> Self {
        Self {
            client,
            url: url.into(),
            cache,
        }
    }

    /// Requests a `steps`-day prediction, bypassing the cache.
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn request(&self, steps: usize) -> Result<PredictionTable> {
        let body = fetch_json(&self.client, &self.url, &[("steps", steps.to_string())]).await?;
        Ok(parse_prediction_response(body)?)
    }

    fn cache_key(&self, steps: usize) -> Fingerprint {
        let steps = steps.to_le_bytes();
        Fingerprint::of([(self.url.as_str(), &steps[..])])
    }
}

#[async_trait]
impl<C: HttpClient> PredictionApi for PredictionServiceClient<C> {
    async fn fetch(&self, steps: usize) -> Option<PredictionTable> {
        let key = self.cache_key(steps);
        if let Some(hit) = self.cache.get(key) {
            return Some((*hit).clone());
        }

        match self.request(steps).await {
            Ok(table) => {
                info!(steps, rows = table.len(), "Prediction service responded");
                Some((*self.cache.insert(key, table)).clone())
            }
            Err(e) => {
                warn!(steps, error = %e, "Prediction service unavailable");
                None
            }
        }
    }
}

/// Decodes a prediction service body.
///
/// The body is an object of columns. Each column is either an array or an
/// index-keyed object. Bounds nested under `confidence_interval` are lifted
/// to `lower`/`upper`, and a daily axis from 2020-01-01 is synthesized when
/// the body has no `Date` column.
pub fn parse_prediction_response(body: Value) -> PipelineResult<PredictionTable> {
    let Value::Object(mut data) = body else {
        return Err(PipelineError::ParseFailure(
            "prediction response is not a JSON object".to_string(),
        ));
    };

    if let Some(Value::Object(interval)) = data.remove(CONFIDENCE_INTERVAL) {
        for (from, to) in [(LOWER_BOUND_KEY, LOWER), (UPPER_BOUND_KEY, UPPER)] {
            if let Some(bound) = interval.get(from) {
                data.insert(to.to_string(), bound.clone());
            }
        }
    }

    let value_column = {
        let mut headers = vec![DATE_COLUMN];
        headers.extend(
            data.keys()
                .map(String::as_str)
                .filter(|k| ![DATE_COLUMN, LOWER, UPPER].contains(k)),
        );
        resolve_value_column(&headers)?
    };

    let values = column(&data, &value_column).ok_or_else(|| {
        PipelineError::ParseFailure(format!("prediction column {value_column:?} is not a series"))
    })?;
    let dates: Vec<Option<NaiveDateTime>> = match column(&data, DATE_COLUMN) {
        Some(cells) => cells.into_iter().map(date_cell).collect(),
        None => synthetic_dates(values.len()).into_iter().map(Some).collect(),
    };
    let lower = column(&data, LOWER);
    let upper = column(&data, UPPER);

    let bound = |series: &Option<Vec<&Value>>, i: usize| {
        series.as_ref().and_then(|s| s.get(i)).and_then(|v| number_cell(v))
    };

    let rows = values
        .iter()
        .enumerate()
        .map(|(i, v)| PredictionRow {
            date: dates.get(i).copied().flatten(),
            forecast: number_cell(v),
            lower: bound(&lower, i),
            upper: bound(&upper, i),
        })
        .collect();

    Ok(PredictionTable {
        model: PredictionModel::Api,
        value_column,
        rows,
    })
}

/// Cells of one column in row order.
fn column<'a>(data: &'a Map<String, Value>, name: &str) -> Option<Vec<&'a Value>> {
    match data.get(name)? {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(cells) => {
            let mut entries: Vec<(&String, &Value)> = cells.iter().collect();
            if entries.iter().all(|(k, _)| k.parse::<usize>().is_ok()) {
                entries.sort_by_key(|(k, _)| k.parse::<usize>().unwrap_or(usize::MAX));
            }
            Some(entries.into_iter().map(|(_, v)| v).collect())
        }
        _ => None,
    }
}

fn number_cell(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Strings in any accepted timestamp format, or epoch milliseconds.
fn date_cell(v: &Value) -> Option<NaiveDateTime> {
    match v {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}
