//! Rolling mean/stddev threshold anomaly detection.

use crate::analyzers::utility::rolling;
use crate::error::{PipelineError, PipelineResult};

/// A flagged row together with the rolling statistics that flagged it.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly<T> {
    /// Position of the row in the input series.
    pub index: usize,
    pub row: T,
    pub value: f64,
    pub rolling_mean: f64,
    pub rolling_std: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub anomaly: bool,
}

/// Flags rows whose value lies outside `mean ± threshold * std` of the
/// trailing `window` rows (the row itself included).
///
/// The first `window - 1` rows never have statistics and are never flagged.
/// Rows whose value is missing are skipped.
pub fn detect<T: Clone>(
    rows: &[T],
    value: impl Fn(&T) -> Option<f64>,
    window: usize,
    threshold: f64,
) -> PipelineResult<Vec<Anomaly<T>>> {
    if window == 0 {
        return Err(PipelineError::ComputeFailure(
            "anomaly window must be at least 1".to_string(),
        ));
    }

    let values: Vec<Option<f64>> = rows.iter().map(&value).collect();
    let stats = rolling(&values, window);

    let anomalies = rows
        .iter()
        .zip(values)
        .zip(stats)
        .enumerate()
        .filter_map(|(index, ((row, v), s))| {
            let (v, s) = (v?, s?);
            let upper = s.mean + threshold * s.stddev;
            let lower = s.mean - threshold * s.stddev;
            (v > upper || v < lower).then(|| Anomaly {
                index,
                row: row.clone(),
                value: v,
                rolling_mean: s.mean,
                rolling_std: s.stddev,
                lower_bound: lower,
                upper_bound: upper,
                anomaly: true,
            })
        })
        .collect();

    Ok(anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(values: &[f64], window: usize, threshold: f64) -> Vec<Anomaly<f64>> {
        detect(values, |v| Some(*v), window, threshold).unwrap()
    }

    #[test]
    fn test_spike_is_flagged() {
        let mut values = vec![10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0];
        values.push(100.0);
        let found = run(&values, 4, 1.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 7);
        assert_eq!(found[0].value, 100.0);
        assert!(found[0].anomaly);
        assert!(found[0].upper_bound < 100.0);
    }

    #[test]
    fn test_drop_is_flagged() {
        let values = [10.0, 11.0, 9.0, 10.0, -50.0];
        let found = run(&values, 4, 1.0);
        assert_eq!(found.len(), 1);
        assert!(found[0].value < found[0].lower_bound);
    }

    #[test]
    fn test_warmup_rows_never_flagged() {
        let values = [1000.0, -1000.0, 5000.0, 1.0, 2.0, 3.0];
        let window = 4;
        let found = run(&values, window, 0.0001);
        assert!(found.iter().all(|a| a.index >= window - 1));
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        for threshold in [0.001, 1.0, 2.5] {
            assert!(run(&[0.1; 40], 30, threshold).is_empty());
            assert!(run(&[42.0; 10], 3, threshold).is_empty());
        }
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let rows = [Some(1.0), Some(2.0), None, Some(100.0)];
        let found = detect(&rows, |v| *v, 2, 1.0).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let err = detect(&[1.0], |v| Some(*v), 0, 1.0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ComputeFailure);
    }
}
