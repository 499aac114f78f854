use serde::Serialize;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the sample standard deviation (n - 1 denominator) given a
/// pre-computed mean. Returns `None` for fewer than two values.
pub fn sample_stddev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    Some(variance.sqrt())
}

/// Sums the present values, skipping missing ones.
pub fn sum_present(values: impl IntoIterator<Item = Option<f64>>) -> f64 {
    values.into_iter().flatten().sum()
}

/// Descriptive statistics of a series: count, mean, sample standard
/// deviation and the five-number summary. Everything but `count` is `None`
/// for an empty series, and `std` is `None` below two values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Quantile `q` of ascending `sorted` values, interpolating linearly between
/// the two nearest ranks.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

pub fn describe(values: &[f64]) -> Describe {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let m = (!values.is_empty()).then(|| mean(values));

    Describe {
        count: values.len(),
        mean: m,
        std: m.and_then(|m| sample_stddev(values, m)),
        min: sorted.first().copied(),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Mean and sample standard deviation of one trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub mean: f64,
    pub stddev: f64,
}

/// Trailing-window statistics for every position.
///
/// A position has statistics only when the `window` values ending at it are
/// all present, so the first `window - 1` positions are always `None`.
pub fn rolling(values: &[Option<f64>], window: usize) -> Vec<Option<RollingStats>> {
    (0..values.len())
        .map(|end| {
            if window == 0 || end + 1 < window {
                return None;
            }
            let slice: Option<Vec<f64>> = values[end + 1 - window..=end].iter().copied().collect();
            let slice = slice?;
            // A constant window is exactly flat; skip the float arithmetic.
            if slice.iter().all(|v| *v == slice[0]) {
                return (window >= 2).then_some(RollingStats {
                    mean: slice[0],
                    stddev: 0.0,
                });
            }
            let m = mean(&slice);
            sample_stddev(&slice, m).map(|stddev| RollingStats { mean: m, stddev })
        })
        .collect()
}
