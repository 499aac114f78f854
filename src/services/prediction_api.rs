//! Trait for sources of precomputed consumption predictions.

use crate::prediction::PredictionTable;

/// Abstraction over a remote prediction provider.
///
/// Implementations degrade instead of failing: any transport, status or
/// decoding problem is logged and reported as `None`, so callers can fall
/// back to another prediction source.
#[async_trait::async_trait]
pub trait PredictionApi {
    /// Returns a `steps`-day prediction, or `None` when the provider is
    /// unavailable.
    async fn fetch(&self, steps: usize) -> Option<PredictionTable>;
}
