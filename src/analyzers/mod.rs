//! Dashboard analysis over filtered energy tables.
//!
//! Everything here is a pure function of its inputs: trend aggregation,
//! per-source breakdowns, rolling anomaly detection, the seasonal
//! forecaster, the KPI summary and the prediction impact figures.

pub mod aggregate;
pub mod anomaly;
pub mod forecast;
pub mod impact;
pub mod summary;
pub mod types;
pub mod utility;
