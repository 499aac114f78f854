//! Surplus summary and real-world equivalents for a prediction table.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::prediction::PredictionTable;

/// Average household consumption per year, in MWh.
pub const HOME_MWH_PER_YEAR: f64 = 3.5;

/// Trees needed to absorb one tonne of CO2 per year.
pub const TREES_PER_TONNE: f64 = 45.0;

/// kg of CO2 avoided per MWh of surplus.
pub const CO2_KG_PER_MWH: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElectricVehicle {
    pub model: &'static str,
    pub battery_kwh: f64,
}

pub static ELECTRIC_VEHICLES: &[ElectricVehicle] = &[
    ElectricVehicle { model: "Audi e-tron 55 quattro", battery_kwh: 95.0 },
    ElectricVehicle { model: "Tesla Model 3", battery_kwh: 60.0 },
    ElectricVehicle { model: "Nissan Leaf", battery_kwh: 40.0 },
    ElectricVehicle { model: "BMW i3", battery_kwh: 42.2 },
    ElectricVehicle { model: "Volkswagen ID.4", battery_kwh: 77.0 },
];

pub fn vehicle(model: &str) -> Option<&'static ElectricVehicle> {
    ELECTRIC_VEHICLES.iter().find(|v| v.model.eq_ignore_ascii_case(model))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub total_surplus: f64,
    pub average_daily: f64,
    pub peak_surplus: f64,
    pub peak_date: Option<NaiveDateTime>,
}

/// Totals over the forecast values. `None` when no row has a value.
pub fn summarize_predictions(table: &PredictionTable) -> Option<PredictionSummary> {
    let values: Vec<(f64, Option<NaiveDateTime>)> = table
        .rows
        .iter()
        .filter_map(|r| r.forecast.map(|v| (v, r.date)))
        .collect();
    let (peak_surplus, peak_date) = values
        .iter()
        .copied()
        .fold(None, |best: Option<(f64, Option<NaiveDateTime>)>, (v, d)| match best {
            Some((b, _)) if b >= v => best,
            _ => Some((v, d)),
        })?;
    let total_surplus: f64 = values.iter().map(|(v, _)| v).sum();

    Some(PredictionSummary {
        total_surplus,
        average_daily: total_surplus / values.len() as f64,
        peak_surplus,
        peak_date,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Impact {
    pub vehicle: ElectricVehicle,
    pub full_charges: u64,
    pub homes_powered: u64,
    pub co2_avoided_tonnes: f64,
    pub trees_equivalent: u64,
}

/// Months covered by `days` daily rows, with a floor of one month.
fn months_covered(days: usize) -> f64 {
    if days > 30 { days as f64 / 30.0 } else { 1.0 }
}

/// Equivalents of `total_mwh` of surplus spread over `days` rows. Counts are
/// truncated toward zero and negative surplus gives zero.
pub fn impact(total_mwh: f64, days: usize, vehicle: &ElectricVehicle) -> Impact {
    let co2_avoided_tonnes = total_mwh * CO2_KG_PER_MWH / 1000.0;
    let full_charges = if vehicle.battery_kwh > 0.0 {
        (total_mwh * 1000.0 / vehicle.battery_kwh).max(0.0) as u64
    } else {
        0
    };

    Impact {
        vehicle: *vehicle,
        full_charges,
        homes_powered: (total_mwh * 12.0 / (HOME_MWH_PER_YEAR * months_covered(days))).max(0.0)
            as u64,
        co2_avoided_tonnes,
        trees_equivalent: (co2_avoided_tonnes * TREES_PER_TONNE).max(0.0) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{PredictionModel, PredictionRow, synthetic_dates};

    fn table(values: &[Option<f64>]) -> PredictionTable {
        PredictionTable {
            model: PredictionModel::Csv,
            value_column: "forecast".to_string(),
            rows: values
                .iter()
                .zip(synthetic_dates(values.len()))
                .map(|(v, d)| PredictionRow {
                    date: Some(d),
                    forecast: *v,
                    lower: None,
                    upper: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_summary_totals_and_peak() {
        let t = table(&[Some(10.0), Some(30.0), None, Some(20.0)]);
        let s = summarize_predictions(&t).unwrap();
        assert_eq!(s.total_surplus, 60.0);
        assert_eq!(s.average_daily, 20.0);
        assert_eq!(s.peak_surplus, 30.0);
        assert_eq!(s.peak_date, Some(synthetic_dates(2)[1]));
    }

    #[test]
    fn test_summary_of_empty_table() {
        assert!(summarize_predictions(&table(&[])).is_none());
        assert!(summarize_predictions(&table(&[None])).is_none());
    }

    #[test]
    fn test_ev_charges_truncate() {
        let tesla = vehicle("Tesla Model 3").unwrap();
        assert_eq!(impact(1.0, 10, tesla).full_charges, 16);
        let bmw = vehicle("bmw i3").unwrap();
        assert_eq!(impact(1.0, 10, bmw).full_charges, 23);
    }

    #[test]
    fn test_homes_use_at_least_one_month() {
        let ev = &ELECTRIC_VEHICLES[0];
        assert_eq!(impact(35.0, 10, ev).homes_powered, 120);
        assert_eq!(impact(35.0, 60, ev).homes_powered, 60);
    }

    #[test]
    fn test_co2_and_trees() {
        let i = impact(2.0, 1, &ELECTRIC_VEHICLES[2]);
        assert_eq!(i.co2_avoided_tonnes, 2.0);
        assert_eq!(i.trees_equivalent, 90);
    }

    #[test]
    fn test_homes_and_trees_truncate() {
        let i = impact(1.0, 10, &ELECTRIC_VEHICLES[1]);
        // 1 MWh over one month is 3.43 homes and 45 trees.
        assert_eq!(i.homes_powered, 3);
        assert_eq!(i.trees_equivalent, 45);
        let short = impact(0.05, 10, &ELECTRIC_VEHICLES[1]);
        assert_eq!(short.trees_equivalent, 2);
        assert_eq!(impact(-5.0, 10, &ELECTRIC_VEHICLES[1]).homes_powered, 0);
    }

    #[test]
    fn test_unknown_vehicle() {
        assert!(vehicle("Trabant").is_none());
    }
}
