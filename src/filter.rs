//! Year-range and month filtering of both tables.

use crate::record::{CalendarFields, ConsumptionTable, GenerationTable};

/// Inclusive year range plus the set of months to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub from_year: i32,
    pub to_year: i32,
    pub months: Vec<u32>,
}

impl Selection {
    /// Every month of every year in `from_year..=to_year`.
    pub fn years(from_year: i32, to_year: i32) -> Self {
        Self {
            from_year,
            to_year,
            months: (1..=12).collect(),
        }
    }

    pub fn with_months(mut self, months: Vec<u32>) -> Self {
        self.months = months;
        self
    }

    /// Rows without calendar fields never match.
    pub fn matches(&self, calendar: Option<&CalendarFields>) -> bool {
        calendar.is_some_and(|c| {
            self.from_year <= c.year && c.year <= self.to_year && self.months.contains(&c.month)
        })
    }
}

/// Keeps rows whose year lies in the range and whose month is selected.
///
/// Sources are not filtered here; the catalog is carried over unchanged.
pub fn filter(
    generation: &GenerationTable,
    consumption: &ConsumptionTable,
    selection: &Selection,
) -> (GenerationTable, ConsumptionTable) {
    let generation = GenerationTable {
        catalog: generation.catalog.clone(),
        rows: generation
            .rows
            .iter()
            .filter(|r| selection.matches(r.calendar()))
            .cloned()
            .collect(),
    };
    let consumption = ConsumptionTable {
        rows: consumption
            .rows
            .iter()
            .filter(|r| selection.matches(r.calendar()))
            .cloned()
            .collect(),
    };
    (generation, consumption)
}

/// Smallest and largest year present across both tables.
pub fn year_bounds(
    generation: &GenerationTable,
    consumption: &ConsumptionTable,
) -> Option<(i32, i32)> {
    let years = generation
        .rows
        .iter()
        .filter_map(|r| r.calendar().map(|c| c.year))
        .chain(
            consumption
                .rows
                .iter()
                .filter_map(|r| r.calendar().map(|c| c.year)),
        );

    years.fold(None, |acc, y| match acc {
        None => Some((y, y)),
        Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ConsumptionRecord, GenerationRecord, parse_timestamp};
    use crate::schema::SourceCatalog;

    fn tables() -> (GenerationTable, ConsumptionTable) {
        let stamps = [
            "2021-12-01 00:00:00",
            "2022-01-15 00:00:00",
            "2022-06-15 00:00:00",
            "2023-02-01 00:00:00",
            "garbage",
            "2024-01-01 00:00:00",
        ];
        let generation = GenerationTable {
            catalog: SourceCatalog::from_headers(["Solar [MWh] Calculated resolutions"]),
            rows: stamps
                .iter()
                .enumerate()
                .map(|(i, s)| GenerationRecord::new(i + 1, parse_timestamp(s), None, vec![Some(1.0)]))
                .collect(),
        };
        let consumption = ConsumptionTable {
            rows: stamps
                .iter()
                .enumerate()
                .map(|(i, s)| ConsumptionRecord::new(i + 1, parse_timestamp(s), Some(2.0)))
                .collect(),
        };
        (generation, consumption)
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let (g, c) = tables();
        let (g2, c2) = filter(&g, &c, &Selection::years(2022, 2023));
        let ids: Vec<_> = c2.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(g2.rows.len(), 3);
        assert_eq!(g2.catalog, g.catalog);
    }

    #[test]
    fn test_filter_by_month() {
        let (g, c) = tables();
        let sel = Selection::years(2021, 2024).with_months(vec![1, 2]);
        let (_, c2) = filter(&g, &c, &sel);
        let ids: Vec<_> = c2.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 6]);
    }

    #[test]
    fn test_empty_months_yields_empty_tables() {
        let (g, c) = tables();
        let sel = Selection::years(2000, 2100).with_months(vec![]);
        let (g2, c2) = filter(&g, &c, &sel);
        assert!(g2.is_empty());
        assert!(c2.is_empty());
    }

    #[test]
    fn test_filter_is_idempotent_and_rows_satisfy_predicate() {
        let (g, c) = tables();
        let sel = Selection::years(2022, 2024).with_months(vec![1, 6]);
        let (g1, c1) = filter(&g, &c, &sel);
        let (g2, c2) = filter(&g1, &c1, &sel);
        assert_eq!(g1, g2);
        assert_eq!(c1, c2);
        assert!(c1.rows.iter().all(|r| sel.matches(r.calendar())));
    }

    #[test]
    fn test_undated_rows_are_excluded() {
        let (g, c) = tables();
        let (_, c2) = filter(&g, &c, &Selection::years(i32::MIN, i32::MAX));
        assert!(c2.rows.iter().all(|r| r.calendar().is_some()));
        assert_eq!(c2.rows.len(), 5);
    }

    #[test]
    fn test_year_bounds() {
        let (g, c) = tables();
        assert_eq!(year_bounds(&g, &c), Some((2021, 2024)));
        assert_eq!(
            year_bounds(&GenerationTable::default(), &ConsumptionTable::default()),
            None
        );
    }
}
