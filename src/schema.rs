//! Column schema of the preprocessed energy CSV snapshots.
//!
//! Source columns are discovered once from the generation header and then
//! reached by name through [`SourceCatalog`], never by rebuilding the
//! column string at the call site.

use serde::Serialize;

/// Marker that identifies an energy column in a header.
pub const UNIT_MARKER: &str = "[MWh]";

/// Suffix the preprocessing step appends to every energy column.
pub const COLUMN_SUFFIX: &str = " [MWh] Calculated resolutions";

pub const START_DATE_COLUMN: &str = "Start date";
pub const END_DATE_COLUMN: &str = "End date";
pub const CONSUMPTION_COLUMN: &str = "Total (grid load) [MWh] Calculated resolutions";

pub const GENERATION_FILE: &str = "energy_generation_preprocessed.csv";
pub const CONSUMPTION_FILE: &str = "energy_consumption_preprocessed.csv";
pub const PREDICTION_FILE: &str = "365_day_predictions.csv";

/// Lower-case keywords that mark a source as renewable.
static RENEWABLE_KEYWORDS: &[&str] = &["solar", "wind", "hydro", "biomass", "geothermal"];

/// One generation channel and the CSV column it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub column: String,
    /// Position of this source in every generation record's value vector.
    pub index: usize,
}

/// The set of generation sources found in a generation file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCatalog {
    sources: Vec<Source>,
}

impl SourceCatalog {
    /// Builds the catalog from a header row, keeping header order.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let sources = headers
            .into_iter()
            .filter(|h| h.contains(UNIT_MARKER))
            .enumerate()
            .map(|(index, column)| Source {
                name: source_name(column),
                column: column.to_string(),
                index,
            })
            .collect();

        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Sources whose name matches a renewable keyword, case-insensitively.
    pub fn renewables(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| is_renewable(&s.name))
    }
}

/// Strips the unit suffix from a column header to get the bare source name.
pub fn source_name(column: &str) -> String {
    if let Some(name) = column.strip_suffix(COLUMN_SUFFIX) {
        return name.to_string();
    }
    match column.find(UNIT_MARKER) {
        Some(pos) => column[..pos].trim_end().to_string(),
        None => column.to_string(),
    }
}

pub fn is_renewable(name: &str) -> bool {
    let lower = name.to_lowercase();
    RENEWABLE_KEYWORDS.iter().any(|k| lower.contains(k))
}
