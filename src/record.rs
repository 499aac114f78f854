//! Row model for the generation and consumption tables.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;

use crate::schema::SourceCatalog;

pub static MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub static WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Formats tried, in order, for naive timestamps.
static DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M",
    "%m/%d/%Y %H:%M",
    "%b %d, %Y %I:%M %p",
];

static DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%b %d, %Y"];

/// Canonical format used when writing timestamps back out.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a timestamp cell, returning `None` when no known format matches.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses a numeric cell; anything that is not a finite number is missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Calendar parts derived from a record's start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub quarter: u32,
    pub weekday: Weekday,
}

impl CalendarFields {
    pub fn from_timestamp(ts: &NaiveDateTime) -> Self {
        let month = ts.month();
        Self {
            year: ts.year(),
            month,
            day: ts.day(),
            quarter: (month - 1) / 3 + 1,
            weekday: ts.weekday(),
        }
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    pub fn weekday_name(&self) -> &'static str {
        WEEKDAY_NAMES[self.weekday.num_days_from_monday() as usize]
    }
}

/// Start time plus the calendar fields derived from it.
///
/// The fields are only ever produced by [`Timing::new`], so they cannot
/// drift from the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timing {
    start_time: Option<NaiveDateTime>,
    calendar: Option<CalendarFields>,
}

impl Timing {
    pub fn new(start_time: Option<NaiveDateTime>) -> Self {
        Self {
            start_time,
            calendar: start_time.as_ref().map(CalendarFields::from_timestamp),
        }
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    pub fn calendar(&self) -> Option<&CalendarFields> {
        self.calendar.as_ref()
    }
}

/// One row of the generation file.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub id: usize,
    timing: Timing,
    pub end_time: Option<NaiveDateTime>,
    /// Values in catalog order; `None` where the cell was not numeric.
    pub values: Vec<Option<f64>>,
}

impl GenerationRecord {
    pub fn new(
        id: usize,
        start_time: Option<NaiveDateTime>,
        end_time: Option<NaiveDateTime>,
        values: Vec<Option<f64>>,
    ) -> Self {
        Self {
            id,
            timing: Timing::new(start_time),
            end_time,
            values,
        }
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.timing.start_time()
    }

    pub fn set_start_time(&mut self, start_time: Option<NaiveDateTime>) {
        self.timing = Timing::new(start_time);
    }

    pub fn calendar(&self) -> Option<&CalendarFields> {
        self.timing.calendar()
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// One row of the consumption file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub id: usize,
    timing: Timing,
    pub total_load: Option<f64>,
}

impl ConsumptionRecord {
    pub fn new(id: usize, start_time: Option<NaiveDateTime>, total_load: Option<f64>) -> Self {
        Self {
            id,
            timing: Timing::new(start_time),
            total_load,
        }
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.timing.start_time()
    }

    pub fn set_start_time(&mut self, start_time: Option<NaiveDateTime>) {
        self.timing = Timing::new(start_time);
    }

    pub fn calendar(&self) -> Option<&CalendarFields> {
        self.timing.calendar()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationTable {
    pub catalog: SourceCatalog,
    pub rows: Vec<GenerationRecord>,
}

impl GenerationTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumptionTable {
    pub rows: Vec<ConsumptionRecord>,
}

impl ConsumptionTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Both tables of one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyData {
    pub generation: GenerationTable,
    pub consumption: ConsumptionTable,
}
