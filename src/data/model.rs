use std::collections::HashMap;

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub const ISO_CODE: &str = "iso_code";
pub const CONTINENT: &str = "continent";
pub const LOCATION: &str = "location";
pub const DATE: &str = "date";

/// Columns kept as text (or date); every other column is a numeric metric.
pub const IDENTIFIER_COLUMNS: [&str; 4] = [ISO_CODE, CONTINENT, LOCATION, DATE];

pub fn is_identifier(column: &str) -> bool {
    IDENTIFIER_COLUMNS.contains(&column)
}

// ---------------------------------------------------------------------------
// MetricSchema – ordered metric column names shared by all records
// ---------------------------------------------------------------------------

/// The ordered set of numeric columns of a collection.
///
/// Records store their metric values positionally, so a record is only
/// meaningful together with the schema it was built against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricSchema {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl MetricSchema {
    pub fn new(columns: Vec<String>) -> Self {
        let positions = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        MetricSchema { columns, positions }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a metric column, `None` when the collection has no such column.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Record – one country-day
// ---------------------------------------------------------------------------

/// One row of the dataset after type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub iso_code: Option<String>,
    pub continent: Option<String>,
    pub location: String,
    pub date: NaiveDate,
    /// Metric values aligned with the collection's [`MetricSchema`].
    pub metrics: Vec<Option<f64>>,
}

impl Record {
    /// Metric value by position; out-of-range positions read as null.
    pub fn metric_at(&self, position: usize) -> Option<f64> {
        self.metrics.get(position).copied().flatten()
    }

    /// Metric value by column name.
    pub fn metric(&self, schema: &MetricSchema, column: &str) -> Option<f64> {
        schema.position(column).and_then(|p| self.metric_at(p))
    }
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a calendar date. Datetimes are accepted and truncated to their date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Coerce a metric cell to `f64`; empty, non-numeric and NaN cells become null.
pub fn parse_metric(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Empty text cells are null.
pub fn parse_text(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
