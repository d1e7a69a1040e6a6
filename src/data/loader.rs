use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::model::{
    is_identifier, parse_date, parse_metric, parse_text, MetricSchema, Record, CONTINENT, DATE,
    ISO_CODE, LOCATION,
};
use crate::store::{CollectionOptions, Store, StoreError};

/// How many dropped rows are logged individually before only counting.
const MAX_LOGGED_DROPS: usize = 10;

// ---------------------------------------------------------------------------
// Errors and report
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read source {}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source {} is missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("malformed CSV in {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("another load is already running against {} (remove {} if stale)", store.display(), lock.display())]
    AlreadyRunning { store: PathBuf, lock: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of one loader run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_inserted: usize,
    /// Rows without a valid date or location, or malformed CSV rows.
    pub rows_dropped: usize,
    /// Non-empty metric cells that could not be read as numbers.
    pub null_coerced: usize,
    pub metric_columns: usize,
}

/// Parsed source file, ready to insert.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub schema: MetricSchema,
    pub records: Vec<Record>,
    pub report: LoadReport,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Where each field sits in the CSV header.
struct Layout {
    iso_code: usize,
    continent: usize,
    location: usize,
    date: usize,
    /// CSV positions of the metric columns, in schema order.
    metrics: Vec<usize>,
}

impl Layout {
    fn from_headers(path: &Path, headers: &[String]) -> Result<(Self, MetricSchema), LoadError> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        let ids = [find(ISO_CODE)?, find(CONTINENT)?, find(LOCATION)?, find(DATE)?];

        let mut metric_names = Vec::new();
        let mut metrics = Vec::new();
        for (i, h) in headers.iter().enumerate() {
            if is_identifier(h) || metric_names.contains(h) {
                continue;
            }
            metric_names.push(h.clone());
            metrics.push(i);
        }

        let layout = Layout {
            iso_code: ids[0],
            continent: ids[1],
            location: ids[2],
            date: ids[3],
            metrics,
        };
        Ok((layout, MetricSchema::new(metric_names)))
    }
}

/// Read and coerce every row of a CSV source.
///
/// Rows with an unparseable `date` or an empty `location` are dropped.
/// Metric cells that are not numbers become null. Only unreadable files,
/// a missing identifier column or I/O failures abort.
pub fn parse_source(path: &Path) -> Result<ParsedSource, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Source {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let csv_error = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let (layout, schema) = Layout::from_headers(path, &headers)?;

    let mut report = LoadReport {
        metric_columns: schema.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        report.rows_read += 1;
        let row = match result {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(csv_error(e)),
            Err(e) => {
                drop_row(&mut report, row_no, &format!("malformed row: {e}"));
                continue;
            }
        };
        let cell = |i: usize| row.get(i).unwrap_or("");

        let Some(date) = parse_date(cell(layout.date)) else {
            drop_row(&mut report, row_no, &format!("invalid date '{}'", cell(layout.date)));
            continue;
        };
        let Some(location) = parse_text(cell(layout.location)) else {
            drop_row(&mut report, row_no, "empty location");
            continue;
        };

        let metrics = layout
            .metrics
            .iter()
            .map(|&i| {
                let raw = cell(i);
                let value = parse_metric(raw);
                if value.is_none() && !raw.trim().is_empty() {
                    report.null_coerced += 1;
                }
                value
            })
            .collect();

        records.push(Record {
            iso_code: parse_text(cell(layout.iso_code)),
            continent: parse_text(cell(layout.continent)),
            location,
            date,
            metrics,
        });
    }

    if report.rows_dropped > MAX_LOGGED_DROPS {
        log::warn!(
            "{} rows dropped in total ({} not shown)",
            report.rows_dropped,
            report.rows_dropped - MAX_LOGGED_DROPS
        );
    }
    report.rows_inserted = records.len();
    Ok(ParsedSource {
        schema,
        records,
        report,
    })
}

fn drop_row(report: &mut LoadReport, row_no: usize, reason: &str) {
    report.rows_dropped += 1;
    if report.rows_dropped <= MAX_LOGGED_DROPS {
        // +2: one for the header, one for 1-based line numbers
        log::warn!("dropping line {}: {reason}", row_no + 2);
    }
}

// ---------------------------------------------------------------------------
// Reload
// ---------------------------------------------------------------------------

/// Exclusive marker for a running load; removed on drop.
struct LoadLock {
    path: PathBuf,
}

impl LoadLock {
    const FILE: &'static str = ".load.lock";

    fn acquire(store: &Store) -> Result<Self, LoadError> {
        let path = store.path().join(Self::FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(LoadLock { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LoadError::AlreadyRunning {
                store: store.path().to_path_buf(),
                lock: path,
            }),
            Err(e) => Err(StoreError::Io { path, source: e }.into()),
        }
    }
}

impl Drop for LoadLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not remove {}: {e}", self.path.display());
        }
    }
}

/// Replace `collection` with the contents of `source`.
///
/// The source is parsed before anything is dropped, so a missing or
/// unreadable file leaves the existing collection in place.
pub fn reload(store: &Store, source: &Path, collection: &str) -> Result<LoadReport, LoadError> {
    let _lock = LoadLock::acquire(store)?;

    log::info!("reading {}", source.display());
    let parsed = parse_source(source)?;

    if store.drop_collection(collection)? {
        log::info!("dropped existing collection {collection}");
    }
    let coll = store.create_collection(collection, CollectionOptions::time_series(DATE))?;

    if parsed.records.is_empty() {
        log::warn!("{} contains no valid rows; {collection} left empty", source.display());
    } else {
        coll.insert_many(&parsed.schema, &parsed.records)?;
    }
    coll.create_index(CONTINENT)?;
    coll.create_index(DATE)?;

    let report = parsed.report;
    log::info!(
        "loaded {} of {} rows into {collection} ({} dropped, {} cells coerced to null, {} metric columns)",
        report.rows_inserted,
        report.rows_read,
        report.rows_dropped,
        report.null_coerced,
        report.metric_columns
    );
    Ok(report)
}
