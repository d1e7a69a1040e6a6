use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Float64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};

use super::error::{StoreError, StoreResult};
use crate::data::model::{
    MetricSchema, Record, CONTINENT, DATE, IDENTIFIER_COLUMNS, ISO_CODE, LOCATION,
};

// ---------------------------------------------------------------------------
// Date32 conversion
// ---------------------------------------------------------------------------

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

// ---------------------------------------------------------------------------
// Arrow schema
// ---------------------------------------------------------------------------

/// Arrow layout of a segment: identifier columns, then one Float64 per metric.
pub fn arrow_schema(metrics: &MetricSchema) -> SchemaRef {
    let mut fields = vec![
        Field::new(ISO_CODE, DataType::Utf8, true),
        Field::new(CONTINENT, DataType::Utf8, true),
        Field::new(LOCATION, DataType::Utf8, false),
        Field::new(DATE, DataType::Date32, false),
    ];
    fields.extend(
        metrics
            .columns()
            .iter()
            .map(|c| Field::new(c, DataType::Float64, true)),
    );
    Arc::new(Schema::new(fields))
}

fn to_batch(metrics: &MetricSchema, records: &[Record]) -> StoreResult<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(4 + metrics.len());
    columns.push(Arc::new(
        records
            .iter()
            .map(|r| r.iso_code.as_deref())
            .collect::<StringArray>(),
    ));
    columns.push(Arc::new(
        records
            .iter()
            .map(|r| r.continent.as_deref())
            .collect::<StringArray>(),
    ));
    columns.push(Arc::new(StringArray::from_iter_values(
        records.iter().map(|r| r.location.as_str()),
    )));
    columns.push(Arc::new(Date32Array::from_iter_values(
        records.iter().map(|r| date_to_days(r.date)),
    )));
    for pos in 0..metrics.len() {
        columns.push(Arc::new(
            records
                .iter()
                .map(|r| r.metric_at(pos))
                .collect::<Float64Array>(),
        ));
    }
    Ok(RecordBatch::try_new(arrow_schema(metrics), columns)?)
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write `records` to `path` as a single parquet row batch.
pub fn write_segment(path: &Path, metrics: &MetricSchema, records: &[Record]) -> StoreResult<()> {
    let batch = to_batch(metrics, records)?;
    let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read a segment back into records, in the order they were written.
///
/// Only the identifier columns and the metrics in `metrics` are decoded;
/// the records' metric values follow `metrics`, not the file layout.
pub fn read_segment(path: &Path, metrics: &MetricSchema) -> StoreResult<Vec<Record>> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let mut roots = Vec::with_capacity(IDENTIFIER_COLUMNS.len() + metrics.len());
    let wanted = IDENTIFIER_COLUMNS
        .iter()
        .copied()
        .chain(metrics.columns().iter().map(String::as_str));
    for name in wanted {
        let idx = builder
            .schema()
            .index_of(name)
            .map_err(|_| StoreError::corrupt(path, format!("missing column `{name}`")))?;
        roots.push(idx);
    }
    // segments are flat, so arrow field positions are parquet root positions
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
    let reader = builder.with_projection(mask).build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        decode_batch(path, &batch, metrics, &mut records)?;
    }
    Ok(records)
}

fn column<'a>(path: &Path, batch: &'a RecordBatch, name: &str) -> StoreResult<&'a ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| StoreError::corrupt(path, format!("missing column `{name}`")))?;
    Ok(batch.column(idx))
}

fn decode_batch(
    path: &Path,
    batch: &RecordBatch,
    metrics: &MetricSchema,
    out: &mut Vec<Record>,
) -> StoreResult<()> {
    let type_error = |name: &str| StoreError::corrupt(path, format!("unexpected type for `{name}`"));

    let iso = column(path, batch, ISO_CODE)?
        .as_string_opt::<i32>()
        .ok_or_else(|| type_error(ISO_CODE))?;
    let continent = column(path, batch, CONTINENT)?
        .as_string_opt::<i32>()
        .ok_or_else(|| type_error(CONTINENT))?;
    let location = column(path, batch, LOCATION)?
        .as_string_opt::<i32>()
        .ok_or_else(|| type_error(LOCATION))?;
    let date = column(path, batch, DATE)?
        .as_primitive_opt::<Date32Type>()
        .ok_or_else(|| type_error(DATE))?;

    let metric_arrays = metrics
        .columns()
        .iter()
        .map(|name| {
            column(path, batch, name)?
                .as_primitive_opt::<Float64Type>()
                .ok_or_else(|| type_error(name.as_str()))
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let text = |arr: &StringArray, row: usize| -> Option<String> {
        (!arr.is_null(row)).then(|| arr.value(row).to_string())
    };

    out.reserve(batch.num_rows());
    for row in 0..batch.num_rows() {
        if location.is_null(row) || date.is_null(row) {
            return Err(StoreError::corrupt(
                path,
                format!("row {row} has a null location or date"),
            ));
        }
        let day = days_to_date(date.value(row))
            .ok_or_else(|| StoreError::corrupt(path, format!("row {row} has an invalid date")))?;
        let values = metric_arrays
            .iter()
            .map(|arr| (!arr.is_null(row)).then(|| arr.value(row)))
            .collect();

        out.push(Record {
            iso_code: text(iso, row),
            continent: text(continent, row),
            location: location.value(row).to_string(),
            date: day,
            metrics: values,
        });
    }
    Ok(())
}
