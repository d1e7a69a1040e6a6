/// Embedded time-series document store.
///
/// Layout on disk:
/// ```text
///  <database>/
///  ├── <collection>/
///  │   ├── collection.json        options, indexes, metric columns, segments
///  │   ├── segment-00001.parquet  one insert_many batch, insertion order
///  │   └── ...
///  └── .load.lock                 held while a loader run is in progress
/// ```

mod documents;
mod error;
mod index;
pub mod pipeline;
mod segment;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use documents::Documents;
pub use error::{StoreError, StoreResult};
pub use index::{FieldIndex, IndexKey, IndexedField};
pub use pipeline::{GroupRow, Pipeline};

use crate::data::model::{MetricSchema, Record, DATE};

const META_FILE: &str = "collection.json";

// ---------------------------------------------------------------------------
// Collection options and metadata
// ---------------------------------------------------------------------------

/// Time-series declaration of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesOptions {
    pub time_field: String,
}

impl TimeSeriesOptions {
    pub fn on(time_field: &str) -> Self {
        TimeSeriesOptions {
            time_field: time_field.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    pub timeseries: Option<TimeSeriesOptions>,
}

impl CollectionOptions {
    pub fn time_series(time_field: &str) -> Self {
        CollectionOptions {
            timeseries: Some(TimeSeriesOptions::on(time_field)),
        }
    }
}

/// One `insert_many` batch on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub file: String,
    pub rows: usize,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

/// Contents of `collection.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    #[serde(default)]
    pub timeseries: Option<TimeSeriesOptions>,
    #[serde(default)]
    pub indexes: Vec<String>,
    /// Metric columns, fixed by the first insert.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    #[serde(default)]
    pub segments: Vec<SegmentEntry>,
}

impl CollectionMeta {
    pub fn row_count(&self) -> usize {
        self.segments.iter().map(|s| s.rows).sum()
    }

    pub fn metric_schema(&self) -> MetricSchema {
        MetricSchema::new(self.metrics.clone().unwrap_or_default())
    }

    fn indexed_fields(&self) -> Vec<IndexedField> {
        self.indexes
            .iter()
            .filter_map(|f| IndexedField::parse(f))
            .collect()
    }
}

/// Result of [`Collection::insert_many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertManyResult {
    pub segment: String,
    pub inserted: usize,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle on one database directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open an existing database directory.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StoreError::Unreachable { path: root });
        }
        Ok(Store { root })
    }

    /// Open a database directory, creating it when missing.
    pub fn create(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Store { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Names of existing collections, sorted.
    pub fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|_| StoreError::Unreachable {
            path: self.root.clone(),
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            if entry.path().join(META_FILE).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Lightweight handle; no I/O until an operation is called.
    pub fn collection(&self, name: &str) -> Collection {
        Collection {
            name: name.to_string(),
            store_root: self.root.clone(),
            dir: self.root.join(name),
        }
    }

    /// Create an empty collection. Fails if one with that name exists.
    pub fn create_collection(&self, name: &str, options: CollectionOptions) -> StoreResult<Collection> {
        validate_name(name)?;
        if let Some(ts) = &options.timeseries {
            if ts.time_field != DATE {
                return Err(StoreError::UnsupportedTimeField(ts.time_field.clone()));
            }
        }

        let collection = self.collection(name);
        if collection.exists() {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        fs::create_dir_all(&collection.dir).map_err(|e| StoreError::io(&collection.dir, e))?;
        collection.write_meta(&CollectionMeta {
            name: name.to_string(),
            timeseries: options.timeseries,
            indexes: Vec::new(),
            metrics: None,
            segments: Vec::new(),
        })?;
        log::debug!("created collection {name} in {}", self.root.display());
        Ok(collection)
    }

    /// Remove a collection and all its segments. Returns whether it existed.
    pub fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        validate_name(name)?;
        let dir = self.root.join(name);
        if !dir.join(META_FILE).is_file() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        log::debug!("dropped collection {name}");
        Ok(true)
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Handle on one collection of a [`Store`].
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    store_root: PathBuf,
    dir: PathBuf,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.dir.join(META_FILE).is_file()
    }

    /// Read `collection.json`.
    pub fn meta(&self) -> StoreResult<CollectionMeta> {
        if !self.store_root.is_dir() {
            return Err(StoreError::Unreachable {
                path: self.store_root.clone(),
            });
        }
        let path = self.dir.join(META_FILE);
        if !path.is_file() {
            return Err(StoreError::CollectionNotFound(self.name.clone()));
        }
        let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|source| StoreError::Metadata { path, source })
    }

    fn write_meta(&self, meta: &CollectionMeta) -> StoreResult<()> {
        let path = self.dir.join(META_FILE);
        let tmp = self.dir.join(format!("{META_FILE}.tmp"));
        let text = serde_json::to_string_pretty(meta).map_err(|source| StoreError::Metadata {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))
    }

    /// Append `records` as one new segment, keeping their order.
    pub fn insert_many(&self, schema: &MetricSchema, records: &[Record]) -> StoreResult<InsertManyResult> {
        let mut meta = self.meta()?;
        if records.is_empty() {
            return Err(StoreError::EmptyInsert(self.name.clone()));
        }
        match &meta.metrics {
            Some(existing) if existing.as_slice() != schema.columns() => {
                return Err(StoreError::SchemaMismatch {
                    collection: self.name.clone(),
                });
            }
            Some(_) => {}
            None => meta.metrics = Some(schema.columns().to_vec()),
        }
        if records.iter().any(|r| r.metrics.len() != schema.len()) {
            return Err(StoreError::SchemaMismatch {
                collection: self.name.clone(),
            });
        }

        let file = format!("segment-{:05}.parquet", meta.segments.len() + 1);
        let tmp = self.dir.join(format!("{file}.tmp"));
        segment::write_segment(&tmp, schema, records)?;
        let path = self.dir.join(&file);
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        let (min_date, max_date) = date_range(records);
        meta.segments.push(SegmentEntry {
            file: file.clone(),
            rows: records.len(),
            min_date,
            max_date,
        });
        self.write_meta(&meta)?;

        log::debug!("{}: inserted {} documents into {file}", self.name, records.len());
        Ok(InsertManyResult {
            segment: file,
            inserted: records.len(),
        })
    }

    /// Declare an ascending index. Idempotent.
    pub fn create_index(&self, field: &str) -> StoreResult<()> {
        let indexed =
            IndexedField::parse(field).ok_or_else(|| StoreError::UnsupportedIndexField(field.to_string()))?;
        let mut meta = self.meta()?;
        if meta.indexes.iter().any(|f| f == indexed.name()) {
            return Ok(());
        }
        meta.indexes.push(indexed.name().to_string());
        self.write_meta(&meta)
    }

    /// Materialise every document with the declared indexes.
    pub fn find(&self) -> StoreResult<Documents> {
        let meta = self.meta()?;
        let schema = meta.metric_schema();
        self.load(&meta, schema)
    }

    /// Like [`find`](Self::find), decoding only the listed metric columns.
    /// Names the collection does not have are ignored.
    pub fn find_projected(&self, metrics: &[String]) -> StoreResult<Documents> {
        let meta = self.meta()?;
        let columns = meta
            .metric_schema()
            .columns()
            .iter()
            .filter(|c| metrics.contains(c))
            .cloned()
            .collect();
        self.load(&meta, MetricSchema::new(columns))
    }

    fn load(&self, meta: &CollectionMeta, schema: MetricSchema) -> StoreResult<Documents> {
        let mut records = Vec::with_capacity(meta.row_count());
        for seg in &meta.segments {
            let path = self.dir.join(&seg.file);
            let mut rows = segment::read_segment(&path, &schema)?;
            if rows.len() != seg.rows {
                return Err(StoreError::corrupt(
                    &path,
                    format!("expected {} rows, found {}", seg.rows, rows.len()),
                ));
            }
            records.append(&mut rows);
        }
        Ok(Documents::new(schema, records, &meta.indexed_fields()))
    }

    pub fn aggregate(&self, pipeline: &Pipeline) -> StoreResult<Vec<GroupRow>> {
        let docs = self.find_projected(&pipeline.metric_columns())?;
        Ok(pipeline.run(&docs))
    }

    pub fn distinct_continents(&self) -> StoreResult<Vec<String>> {
        Ok(self.find_projected(&[])?.distinct_continents())
    }
}

fn date_range(records: &[Record]) -> (NaiveDate, NaiveDate) {
    let first = records[0].date;
    records
        .iter()
        .fold((first, first), |(lo, hi), r| (lo.min(r.date), hi.max(r.date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(location: &str, d: u32, v: f64) -> Record {
        Record {
            iso_code: None,
            continent: Some("Europe".into()),
            location: location.into(),
            date: NaiveDate::from_ymd_opt(2022, 3, d).unwrap(),
            metrics: vec![Some(v)],
        }
    }

    #[test]
    fn open_missing_store_is_unreachable() {
        let tmp = TempDir::new().unwrap();
        let err = Store::open(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Unreachable { .. }));
    }

    #[test]
    fn create_drop_and_list() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path().join("db"))?;
        store.create_collection("b", CollectionOptions::default())?;
        store.create_collection("a", CollectionOptions::time_series("date"))?;
        assert_eq!(store.list_collection_names()?, vec!["a", "b"]);

        let again = store.create_collection("a", CollectionOptions::default());
        assert!(matches!(again, Err(StoreError::CollectionExists(_))));

        assert!(store.drop_collection("a")?);
        assert!(!store.drop_collection("a")?);
        assert_eq!(store.list_collection_names()?, vec!["b"]);
        Ok(())
    }

    #[test]
    fn time_field_must_be_date() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path())?;
        let err = store
            .create_collection("c", CollectionOptions::time_series("ts"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedTimeField(_)));
        assert!(matches!(
            store.create_collection("../escape", CollectionOptions::default()),
            Err(StoreError::InvalidName(_))
        ));
        Ok(())
    }

    #[test]
    fn inserts_append_segments_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path())?;
        let coll = store.create_collection("c", CollectionOptions::time_series("date"))?;
        let schema = MetricSchema::new(vec!["total_cases".into()]);

        let first = coll.insert_many(&schema, &[record("A", 2, 1.0), record("B", 1, 2.0)])?;
        let second = coll.insert_many(&schema, &[record("C", 3, 3.0)])?;
        assert_eq!(first.segment, "segment-00001.parquet");
        assert_eq!(second.segment, "segment-00002.parquet");

        let meta = coll.meta()?;
        assert_eq!(meta.row_count(), 3);
        assert_eq!(meta.segments[0].min_date, NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());

        let docs = coll.find()?;
        let locations: Vec<_> = docs.records().iter().map(|r| r.location.as_str()).collect();
        assert_eq!(locations, vec!["A", "B", "C"]);
        Ok(())
    }

    #[test]
    fn insert_rejects_empty_and_mismatched_batches() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path())?;
        let coll = store.create_collection("c", CollectionOptions::time_series("date"))?;
        let schema = MetricSchema::new(vec!["total_cases".into()]);

        assert!(matches!(
            coll.insert_many(&schema, &[]),
            Err(StoreError::EmptyInsert(_))
        ));
        coll.insert_many(&schema, &[record("A", 1, 1.0)])?;

        let other = MetricSchema::new(vec!["new_cases".into()]);
        assert!(matches!(
            coll.insert_many(&other, &[record("A", 2, 1.0)]),
            Err(StoreError::SchemaMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn indexes_are_declared_once_and_validated() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path())?;
        let coll = store.create_collection("c", CollectionOptions::time_series("date"))?;
        coll.create_index("continent")?;
        coll.create_index("continent")?;
        coll.create_index("date")?;
        assert_eq!(coll.meta()?.indexes, vec!["continent", "date"]);
        assert!(matches!(
            coll.create_index("total_cases"),
            Err(StoreError::UnsupportedIndexField(_))
        ));

        let schema = MetricSchema::new(vec!["total_cases".into()]);
        coll.insert_many(&schema, &[record("A", 1, 1.0)])?;
        let docs = coll.find()?;
        assert!(docs.index(IndexedField::Continent).is_some());
        assert!(docs.index(IndexedField::Location).is_none());
        assert_eq!(coll.distinct_continents()?, vec!["Europe"]);
        Ok(())
    }

    #[test]
    fn missing_collection_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path())?;
        let err = store.collection("ghost").find().unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
        Ok(())
    }

    #[test]
    fn projected_find_keeps_only_requested_metrics() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let store = Store::create(tmp.path())?;
        let coll = store.create_collection("c", CollectionOptions::time_series("date"))?;
        let schema = MetricSchema::new(vec!["total_cases".into(), "new_cases".into()]);
        let mut rec = record("A", 1, 5.0);
        rec.metrics.push(Some(7.0));
        coll.insert_many(&schema, &[rec])?;

        let docs = coll.find_projected(&["new_cases".into(), "unknown".into()])?;
        assert_eq!(docs.schema().columns(), ["new_cases"]);
        assert_eq!(docs.records()[0].metric(docs.schema(), "new_cases"), Some(7.0));
        assert_eq!(docs.records()[0].metric(docs.schema(), "total_cases"), None);
        assert_eq!(coll.find()?.schema().len(), 2);
        Ok(())
    }
}
