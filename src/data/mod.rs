/// Data layer: record types, CSV ingestion, and the continent filter.
///
/// Flow:
/// ```text
///  owid-covid-data.csv
///        │  loader: parse + coerce rows into Vec<Record>
///        ▼
///  store collection (time-series, parquet segments)
///        │  query layer: pipelines narrowed by ContinentFilter
///        ▼
///  dashboard rows
/// ```

pub mod filter;
pub mod loader;
pub mod model;
