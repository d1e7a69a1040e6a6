//! OWID COVID-19 data: CSV ingestion into an embedded time-series store and
//! the aggregations behind the dashboard.

pub mod config;
pub mod data;
pub mod query;
pub mod store;

pub use data::filter::{ContinentFilter, ALL_CONTINENTS};
pub use data::loader::{reload, LoadError, LoadReport};
pub use query::{QueryError, QueryLayer};
pub use store::{Collection, Store, StoreError};
