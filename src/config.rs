use std::path::PathBuf;

use clap::Args;

pub const DEFAULT_STORE_DIR: &str = "data/COVID";
pub const DEFAULT_COLLECTION: &str = "covid-data";
pub const DEFAULT_SOURCE: &str = "owid-covid-data.csv";

/// Where the collection lives. Shared by every binary.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Database directory
    #[arg(long, env = "COVID_STORE", default_value = DEFAULT_STORE_DIR)]
    pub store: PathBuf,

    /// Collection name
    #[arg(long, env = "COVID_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,
}
