use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use covid_dashboard::config::{StoreArgs, DEFAULT_SOURCE};
use covid_dashboard::{reload, Store};

/// Replace a collection with the contents of an OWID COVID-19 CSV file.
#[derive(Debug, Parser)]
#[command(name = "covid-load", version)]
struct Cli {
    /// CSV file to ingest
    #[arg(long, env = "COVID_SOURCE", default_value = DEFAULT_SOURCE)]
    source: PathBuf,

    #[command(flatten)]
    store: StoreArgs,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = Store::create(&cli.store.store)
        .with_context(|| format!("opening store {}", cli.store.store.display()))?;
    let report = reload(&store, &cli.source, &cli.store.collection)
        .with_context(|| format!("loading {}", cli.source.display()))?;

    println!(
        "Inserted {} rows into {} ({} dropped)",
        report.rows_inserted, cli.store.collection, report.rows_dropped
    );
    Ok(())
}
