use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use covid_dashboard::config::StoreArgs;
use covid_dashboard::{ContinentFilter, QueryLayer, Store, ALL_CONTINENTS};

/// Run one dashboard aggregation and print its rows as JSON lines.
#[derive(Debug, Parser)]
#[command(name = "covid-query", version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Top 10 locations by latest total cases
    TopCountries,
    /// Average life expectancy per continent
    LifeExpectancy,
    /// New cases per day and location
    DailyCases {
        #[arg(long, default_value = ALL_CONTINENTS)]
        continent: String,
    },
    /// Latest total deaths per location
    LatestDeaths {
        #[arg(long, default_value = ALL_CONTINENTS)]
        continent: String,
    },
    /// People vaccinated per day and location
    PeopleVaccinated {
        #[arg(long, default_value = ALL_CONTINENTS)]
        continent: String,
    },
    /// Continent selector choices
    Continents,
}

fn write_rows<T: Serialize>(rows: &[T]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for row in rows {
        serde_json::to_writer(&mut out, row).context("serializing row")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = Store::open(&cli.store.store)
        .with_context(|| format!("opening store {}", cli.store.store.display()))?;
    let queries = QueryLayer::new(store.collection(&cli.store.collection));

    match cli.command {
        Command::TopCountries => write_rows(&queries.top_countries_by_total_cases()?),
        Command::LifeExpectancy => write_rows(&queries.life_expectancy_by_continent()?),
        Command::DailyCases { continent } => {
            write_rows(&queries.daily_cases(&ContinentFilter::parse(&continent))?)
        }
        Command::LatestDeaths { continent } => {
            write_rows(&queries.latest_total_deaths(&ContinentFilter::parse(&continent))?)
        }
        Command::PeopleVaccinated { continent } => {
            write_rows(&queries.people_vaccinated(&ContinentFilter::parse(&continent))?)
        }
        Command::Continents => write_rows(&queries.continent_options()),
    }
}
