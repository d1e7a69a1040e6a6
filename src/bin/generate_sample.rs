use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use clap::Parser;

/// Write a synthetic OWID-shaped CSV for demos.
#[derive(Debug, Parser)]
struct Cli {
    #[arg(long, default_value = "sample-covid-data.csv")]
    output: PathBuf,

    /// Number of days per location
    #[arg(long, default_value_t = 120)]
    days: u64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

struct Country {
    iso: &'static str,
    continent: &'static str,
    name: &'static str,
    population: f64,
    life_expectancy: f64,
    /// Daily infection rate at the peak of the wave.
    peak_rate: f64,
}

const COUNTRIES: [Country; 8] = [
    Country { iso: "FRA", continent: "Europe", name: "France", population: 67.8e6, life_expectancy: 82.7, peak_rate: 9e-4 },
    Country { iso: "DEU", continent: "Europe", name: "Germany", population: 83.4e6, life_expectancy: 81.3, peak_rate: 7e-4 },
    Country { iso: "IND", continent: "Asia", name: "India", population: 1.41e9, life_expectancy: 69.7, peak_rate: 2e-4 },
    Country { iso: "JPN", continent: "Asia", name: "Japan", population: 125.1e6, life_expectancy: 84.6, peak_rate: 3e-4 },
    Country { iso: "BRA", continent: "South America", name: "Brazil", population: 215.3e6, life_expectancy: 75.9, peak_rate: 6e-4 },
    Country { iso: "USA", continent: "North America", name: "United States", population: 338.3e6, life_expectancy: 78.9, peak_rate: 8e-4 },
    Country { iso: "NGA", continent: "Africa", name: "Nigeria", population: 218.5e6, life_expectancy: 54.7, peak_rate: 5e-5 },
    Country { iso: "AUS", continent: "Oceania", name: "Australia", population: 26.2e6, life_expectancy: 83.4, peak_rate: 4e-4 },
];

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut rng = SimpleRng::new(cli.seed);
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).context("start date")?;

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    writer.write_record([
        "iso_code",
        "continent",
        "location",
        "date",
        "total_cases",
        "new_cases",
        "total_deaths",
        "people_vaccinated",
        "population",
        "life_expectancy",
    ])?;

    let mut rows = 0usize;
    for country in &COUNTRIES {
        let mut total_cases: f64 = 0.0;
        let mut total_deaths: f64 = 0.0;
        let mut vaccinated: f64 = 0.0;

        for day in 0..cli.days {
            let date = start
                .checked_add_days(Days::new(day))
                .context("date out of range")?;

            // one wave centred on the middle of the window
            let t = day as f64 / cli.days.max(1) as f64;
            let wave = (-(t - 0.5).powi(2) / 0.02).exp();
            let noise = 0.8 + 0.4 * rng.next_f64();
            let new_cases = (country.population * country.peak_rate * wave * noise).round();
            total_cases += new_cases;
            total_deaths += (new_cases * 0.01 * rng.next_f64()).round();

            // vaccination starts a month in and is reported most days
            let vaccinated_cell = if day >= 30 && rng.next_f64() > 0.15 {
                vaccinated += country.population * 0.004 * rng.next_f64();
                vaccinated = vaccinated.min(country.population * 0.9);
                format!("{vaccinated:.0}")
            } else {
                String::new()
            };

            writer.write_record([
                country.iso.to_string(),
                country.continent.to_string(),
                country.name.to_string(),
                date.format("%Y-%m-%d").to_string(),
                format!("{total_cases:.0}"),
                format!("{new_cases:.0}"),
                format!("{total_deaths:.0}"),
                vaccinated_cell,
                format!("{:.0}", country.population),
                format!("{:.2}", country.life_expectancy),
            ])?;
            rows += 1;
        }
    }

    // Aggregate rows like OWID's "World" have no continent.
    let first_day = start.format("%Y-%m-%d").to_string();
    writer.write_record([
        "OWID_WRL",
        "",
        "World",
        first_day.as_str(),
        "",
        "",
        "",
        "",
        "7975105024",
        "72.58",
    ])?;
    rows += 1;
    writer.flush()?;

    println!("Wrote {rows} rows for {} locations to {}", COUNTRIES.len() + 1, cli.output.display());
    Ok(())
}
