use std::error::Error;

use covid_dashboard::config::StoreArgs;
use covid_dashboard::data::filter::continent_options;
use covid_dashboard::query::{
    ContinentLifeExpectancy, DailyCases, LatestDeaths, QueryResult, TopCountry, VaccinationPoint,
};
use covid_dashboard::{ContinentFilter, QueryLayer, Store};

use crate::color::SeriesColors;

// ---------------------------------------------------------------------------
// Per-chart state
// ---------------------------------------------------------------------------

/// Rows that belong to a named series (one line per location).
pub trait SeriesRow {
    fn series(&self) -> &str;
}

impl SeriesRow for DailyCases {
    fn series(&self) -> &str {
        &self.location
    }
}

impl SeriesRow for VaccinationPoint {
    fn series(&self) -> &str {
        &self.location
    }
}

/// What one chart card shows.
pub struct ChartState<R> {
    pub filter: ContinentFilter,
    pub rows: Vec<R>,
    /// Last query error; the previous rows stay on screen.
    pub error: Option<String>,
    pub colors: SeriesColors,
}

impl<R> Default for ChartState<R> {
    fn default() -> Self {
        Self {
            filter: ContinentFilter::All,
            rows: Vec::new(),
            error: None,
            colors: SeriesColors::default(),
        }
    }
}

impl<R> ChartState<R> {
    fn apply(&mut self, chart: &str, result: QueryResult<Vec<R>>) {
        match result {
            Ok(rows) => {
                log::info!("{chart}: {} rows for {}", rows.len(), self.filter);
                self.rows = rows;
                self.error = None;
            }
            Err(e) => {
                let msg = error_chain(&e);
                log::error!("{chart}: {msg}");
                self.error = Some(msg);
            }
        }
    }

    fn unavailable(&mut self) {
        self.error = Some("store not available".to_string());
    }
}

impl<R: SeriesRow> ChartState<R> {
    fn recolor(&mut self) {
        self.colors = SeriesColors::new(self.rows.iter().map(|r| r.series()));
    }
}

fn error_chain(e: &dyn Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Charts with a continent selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilteredChart {
    DailyCases,
    LatestDeaths,
    PeopleVaccinated,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Query handle; `None` when the store could not be opened.
    pub queries: Option<QueryLayer>,

    /// Selector choices, sentinel first.
    pub continent_options: Vec<String>,

    pub daily_cases: ChartState<DailyCases>,
    pub latest_deaths: ChartState<LatestDeaths>,
    pub people_vaccinated: ChartState<VaccinationPoint>,
    pub top_countries: ChartState<TopCountry>,
    pub life_expectancy: ChartState<ContinentLifeExpectancy>,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl AppState {
    /// Open the store and run every chart's initial query.
    pub fn connect(args: &StoreArgs) -> Self {
        let (queries, status_message) = match Store::open(&args.store) {
            Ok(store) => {
                log::info!(
                    "serving collection {} from {}",
                    args.collection,
                    store.path().display()
                );
                (Some(QueryLayer::new(store.collection(&args.collection))), None)
            }
            Err(e) => {
                log::error!("{e}");
                (None, Some(format!("Error: {e}")))
            }
        };

        let continent_options = match &queries {
            Some(q) => q.continent_options(),
            None => continent_options(Vec::new()),
        };

        let mut state = AppState {
            queries,
            continent_options,
            daily_cases: ChartState::default(),
            latest_deaths: ChartState::default(),
            people_vaccinated: ChartState::default(),
            top_countries: ChartState::default(),
            life_expectancy: ChartState::default(),
            status_message,
        };
        state.refresh_static();
        state.refresh(FilteredChart::DailyCases);
        state.refresh(FilteredChart::LatestDeaths);
        state.refresh(FilteredChart::PeopleVaccinated);
        state
    }

    /// The two whole-dataset charts; computed once.
    fn refresh_static(&mut self) {
        let Some(q) = &self.queries else {
            self.top_countries.unavailable();
            self.life_expectancy.unavailable();
            return;
        };
        self.top_countries
            .apply("top countries", q.top_countries_by_total_cases());
        self.life_expectancy
            .apply("life expectancy", q.life_expectancy_by_continent());
    }

    /// Handle a selector change: one query for that chart only.
    pub fn select_continent(&mut self, chart: FilteredChart, continent: &str) {
        let filter = ContinentFilter::parse(continent);
        let current = match chart {
            FilteredChart::DailyCases => &mut self.daily_cases.filter,
            FilteredChart::LatestDeaths => &mut self.latest_deaths.filter,
            FilteredChart::PeopleVaccinated => &mut self.people_vaccinated.filter,
        };
        if *current == filter {
            return;
        }
        *current = filter;
        self.refresh(chart);
    }

    pub fn filter(&self, chart: FilteredChart) -> &ContinentFilter {
        match chart {
            FilteredChart::DailyCases => &self.daily_cases.filter,
            FilteredChart::LatestDeaths => &self.latest_deaths.filter,
            FilteredChart::PeopleVaccinated => &self.people_vaccinated.filter,
        }
    }

    fn refresh(&mut self, chart: FilteredChart) {
        let Some(q) = &self.queries else {
            match chart {
                FilteredChart::DailyCases => self.daily_cases.unavailable(),
                FilteredChart::LatestDeaths => self.latest_deaths.unavailable(),
                FilteredChart::PeopleVaccinated => self.people_vaccinated.unavailable(),
            }
            return;
        };
        match chart {
            FilteredChart::DailyCases => {
                let result = q.daily_cases(&self.daily_cases.filter);
                self.daily_cases.apply("daily cases", result);
                self.daily_cases.recolor();
            }
            FilteredChart::LatestDeaths => {
                let result = q.latest_total_deaths(&self.latest_deaths.filter);
                self.latest_deaths.apply("latest deaths", result);
            }
            FilteredChart::PeopleVaccinated => {
                let result = q.people_vaccinated(&self.people_vaccinated.filter);
                self.people_vaccinated.apply("people vaccinated", result);
                self.people_vaccinated.recolor();
            }
        }
    }
}
