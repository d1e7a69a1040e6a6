//! Query/aggregation layer feeding the dashboard.
//!
//! Every operation runs one typed [`Pipeline`](crate::store::Pipeline)
//! against the collection and maps the grouped rows into a named row type.
//! Nothing here writes to the store; an empty result is a valid result.

pub mod pipelines;

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::filter::{continent_options, ContinentFilter};
use crate::store::pipeline::GroupValue;
use crate::store::{Collection, GroupRow, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query {query} failed")]
    Store {
        query: &'static str,
        #[source]
        source: StoreError,
    },
}

pub type QueryResult<T> = Result<T, QueryError>;

// ---------------------------------------------------------------------------
// Row types handed to the renderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCountry {
    pub country: String,
    pub total_cases: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinentLifeExpectancy {
    pub continent: String,
    pub average_life_expectancy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCases {
    pub date: NaiveDate,
    pub location: String,
    pub total_cases: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestDeaths {
    pub country: String,
    pub total_deaths: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccinationPoint {
    pub date: NaiveDate,
    pub location: String,
    pub people_vaccinated: f64,
}

// ---------------------------------------------------------------------------
// QueryLayer
// ---------------------------------------------------------------------------

/// Read-only aggregations over one collection.
#[derive(Debug, Clone)]
pub struct QueryLayer {
    collection: Collection,
}

impl QueryLayer {
    pub fn new(collection: Collection) -> Self {
        QueryLayer { collection }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    fn run(&self, pipeline: crate::store::Pipeline) -> QueryResult<Vec<GroupRow>> {
        let query = pipeline.name;
        self.collection
            .aggregate(&pipeline)
            .map_err(|source| QueryError::Store { query, source })
    }

    /// Ten locations with the highest latest `total_cases`.
    pub fn top_countries_by_total_cases(&self) -> QueryResult<Vec<TopCountry>> {
        let rows = self.run(pipelines::top_countries_by_total_cases())?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(TopCountry {
                    country: label(row.key)?,
                    total_cases: row.value,
                })
            })
            .collect())
    }

    /// Average life expectancy per continent, highest first.
    pub fn life_expectancy_by_continent(&self) -> QueryResult<Vec<ContinentLifeExpectancy>> {
        let rows = self.run(pipelines::life_expectancy_by_continent())?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(ContinentLifeExpectancy {
                    continent: label(row.key)?,
                    average_life_expectancy: row.value?,
                })
            })
            .collect())
    }

    /// New cases per day and location, ascending by date.
    pub fn daily_cases(&self, filter: &ContinentFilter) -> QueryResult<Vec<DailyCases>> {
        let rows = self.run(pipelines::daily_cases(filter))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let (date, location) = date_label(row.key)?;
                Some(DailyCases {
                    date,
                    location,
                    total_cases: row.value.unwrap_or(0.0),
                })
            })
            .collect())
    }

    /// Most recent total deaths per location, ascending by location.
    pub fn latest_total_deaths(&self, filter: &ContinentFilter) -> QueryResult<Vec<LatestDeaths>> {
        let rows = self.run(pipelines::latest_total_deaths(filter))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(LatestDeaths {
                    country: label(row.key)?,
                    total_deaths: row.value,
                })
            })
            .collect())
    }

    /// People vaccinated per day and location, ascending by date.
    pub fn people_vaccinated(&self, filter: &ContinentFilter) -> QueryResult<Vec<VaccinationPoint>> {
        let rows = self.run(pipelines::people_vaccinated(filter))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let (date, location) = date_label(row.key)?;
                Some(VaccinationPoint {
                    date,
                    location,
                    people_vaccinated: row.value?,
                })
            })
            .collect())
    }

    /// Selector choices. Falls back to the sentinel alone when the store
    /// cannot be read.
    pub fn continent_options(&self) -> Vec<String> {
        match self.collection.distinct_continents() {
            Ok(continents) => continent_options(continents),
            Err(e) => {
                log::error!("could not list continents: {e}");
                continent_options(Vec::new())
            }
        }
    }
}

fn label(key: GroupValue) -> Option<String> {
    match key {
        GroupValue::Label(l) => l,
        GroupValue::DateLabel(..) => None,
    }
}

fn date_label(key: GroupValue) -> Option<(NaiveDate, String)> {
    match key {
        GroupValue::DateLabel(d, l) => Some((d, l)),
        GroupValue::Label(_) => None,
    }
}
