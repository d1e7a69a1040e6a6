#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covid_dashboard::{reload, QueryLayer, Store};
use tempfile::TempDir;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const COLLECTION: &str = "covid-data";

pub const HEADER: &str =
    "iso_code,continent,location,date,total_cases,new_cases,total_deaths,people_vaccinated,life_expectancy";

/// A small OWID-shaped dataset, chronological per location.
pub const FIXTURE: &str = "\
FRA,Europe,France,2021-01-01,100,100,1,,82.7
FRA,Europe,France,2021-01-02,150,50,2,10,82.7
FRA,Europe,France,2021-01-03,160,10,,30,82.7
DEU,Europe,Germany,2021-01-01,80,80,3,,81.3
DEU,Europe,Germany,2021-01-02,90,10,4,5,81.3
JPN,Asia,Japan,2021-01-01,40,40,0,,84.6
JPN,Asia,Japan,2021-01-02,45,5,1,,84.6
IND,Asia,India,2021-01-02,500,500,20,100,69.7
IND,Asia,India,2021-01-03,900,400,25,300,-1
OWID_WRL,,World,2021-01-03,2000,900,40,500,72.6
";

pub fn write_csv(dir: &Path, body: &str) -> TestResult<PathBuf> {
    let path = dir.join("owid.csv");
    std::fs::write(&path, format!("{HEADER}\n{body}"))?;
    Ok(path)
}

/// Load `body` into a fresh store and return a query handle on it.
pub fn loaded(body: &str) -> TestResult<(TempDir, Store, QueryLayer)> {
    let tmp = TempDir::new()?;
    let source = write_csv(tmp.path(), body)?;
    let store = Store::create(tmp.path().join("COVID"))?;
    reload(&store, &source, COLLECTION)?;
    let queries = QueryLayer::new(store.collection(COLLECTION));
    Ok((tmp, store, queries))
}
