//! The dashboard aggregations against a freshly loaded store.

mod common;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use common::{loaded, TestResult, FIXTURE};
use covid_dashboard::{ContinentFilter, QueryError, Store, ALL_CONTINENTS};
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
}

#[test]
fn top_countries_are_latest_totals_largest_first() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    let top = queries.top_countries_by_total_cases()?;

    let names: Vec<_> = top.iter().map(|r| r.country.as_str()).collect();
    assert_eq!(names, ["World", "India", "France", "Germany", "Japan"]);
    assert_eq!(top[1].total_cases, Some(900.0));
    assert!(top
        .windows(2)
        .all(|w| w[0].total_cases.unwrap_or(f64::MIN) >= w[1].total_cases.unwrap_or(f64::MIN)));
    Ok(())
}

#[test]
fn top_countries_use_the_latest_date_not_the_last_row() -> TestResult {
    let (_tmp, _store, queries) = loaded(
        "AAA,Europe,A,2021-01-03,300,,,,\n\
         AAA,Europe,A,2021-01-01,100,,,,\n\
         BBB,Europe,B,2021-01-01,200,,,,\n",
    )?;
    let top = queries.top_countries_by_total_cases()?;
    let rows: Vec<_> = top.iter().map(|r| (r.country.as_str(), r.total_cases)).collect();
    assert_eq!(rows, [("A", Some(300.0)), ("B", Some(200.0))]);
    Ok(())
}

#[test]
fn top_countries_is_capped_at_ten() -> TestResult {
    let body: String = (0..15)
        .map(|i| format!("C{i:02},Europe,Country {i:02},2021-01-01,{},1,,,\n", i * 10))
        .collect();
    let (_tmp, _store, queries) = loaded(&body)?;
    let top = queries.top_countries_by_total_cases()?;
    assert_eq!(top.len(), 10);
    assert_eq!(top[0].country, "Country 14");
    assert_eq!(top[9].country, "Country 05");
    Ok(())
}

#[test]
fn life_expectancy_ignores_negative_values_and_missing_continents() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    let rows = queries.life_expectancy_by_continent()?;

    let continents: Vec<_> = rows.iter().map(|r| r.continent.as_str()).collect();
    assert_eq!(continents, ["Europe", "Asia"]);

    let europe = (82.7 * 3.0 + 81.3 * 2.0) / 5.0;
    let asia = (84.6 * 2.0 + 69.7) / 3.0;
    assert!((rows[0].average_life_expectancy - europe).abs() < 1e-9);
    assert!((rows[1].average_life_expectancy - asia).abs() < 1e-9);

    // means stay within the range of contributing values
    assert!(rows[1].average_life_expectancy >= 69.7 - 1e-9);
    assert!(rows[1].average_life_expectancy <= 84.6 + 1e-9);
    Ok(())
}

#[test]
fn life_expectancy_without_continents_is_empty() -> TestResult {
    let (_tmp, _store, queries) = loaded(
        "OWID_WRL,,World,2021-01-01,1,1,,,72.6\n\
         OWID_EUR,,Europe,2021-01-01,1,1,,,78.0\n",
    )?;
    assert!(queries.life_expectancy_by_continent()?.is_empty());
    Ok(())
}

#[test]
fn daily_cases_are_per_day_and_location() -> TestResult {
    let (_tmp, _store, queries) = loaded(
        "TST,Europe,Testland,2021-01-01,10,10,,,\n\
         TST,Europe,Testland,2021-01-02,30,20,,,\n\
         TST,Europe,Testland,2021-01-03,35,5,,,\n",
    )?;
    let rows = queries.daily_cases(&ContinentFilter::parse("Europe"))?;
    let points: Vec<_> = rows.iter().map(|r| (r.date, r.total_cases)).collect();
    assert_eq!(points, [(day(1), 10.0), (day(2), 20.0), (day(3), 5.0)]);
    assert!(rows.iter().all(|r| r.location == "Testland"));
    Ok(())
}

#[test]
fn daily_cases_are_sorted_by_date() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    let rows = queries.daily_cases(&ContinentFilter::All)?;
    assert_eq!(rows.len(), 10);
    assert!(rows.windows(2).all(|w| w[0].date <= w[1].date));

    let world = rows.iter().find(|r| r.location == "World").ok_or("no World row")?;
    assert_eq!((world.date, world.total_cases), (day(3), 900.0));
    Ok(())
}

#[test]
fn sentinel_results_contain_every_continent_result() -> TestResult {
    let (_tmp, store, queries) = loaded(FIXTURE)?;
    let all = ContinentFilter::parse(ALL_CONTINENTS);

    let locations = |names: Vec<String>| names.into_iter().collect::<BTreeSet<_>>().len();

    for continent in store.collection(common::COLLECTION).distinct_continents()? {
        let only = ContinentFilter::parse(&continent);

        let count = |f: &ContinentFilter| -> TestResult<[usize; 3]> {
            Ok([
                locations(queries.daily_cases(f)?.into_iter().map(|r| r.location).collect()),
                locations(queries.latest_total_deaths(f)?.into_iter().map(|r| r.country).collect()),
                locations(queries.people_vaccinated(f)?.into_iter().map(|r| r.location).collect()),
            ])
        };
        let (under_all, under_one) = (count(&all)?, count(&only)?);
        for (a, o) in under_all.iter().zip(&under_one) {
            assert!(a >= o, "{continent}: {under_all:?} vs {under_one:?}");
        }

        let everything = queries.daily_cases(&all)?;
        assert!(queries.daily_cases(&only)?.iter().all(|r| everything.contains(r)));

        let everything = queries.latest_total_deaths(&all)?;
        assert!(queries.latest_total_deaths(&only)?.iter().all(|r| everything.contains(r)));

        let everything = queries.people_vaccinated(&all)?;
        assert!(queries.people_vaccinated(&only)?.iter().all(|r| everything.contains(r)));
    }
    Ok(())
}

#[test]
fn latest_deaths_has_one_row_per_location() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    let rows = queries.latest_total_deaths(&ContinentFilter::All)?;

    let names: Vec<_> = rows.iter().map(|r| r.country.as_str()).collect();
    assert_eq!(names, ["France", "Germany", "India", "Japan", "World"]);
    let distinct: BTreeSet<_> = names.iter().collect();
    assert_eq!(distinct.len(), names.len());

    // France's latest row has no deaths figure; the earlier value is not used
    assert_eq!(rows[0].total_deaths, None);
    assert_eq!(rows[1].total_deaths, Some(4.0));
    assert_eq!(rows[2].total_deaths, Some(25.0));
    Ok(())
}

#[test]
fn vaccinations_skip_rows_without_a_value() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    let rows = queries.people_vaccinated(&ContinentFilter::parse("Asia"))?;
    let points: Vec<_> = rows
        .iter()
        .map(|r| (r.date, r.location.as_str(), r.people_vaccinated))
        .collect();
    assert_eq!(points, [(day(2), "India", 100.0), (day(3), "India", 300.0)]);
    Ok(())
}

#[test]
fn unknown_continent_yields_empty_results() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    let nowhere = ContinentFilter::parse("Atlantis");
    assert!(queries.daily_cases(&nowhere)?.is_empty());
    assert!(queries.latest_total_deaths(&nowhere)?.is_empty());
    assert!(queries.people_vaccinated(&nowhere)?.is_empty());
    Ok(())
}

#[test]
fn continent_options_start_with_the_sentinel() -> TestResult {
    let (_tmp, _store, queries) = loaded(FIXTURE)?;
    assert_eq!(queries.continent_options(), [ALL_CONTINENTS, "Asia", "Europe"]);
    Ok(())
}

#[test]
fn missing_collection_is_an_error_not_an_empty_chart() -> TestResult {
    let tmp = TempDir::new()?;
    let store = Store::create(tmp.path())?;
    let queries = covid_dashboard::QueryLayer::new(store.collection("absent"));

    let err = queries.top_countries_by_total_cases().unwrap_err();
    let QueryError::Store { query, .. } = err;
    assert_eq!(query, "top_countries_by_total_cases");
    assert!(queries.daily_cases(&ContinentFilter::All).is_err());
    assert_eq!(queries.continent_options(), [ALL_CONTINENTS]);
    Ok(())
}
