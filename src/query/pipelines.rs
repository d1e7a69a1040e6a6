use crate::data::filter::ContinentFilter;
use crate::store::pipeline::{
    Accumulator, Field, GroupKey, Match, OutputOrder, Pipeline, Predicate, SortOrder,
};

pub const TOTAL_CASES: &str = "total_cases";
pub const NEW_CASES: &str = "new_cases";
pub const TOTAL_DEATHS: &str = "total_deaths";
pub const PEOPLE_VACCINATED: &str = "people_vaccinated";
pub const LIFE_EXPECTANCY: &str = "life_expectancy";

pub const TOP_N: usize = 10;

/// Latest `total_cases` per location, largest first.
pub fn top_countries_by_total_cases() -> Pipeline {
    Pipeline {
        name: "top_countries_by_total_cases",
        filter: Match::all(),
        // "last" must mean latest date, not whatever order the segments hold
        sort_by_date: Some(SortOrder::Ascending),
        group_by: GroupKey::Location,
        accumulator: Accumulator::Last(TOTAL_CASES.into()),
        order: OutputOrder::ValueDescending,
        limit: Some(TOP_N),
    }
}

/// Mean `life_expectancy` per continent over rows with a continent and a
/// non-negative value.
pub fn life_expectancy_by_continent() -> Pipeline {
    Pipeline {
        name: "life_expectancy_by_continent",
        filter: Match::all()
            .and(Predicate::NotNull(Field::Continent))
            .and(Predicate::AtLeast {
                field: Field::metric(LIFE_EXPECTANCY),
                min: 0.0,
            }),
        sort_by_date: None,
        group_by: GroupKey::Continent,
        accumulator: Accumulator::Avg(LIFE_EXPECTANCY.into()),
        order: OutputOrder::ValueDescending,
        limit: None,
    }
}

/// `new_cases` summed per day and location.
pub fn daily_cases(filter: &ContinentFilter) -> Pipeline {
    Pipeline {
        name: "daily_cases",
        filter: Match::continent(filter),
        sort_by_date: None,
        group_by: GroupKey::DateLocation,
        accumulator: Accumulator::Sum(NEW_CASES.into()),
        order: OutputOrder::KeyAscending,
        limit: None,
    }
}

/// Most recent `total_deaths` per location, by location name.
pub fn latest_total_deaths(filter: &ContinentFilter) -> Pipeline {
    Pipeline {
        name: "latest_total_deaths",
        filter: Match::continent(filter),
        sort_by_date: Some(SortOrder::Descending),
        group_by: GroupKey::Location,
        accumulator: Accumulator::First(TOTAL_DEATHS.into()),
        order: OutputOrder::KeyAscending,
        limit: None,
    }
}

/// `people_vaccinated` per day and location, rows without a value skipped.
pub fn people_vaccinated(filter: &ContinentFilter) -> Pipeline {
    Pipeline {
        name: "people_vaccinated",
        filter: Match::continent(filter).and(Predicate::NotNull(Field::metric(PEOPLE_VACCINATED))),
        sort_by_date: None,
        group_by: GroupKey::DateLocation,
        accumulator: Accumulator::Last(PEOPLE_VACCINATED.into()),
        order: OutputOrder::KeyAscending,
        limit: None,
    }
}
