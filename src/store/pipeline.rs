//! Typed aggregation pipelines.
//!
//! A [`Pipeline`] is one fixed sequence of stages:
//!
//! ```text
//!  match ─▶ sort by date (optional) ─▶ group + accumulate ─▶ order ─▶ limit
//! ```
//!
//! Every stage is plain data so a query can be inspected, logged and tested
//! without a store.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::documents::Documents;
use super::index::IndexedField;
use crate::data::filter::ContinentFilter;
use crate::data::model::{parse_metric, MetricSchema, Record};

// ---------------------------------------------------------------------------
// Fields and predicates
// ---------------------------------------------------------------------------

/// A document field addressed by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    IsoCode,
    Continent,
    Location,
    Date,
    Metric(String),
}

impl Field {
    pub fn metric(name: &str) -> Self {
        Field::Metric(name.to_string())
    }

    fn indexed(&self) -> Option<IndexedField> {
        match self {
            Field::IsoCode => Some(IndexedField::IsoCode),
            Field::Continent => Some(IndexedField::Continent),
            Field::Location => Some(IndexedField::Location),
            Field::Date => Some(IndexedField::Date),
            Field::Metric(_) => None,
        }
    }
}

/// Value of a field on one record. Metrics are `Number`, nulls are `Null`.
#[derive(Debug, Clone, PartialEq)]
enum Cell<'a> {
    Null,
    Text(&'a str),
    Date(NaiveDate),
    Number(f64),
}

fn cell<'a>(record: &'a Record, schema: &MetricSchema, field: &Field) -> Cell<'a> {
    match field {
        Field::IsoCode => record.iso_code.as_deref().map_or(Cell::Null, Cell::Text),
        Field::Continent => record.continent.as_deref().map_or(Cell::Null, Cell::Text),
        Field::Location => Cell::Text(&record.location),
        Field::Date => Cell::Date(record.date),
        Field::Metric(name) => record.metric(schema, name).map_or(Cell::Null, Cell::Number),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match against a literal. Dates compare on `YYYY-MM-DD`.
    Equals { field: Field, value: String },
    /// Field is present and not null.
    NotNull(Field),
    /// Numeric field is present and `>= min`.
    AtLeast { field: Field, min: f64 },
}

impl Predicate {
    pub fn field(&self) -> &Field {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::NotNull(field)
            | Predicate::AtLeast { field, .. } => field,
        }
    }

    fn eval(&self, record: &Record, schema: &MetricSchema) -> bool {
        match self {
            Predicate::Equals { field, value } => match cell(record, schema, field) {
                Cell::Null => false,
                Cell::Text(s) => s == value,
                Cell::Date(d) => d.format("%Y-%m-%d").to_string() == *value,
                Cell::Number(n) => parse_metric(value) == Some(n),
            },
            Predicate::NotNull(field) => cell(record, schema, field) != Cell::Null,
            Predicate::AtLeast { field, min } => match cell(record, schema, field) {
                Cell::Number(n) => n >= *min,
                _ => false,
            },
        }
    }
}

/// Conjunction of predicates; empty matches everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Match {
    pub predicates: Vec<Predicate>,
}

impl Match {
    pub fn all() -> Self {
        Match::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Restrict to one continent, or nothing for [`ContinentFilter::All`].
    pub fn continent(filter: &ContinentFilter) -> Self {
        match filter.continent() {
            Some(c) => Match::all().and(Predicate::Equals {
                field: Field::Continent,
                value: c.to_string(),
            }),
            None => Match::all(),
        }
    }

    /// Positions of matching records in insertion order. An equality
    /// predicate on an indexed field narrows the scan to that index entry.
    fn positions(&self, docs: &Documents) -> Vec<usize> {
        let schema = docs.schema();
        let records = docs.records();

        let narrowed = self.predicates.iter().find_map(|p| match p {
            Predicate::Equals { field, value } => {
                let indexed = field.indexed()?;
                let index = docs.index(indexed)?;
                Some(
                    indexed
                        .key_for_literal(value)
                        .map(|key| index.lookup(&key).to_vec())
                        .unwrap_or_default(),
                )
            }
            _ => None,
        });
        let candidates = narrowed.unwrap_or_else(|| (0..records.len()).collect());

        candidates
            .into_iter()
            .filter(|&i| self.predicates.iter().all(|p| p.eval(&records[i], schema)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Grouping and accumulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Location,
    Continent,
    DateLocation,
}

impl GroupKey {
    fn key_of(self, record: &Record) -> GroupValue {
        match self {
            GroupKey::Location => GroupValue::Label(Some(record.location.clone())),
            GroupKey::Continent => GroupValue::Label(record.continent.clone()),
            GroupKey::DateLocation => GroupValue::DateLabel(record.date, record.location.clone()),
        }
    }
}

/// The `_id` of an output row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupValue {
    Label(Option<String>),
    DateLabel(NaiveDate, String),
}

/// Reduction applied to one metric within each group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulator {
    /// Value of the first document of the group (may be null).
    First(String),
    /// Value of the last document of the group (may be null).
    Last(String),
    /// Sum of non-null values; 0 when all are null.
    Sum(String),
    /// Mean of non-null values; null when all are null.
    Avg(String),
}

impl Accumulator {
    pub fn column(&self) -> &str {
        match self {
            Accumulator::First(c)
            | Accumulator::Last(c)
            | Accumulator::Sum(c)
            | Accumulator::Avg(c) => c,
        }
    }

    fn start(&self) -> Reduction {
        match self {
            Accumulator::First(_) => Reduction::First(None),
            Accumulator::Last(_) => Reduction::Last(None),
            Accumulator::Sum(_) => Reduction::Sum(0.0),
            Accumulator::Avg(_) => Reduction::Avg { sum: 0.0, count: 0 },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Reduction {
    First(Option<Option<f64>>),
    Last(Option<f64>),
    Sum(f64),
    Avg { sum: f64, count: usize },
}

impl Reduction {
    fn push(&mut self, value: Option<f64>) {
        match self {
            Reduction::First(slot) => {
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
            Reduction::Last(slot) => *slot = value,
            Reduction::Sum(sum) => *sum += value.unwrap_or(0.0),
            Reduction::Avg { sum, count } => {
                if let Some(v) = value {
                    *sum += v;
                    *count += 1;
                }
            }
        }
    }

    fn finish(self) -> Option<f64> {
        match self {
            Reduction::First(v) => v.flatten(),
            Reduction::Last(v) => v,
            Reduction::Sum(sum) => Some(sum),
            Reduction::Avg { sum, count } => (count > 0).then(|| sum / count as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOrder {
    /// By group key; date-keyed groups order by date, then label.
    KeyAscending,
    /// By accumulated value, nulls last; ties by key.
    ValueDescending,
}

/// One output row of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: GroupValue,
    pub value: Option<f64>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Short name used in logs.
    pub name: &'static str,
    pub filter: Match,
    /// Stable reorder of the matched documents by date before grouping.
    pub sort_by_date: Option<SortOrder>,
    pub group_by: GroupKey,
    pub accumulator: Accumulator,
    pub order: OutputOrder,
    pub limit: Option<usize>,
}

impl Pipeline {
    /// Metric columns read by the filter or the accumulator, without duplicates.
    pub fn metric_columns(&self) -> Vec<String> {
        let mut columns = vec![self.accumulator.column().to_string()];
        for predicate in &self.filter.predicates {
            if let Field::Metric(name) = predicate.field() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    /// Execute the pipeline over a materialised collection.
    pub fn run(&self, docs: &Documents) -> Vec<GroupRow> {
        let mut positions = self.filter.positions(docs);
        if let Some(order) = self.sort_by_date {
            positions = sort_by_date(docs, positions, order);
        }

        let records = docs.records();
        let metric = docs.schema().position(self.accumulator.column());
        let mut groups: BTreeMap<GroupValue, Reduction> = BTreeMap::new();
        for &i in &positions {
            let rec = &records[i];
            let value = metric.and_then(|p| rec.metric_at(p));
            groups
                .entry(self.group_by.key_of(rec))
                .or_insert_with(|| self.accumulator.start())
                .push(value);
        }

        let mut rows: Vec<GroupRow> = groups
            .into_iter()
            .map(|(key, reduction)| GroupRow {
                key,
                value: reduction.finish(),
            })
            .collect();

        if self.order == OutputOrder::ValueDescending {
            rows.sort_by(|a, b| desc_nulls_last(a.value, b.value).then_with(|| a.key.cmp(&b.key)));
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        log::debug!(
            "pipeline {}: {} of {} documents matched, {} rows",
            self.name,
            positions.len(),
            docs.len(),
            rows.len()
        );
        rows
    }
}

fn desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable reorder by date. Walks the date index when the collection has one.
fn sort_by_date(docs: &Documents, mut positions: Vec<usize>, order: SortOrder) -> Vec<usize> {
    let descending = order == SortOrder::Descending;
    if let Some(index) = docs.index(IndexedField::Date) {
        let mut selected = vec![false; docs.len()];
        for &p in &positions {
            selected[p] = true;
        }
        return index
            .ordered_positions(descending)
            .into_iter()
            .filter(|&p| selected[p])
            .collect();
    }

    let records = docs.records();
    if descending {
        positions.sort_by(|&a, &b| records[b].date.cmp(&records[a].date));
    } else {
        positions.sort_by_key(|&p| records[p].date);
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, d).unwrap()
    }

    fn rec(location: &str, continent: Option<&str>, d: u32, value: Option<f64>) -> Record {
        Record {
            iso_code: None,
            continent: continent.map(str::to_string),
            location: location.into(),
            date: day(d),
            metrics: vec![value],
        }
    }

    fn docs(records: Vec<Record>, indexed: &[IndexedField]) -> Documents {
        Documents::new(MetricSchema::new(vec!["m".into()]), records, indexed)
    }

    fn pipeline(group_by: GroupKey, accumulator: Accumulator) -> Pipeline {
        Pipeline {
            name: "test",
            filter: Match::all(),
            sort_by_date: None,
            group_by,
            accumulator,
            order: OutputOrder::KeyAscending,
            limit: None,
        }
    }

    #[test]
    fn sum_treats_nulls_as_zero() {
        let d = docs(
            vec![
                rec("A", None, 1, Some(2.0)),
                rec("A", None, 1, None),
                rec("A", None, 1, Some(3.0)),
                rec("B", None, 1, None),
            ],
            &[],
        );
        let rows = pipeline(GroupKey::Location, Accumulator::Sum("m".into())).run(&d);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(5.0));
        assert_eq!(rows[1].value, Some(0.0));
    }

    #[test]
    fn avg_ignores_nulls() {
        let d = docs(
            vec![
                rec("A", Some("X"), 1, Some(2.0)),
                rec("B", Some("X"), 1, None),
                rec("C", Some("X"), 1, Some(4.0)),
                rec("D", Some("Y"), 1, None),
            ],
            &[],
        );
        let rows = pipeline(GroupKey::Continent, Accumulator::Avg("m".into())).run(&d);
        assert_eq!(rows[0].value, Some(3.0));
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn first_after_descending_sort_is_latest() {
        let records = vec![
            rec("A", None, 1, Some(1.0)),
            rec("A", None, 3, Some(3.0)),
            rec("A", None, 2, Some(2.0)),
        ];
        let mut p = pipeline(GroupKey::Location, Accumulator::First("m".into()));
        p.sort_by_date = Some(SortOrder::Descending);

        let scanned = p.run(&docs(records.clone(), &[]));
        let indexed = p.run(&docs(records, &[IndexedField::Date]));
        assert_eq!(scanned[0].value, Some(3.0));
        assert_eq!(scanned, indexed);
    }

    #[test]
    fn first_keeps_a_leading_null() {
        let d = docs(vec![rec("A", None, 1, None), rec("A", None, 2, Some(9.0))], &[]);
        let rows = pipeline(GroupKey::Location, Accumulator::First("m".into())).run(&d);
        assert_eq!(rows[0].value, None);
    }

    #[test]
    fn value_descending_puts_nulls_last_and_limits() {
        let d = docs(
            vec![
                rec("A", None, 1, Some(1.0)),
                rec("B", None, 1, None),
                rec("C", None, 1, Some(5.0)),
                rec("D", None, 1, Some(3.0)),
            ],
            &[],
        );
        let mut p = pipeline(GroupKey::Location, Accumulator::Last("m".into()));
        p.order = OutputOrder::ValueDescending;
        let rows = p.run(&d);
        let values: Vec<_> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![Some(5.0), Some(3.0), Some(1.0), None]);

        p.limit = Some(2);
        assert_eq!(p.run(&d).len(), 2);
    }

    #[test]
    fn indexed_and_scanned_matches_agree() {
        let records = vec![
            rec("A", Some("Europe"), 1, Some(1.0)),
            rec("B", Some("Asia"), 1, Some(2.0)),
            rec("C", Some("Europe"), 2, None),
        ];
        let filter = Match::continent(&ContinentFilter::from("Europe"))
            .and(Predicate::NotNull(Field::metric("m")));

        let scanned = filter.positions(&docs(records.clone(), &[]));
        let indexed = filter.positions(&docs(records, &[IndexedField::Continent]));
        assert_eq!(scanned, vec![0]);
        assert_eq!(scanned, indexed);
    }

    #[test]
    fn continent_match_is_exact() {
        let d = docs(
            vec![
                rec("A", Some("Asia"), 1, None),
                rec("B", Some("asia"), 1, None),
                rec("C", None, 1, None),
            ],
            &[],
        );
        assert_eq!(Match::continent(&"Asia".into()).positions(&d), vec![0]);
        assert_eq!(Match::continent(&ContinentFilter::All).positions(&d), vec![0, 1, 2]);
    }

    #[test]
    fn predicates_on_missing_metric_never_match() {
        let d = docs(vec![rec("A", None, 1, Some(1.0))], &[]);
        let absent = Match::all().and(Predicate::NotNull(Field::metric("missing")));
        let at_least = Match::all().and(Predicate::AtLeast {
            field: Field::metric("m"),
            min: 0.0,
        });
        assert!(absent.positions(&d).is_empty());
        assert_eq!(at_least.positions(&d), vec![0]);
    }

    #[test]
    fn equals_on_date_uses_iso_text() {
        let d = docs(vec![rec("A", None, 1, None), rec("B", None, 2, None)], &[]);
        let m = Match::all().and(Predicate::Equals {
            field: Field::Date,
            value: "2021-06-02".into(),
        });
        assert_eq!(m.positions(&d), vec![1]);
        assert_eq!(m.positions(&docs(d.records().to_vec(), &[IndexedField::Date])), vec![1]);
    }

    #[test]
    fn date_location_groups_order_by_date_then_location() {
        let d = docs(
            vec![
                rec("B", None, 2, Some(1.0)),
                rec("A", None, 2, Some(1.0)),
                rec("C", None, 1, Some(1.0)),
            ],
            &[],
        );
        let rows = pipeline(GroupKey::DateLocation, Accumulator::Sum("m".into())).run(&d);
        let keys: Vec<_> = rows.into_iter().map(|r| r.key).collect();
        assert_eq!(
            keys,
            vec![
                GroupValue::DateLabel(day(1), "C".into()),
                GroupValue::DateLabel(day(2), "A".into()),
                GroupValue::DateLabel(day(2), "B".into()),
            ]
        );
    }

    #[test]
    fn metric_columns_cover_filter_and_accumulator() {
        let mut p = pipeline(GroupKey::Continent, Accumulator::Avg("life_expectancy".into()));
        p.filter = Match::all()
            .and(Predicate::NotNull(Field::Continent))
            .and(Predicate::AtLeast {
                field: Field::metric("life_expectancy"),
                min: 0.0,
            })
            .and(Predicate::NotNull(Field::metric("population")));
        assert_eq!(p.metric_columns(), vec!["life_expectancy", "population"]);
    }
}
