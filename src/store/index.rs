use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::data::model::{parse_date, Record, CONTINENT, DATE, ISO_CODE, LOCATION};

// ---------------------------------------------------------------------------
// Indexable fields
// ---------------------------------------------------------------------------

/// Fields a collection can declare an index on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexedField {
    IsoCode,
    Continent,
    Location,
    Date,
}

impl IndexedField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            ISO_CODE => Some(IndexedField::IsoCode),
            CONTINENT => Some(IndexedField::Continent),
            LOCATION => Some(IndexedField::Location),
            DATE => Some(IndexedField::Date),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexedField::IsoCode => ISO_CODE,
            IndexedField::Continent => CONTINENT,
            IndexedField::Location => LOCATION,
            IndexedField::Date => DATE,
        }
    }

    /// Index key of a record for this field.
    pub fn key_of(self, record: &Record) -> IndexKey {
        let text = |v: &Option<String>| v.clone().map_or(IndexKey::Null, IndexKey::Text);
        match self {
            IndexedField::IsoCode => text(&record.iso_code),
            IndexedField::Continent => text(&record.continent),
            IndexedField::Location => IndexKey::Text(record.location.clone()),
            IndexedField::Date => IndexKey::Date(record.date),
        }
    }

    /// Index key for a literal compared against this field.
    /// Returns `None` when the literal can never match (e.g. an unparseable date).
    pub fn key_for_literal(self, value: &str) -> Option<IndexKey> {
        match self {
            IndexedField::Date => parse_date(value).map(IndexKey::Date),
            _ => Some(IndexKey::Text(value.to_string())),
        }
    }
}

/// Ordered key of an index entry. Nulls sort first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Null,
    Text(String),
    Date(NaiveDate),
}

// ---------------------------------------------------------------------------
// FieldIndex
// ---------------------------------------------------------------------------

/// Ascending single-field index: key → record positions in insertion order.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    entries: BTreeMap<IndexKey, Vec<usize>>,
}

impl FieldIndex {
    pub fn build(field: IndexedField, records: &[Record]) -> Self {
        let mut entries: BTreeMap<IndexKey, Vec<usize>> = BTreeMap::new();
        for (pos, rec) in records.iter().enumerate() {
            entries.entry(field.key_of(rec)).or_default().push(pos);
        }
        FieldIndex { entries }
    }

    /// Positions of records whose key equals `key`, ascending.
    pub fn lookup(&self, key: &IndexKey) -> &[usize] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.entries.keys()
    }

    /// All positions in key order; equal keys keep insertion order.
    pub fn ordered_positions(&self, descending: bool) -> Vec<usize> {
        if descending {
            self.entries.values().rev().flatten().copied().collect()
        } else {
            self.entries.values().flatten().copied().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(location: &str, continent: Option<&str>, day: u32) -> Record {
        Record {
            iso_code: None,
            continent: continent.map(str::to_string),
            location: location.into(),
            date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            metrics: Vec::new(),
        }
    }

    #[test]
    fn lookup_returns_positions_in_insertion_order() {
        let records = vec![
            rec("A", Some("Europe"), 1),
            rec("B", Some("Asia"), 1),
            rec("C", Some("Europe"), 2),
            rec("D", None, 2),
        ];
        let idx = FieldIndex::build(IndexedField::Continent, &records);
        assert_eq!(idx.lookup(&IndexKey::Text("Europe".into())), &[0, 2]);
        assert_eq!(idx.lookup(&IndexKey::Null), &[3]);
        assert!(idx.lookup(&IndexKey::Text("Oceania".into())).is_empty());
        assert_eq!(idx.keys().next(), Some(&IndexKey::Null));
    }

    #[test]
    fn date_order_is_stable_within_a_day() {
        let records = vec![
            rec("A", None, 3),
            rec("B", None, 1),
            rec("C", None, 3),
            rec("D", None, 2),
        ];
        let idx = FieldIndex::build(IndexedField::Date, &records);
        assert_eq!(idx.ordered_positions(false), vec![1, 3, 0, 2]);
        assert_eq!(idx.ordered_positions(true), vec![0, 2, 3, 1]);
    }

    #[test]
    fn only_identifier_fields_are_indexable() {
        assert_eq!(IndexedField::parse("continent"), Some(IndexedField::Continent));
        assert_eq!(IndexedField::parse("date"), Some(IndexedField::Date));
        assert_eq!(IndexedField::parse("total_cases"), None);
        assert_eq!(IndexedField::Date.key_for_literal("not a date"), None);
    }
}
