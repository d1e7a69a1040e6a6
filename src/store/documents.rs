use std::collections::{BTreeMap, BTreeSet};

use super::index::{FieldIndex, IndexKey, IndexedField};
use crate::data::model::{MetricSchema, Record};

/// A materialised collection: records in insertion order plus the
/// declared in-memory indexes.
#[derive(Debug, Clone)]
pub struct Documents {
    schema: MetricSchema,
    records: Vec<Record>,
    indexes: BTreeMap<IndexedField, FieldIndex>,
}

impl Documents {
    /// Build the documents and an index for every field in `indexed`.
    pub fn new(schema: MetricSchema, records: Vec<Record>, indexed: &[IndexedField]) -> Self {
        let indexes = indexed
            .iter()
            .map(|&field| (field, FieldIndex::build(field, &records)))
            .collect();
        Documents {
            schema,
            records,
            indexes,
        }
    }

    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn index(&self, field: IndexedField) -> Option<&FieldIndex> {
        self.indexes.get(&field)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct non-null continents.
    pub fn distinct_continents(&self) -> Vec<String> {
        if let Some(index) = self.index(IndexedField::Continent) {
            return index
                .keys()
                .filter_map(|k| match k {
                    IndexKey::Text(s) => Some(s.clone()),
                    _ => None,
                })
                .collect();
        }
        self.records
            .iter()
            .filter_map(|r| r.continent.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
