//! Plain associative rows used by raw fetch mode.
//!
//! A `Row` carries no identity and no persistence capability: embedding in
//! row mode nests related rows by value under the relation name.

use crate::value::Value;
use std::collections::BTreeMap;

/// Related rows nested under an owner row
#[derive(Debug, Clone, PartialEq)]
pub enum Embedded {
    One(Option<Row>),
    Many(Vec<Row>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, Value>,
    embedded: BTreeMap<String, Embedded>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn embedded(&self, name: &str) -> Option<&Embedded> {
        self.embedded.get(name)
    }

    /// Single related row, `None` when unset or empty.
    pub fn one(&self, name: &str) -> Option<&Row> {
        match self.embedded.get(name) {
            Some(Embedded::One(row)) => row.as_ref(),
            _ => None,
        }
    }

    /// Related rows, empty when unset.
    pub fn many(&self, name: &str) -> &[Row] {
        match self.embedded.get(name) {
            Some(Embedded::Many(rows)) => rows,
            _ => &[],
        }
    }

    pub fn embed(&mut self, name: impl Into<String>, embedded: Embedded) {
        self.embedded.insert(name.into(), embedded);
    }

    pub(crate) fn take_embedded(&mut self, name: &str) -> Option<Embedded> {
        self.embedded.remove(name)
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            embedded: BTreeMap::new(),
        }
    }
}
