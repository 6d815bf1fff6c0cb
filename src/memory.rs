//! In-memory `Finder` + `Persist` backend.
//!
//! Tables are keyed by the schema's source name and hold plain field maps.
//! Every call is recorded so callers can assert on the exact queries and
//! writes a cascade produced. Integer primary keys are assigned from a
//! per-table serial.

use crate::condition::{Conditions, FetchOptions, Fields, ReturnMode};
use crate::entity::EntityRef;
use crate::error::LifelineError;
use crate::row::Row;
use crate::schema::Schema;
use crate::source::{Fetched, Finder, Persist};
use crate::value::{is_null, key_of, key_of_opt, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

type Record = BTreeMap<String, Value>;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindAll {
        source: String,
        conditions: Conditions,
        options: FetchOptions,
    },
    Save {
        source: String,
        fields: Record,
    },
    Truncate {
        source: String,
        conditions: Conditions,
    },
}

impl Call {
    pub fn source(&self) -> &str {
        match self {
            Call::FindAll { source, .. } | Call::Save { source, .. } | Call::Truncate { source, .. } => {
                source
            }
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    records: Vec<Record>,
}

impl Table {
    fn position(&self, primary_key: &str, key: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| key_of_opt(record.get(primary_key)).as_deref() == Some(key))
    }

    fn reserve(&mut self, value: Option<&Value>) {
        let id = match value {
            Some(Value::BigInt(Some(id))) => *id,
            Some(Value::Int(Some(id))) => i64::from(*id),
            Some(Value::Unsigned(Some(id))) => i64::from(*id),
            _ => return,
        };
        self.next_id = self.next_id.max(id);
    }

    fn assign(&mut self) -> Value {
        self.next_id += 1;
        Value::BigInt(Some(self.next_id))
    }
}

#[derive(Debug, Default)]
pub struct MemorySource {
    tables: RefCell<BTreeMap<String, Table>>,
    calls: RefCell<Vec<Call>>,
    rejected: RefCell<Vec<(String, String, Value)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records directly, without recording calls.
    ///
    /// Records missing a primary key get the next serial value.
    pub fn seed<I, R>(&self, schema: &Schema, records: I)
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut tables = self.tables.borrow_mut();
        let table = tables.entry(schema.source().to_string()).or_default();
        for record in records {
            let mut record: Record = record.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
            match record.get(schema.primary_key()).filter(|v| !is_null(v)) {
                Some(value) => table.reserve(Some(value)),
                None => {
                    let id = table.assign();
                    record.insert(schema.primary_key().to_string(), id);
                }
            }
            table.records.push(record);
        }
    }

    /// Make saves of `source` records whose `field` equals `value` fail.
    pub fn reject(&self, source: impl Into<String>, field: impl Into<String>, value: impl Into<Value>) {
        self.rejected
            .borrow_mut()
            .push((source.into(), field.into(), value.into()));
    }

    /// Current contents of `source`, in insertion order.
    pub fn rows(&self, source: &str) -> Vec<Row> {
        self.tables
            .borrow()
            .get(source)
            .map(|table| {
                table
                    .records
                    .iter()
                    .map(|record| record.clone().into_iter().collect())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stored record of `source` with primary key `key`.
    pub fn row(&self, source: &str, primary_key: &str, key: impl Into<Value>) -> Option<Row> {
        let key = key_of(&key.into())?;
        let tables = self.tables.borrow();
        let table = tables.get(source)?;
        table
            .position(primary_key, &key)
            .map(|index| table.records[index].clone().into_iter().collect())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of `find_all` calls recorded so far.
    pub fn find_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::FindAll { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        log::trace!("memory source call: {call:?}");
        self.calls.borrow_mut().push(call);
    }

    fn is_rejected(&self, source: &str, entity: &EntityRef) -> bool {
        self.rejected.borrow().iter().any(|(s, field, value)| {
            s == source
                && key_of_opt(entity.get(field).as_ref()).is_some_and(|k| Some(k) == key_of(value))
        })
    }
}

impl Finder for MemorySource {
    fn find_all(
        &self,
        schema: &Rc<Schema>,
        conditions: &Conditions,
        options: &FetchOptions,
    ) -> Result<Fetched, LifelineError> {
        self.record(Call::FindAll {
            source: schema.source().to_string(),
            conditions: conditions.clone(),
            options: options.clone(),
        });

        let matched: Vec<Record> = self
            .tables
            .borrow()
            .get(schema.source())
            .map(|table| {
                table
                    .records
                    .iter()
                    .filter(|record| conditions.matches(|field| record.get(field).cloned()))
                    .map(|record| project(record, &options.fields))
                    .collect()
            })
            .unwrap_or_default();

        Ok(match options.returning {
            ReturnMode::Entities => {
                Fetched::Entities(matched.into_iter().map(|record| schema.load(record)).collect())
            }
            ReturnMode::Rows => {
                Fetched::Rows(matched.into_iter().map(|record| record.into_iter().collect()).collect())
            }
        })
    }
}

impl Persist for MemorySource {
    fn save(&self, schema: &Schema, entity: &EntityRef) -> Result<bool, LifelineError> {
        let source = schema.source().to_string();
        if self.is_rejected(&source, entity) {
            self.record(Call::Save {
                source,
                fields: entity.fields(),
            });
            log::debug!("memory source rejected a `{}` save", schema.name());
            return Ok(false);
        }

        {
            let mut tables = self.tables.borrow_mut();
            let table = tables.entry(source.clone()).or_default();
            let primary_key = schema.primary_key();
            let existing = key_of_opt(entity.get(primary_key).as_ref())
                .and_then(|key| table.position(primary_key, &key));
            match existing {
                Some(index) => table.records[index] = entity.fields(),
                None => {
                    match entity.get(primary_key).filter(|v| !is_null(v)) {
                        Some(value) => table.reserve(Some(&value)),
                        None => entity.set(primary_key, table.assign()),
                    }
                    table.records.push(entity.fields());
                }
            }
        }

        self.record(Call::Save {
            source,
            fields: entity.fields(),
        });
        entity.mark_persisted();
        Ok(true)
    }

    fn truncate(&self, schema: &Schema, conditions: &Conditions) -> Result<bool, LifelineError> {
        self.record(Call::Truncate {
            source: schema.source().to_string(),
            conditions: conditions.clone(),
        });
        if let Some(table) = self.tables.borrow_mut().get_mut(schema.source()) {
            table
                .records
                .retain(|record| !conditions.matches(|field| record.get(field).cloned()));
        }
        Ok(true)
    }
}

fn project(record: &Record, fields: &Fields) -> Record {
    match fields {
        Fields::All => record.clone(),
        Fields::Only(names) => record
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::registry::Registry;

    fn setup() -> (Rc<MemorySource>, Rc<Schema>) {
        let store = Rc::new(MemorySource::new());
        let registry = Registry::builder()
            .model(ModelConfig::new("Image"), store.clone())
            .build()
            .expect("registry");
        let schema = registry.schema("Image").expect("schema");
        (store, schema)
    }

    #[test]
    fn test_save_assigns_serial_keys() {
        let (store, schema) = setup();
        store.seed(&schema, [[("id", Value::BigInt(Some(3)))]]);

        let image = schema.create([("title", "Amiga 1200")]);
        assert!(store.save(&schema, &image).expect("save"));
        assert_eq!(image.primary_key(), Some(Value::BigInt(Some(4))));
        assert!(image.exists());
        assert!(!image.modified("title"));
        assert_eq!(store.rows("image").len(), 2);
    }

    #[test]
    fn test_save_updates_in_place() {
        let (store, schema) = setup();
        store.seed(&schema, [[("id", Value::BigInt(Some(1))), ("title", "old".into())]]);

        let image = schema.load([("id", Value::BigInt(Some(1))), ("title", "new".into())]);
        assert!(store.save(&schema, &image).expect("save"));
        let stored = store.row("image", "id", 1).expect("stored row");
        assert_eq!(stored.get("title"), Some(&Value::from("new")));
        assert_eq!(store.rows("image").len(), 1);
    }

    #[test]
    fn test_find_all_filters_and_projects() {
        let (store, schema) = setup();
        store.seed(
            &schema,
            [
                [("gallery_id", Value::Int(Some(1))), ("title", "a".into())],
                [("gallery_id", Value::Int(Some(2))), ("title", "b".into())],
            ],
        );

        let options = FetchOptions::rows().fields(Fields::Only(vec!["title".to_string()]));
        let fetched = store
            .find_all(&schema, &Conditions::new().eq("gallery_id", 2), &options)
            .expect("find");
        let Fetched::Rows(rows) = fetched else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title"), Some(&Value::from("b")));
        assert!(rows[0].get("gallery_id").is_none());
        assert_eq!(store.find_count(), 1);
    }

    #[test]
    fn test_rejected_save_is_recorded_but_not_stored() {
        let (store, schema) = setup();
        store.reject("image", "title", "broken");

        let image = schema.create([("title", "broken")]);
        assert!(!store.save(&schema, &image).expect("save"));
        assert!(!image.exists());
        assert!(store.rows("image").is_empty());
        assert_eq!(store.calls().len(), 1);
    }

    #[test]
    fn test_truncate_removes_matching() {
        let (store, schema) = setup();
        store.seed(
            &schema,
            [
                [("id", Value::BigInt(Some(5)))],
                [("id", Value::BigInt(Some(6)))],
            ],
        );
        assert!(store
            .truncate(&schema, &Conditions::new().is_in("id", [5]))
            .expect("truncate"));
        assert_eq!(store.rows("image").len(), 1);
        assert!(store.row("image", "id", 6).is_some());
    }
}
