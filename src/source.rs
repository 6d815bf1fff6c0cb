//! Capabilities the engine consumes from the storage layer.
//!
//! A `Finder` answers "run a query, get rows"; a `Persist` writes one record
//! at a time and hard-deletes by key set. Both are registered per type in the
//! [`Registry`](crate::Registry) and resolved once when schemas are built.

use crate::condition::{Conditions, FetchOptions};
use crate::entity::EntityRef;
use crate::error::LifelineError;
use crate::row::Row;
use crate::schema::Schema;
use std::rc::Rc;

/// Result of a `Finder::find_all` call
#[derive(Debug)]
pub enum Fetched {
    Entities(Vec<EntityRef>),
    Rows(Vec<Row>),
}

impl Fetched {
    pub fn len(&self) -> usize {
        match self {
            Fetched::Entities(e) => e.len(),
            Fetched::Rows(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read capability for one type
///
/// Implementations hydrate entities through `schema` (`Schema::load`) when
/// `options.returning` is `ReturnMode::Entities` and return plain rows
/// otherwise.
pub trait Finder {
    fn find_all(
        &self,
        schema: &Rc<Schema>,
        conditions: &Conditions,
        options: &FetchOptions,
    ) -> Result<Fetched, LifelineError>;
}

/// Write capability for one type
pub trait Persist {
    /// Insert or update a single record, without touching its relations.
    ///
    /// On success the implementation assigns the primary key of inserted
    /// records and calls [`EntityRef::mark_persisted`]. `Ok(false)` reports a
    /// rejected write.
    fn save(&self, schema: &Schema, entity: &EntityRef) -> Result<bool, LifelineError>;

    /// Hard-delete every record matching `conditions`.
    fn truncate(&self, schema: &Schema, conditions: &Conditions) -> Result<bool, LifelineError>;
}
