//! Record handles: one entity, or an ordered list of entities.
//!
//! An [`EntityRef`] is a shared, interior-mutable handle, so an entity
//! reachable from several owners (or from an owner and a previously loaded
//! set) is one object. A [`Collection`] is the ordered list-of-records handle
//! stored under has-many style relations.
//!
//! Handles borrow their inner state only for the duration of a single
//! accessor call, so cascades can freely walk from an owner to its children
//! and back.

use crate::error::LifelineError;
use crate::relation::Relation;
use crate::row::{Embedded, Row};
use crate::schema::Schema;
use crate::value::{is_null, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Related data stored on an owner under a relation name
#[derive(Clone, Debug)]
pub enum Association {
    One(Option<EntityRef>),
    Many(Collection),
}

struct Entity {
    schema: Rc<Schema>,
    fields: BTreeMap<String, Value>,
    persisted: BTreeMap<String, Value>,
    associations: BTreeMap<String, Association>,
    touched: BTreeSet<String>,
    exists: bool,
}

/// Shared handle to a single record
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<Entity>>);

impl EntityRef {
    pub(crate) fn new(schema: Rc<Schema>, fields: BTreeMap<String, Value>, exists: bool) -> Self {
        let persisted = if exists { fields.clone() } else { BTreeMap::new() };
        Self(Rc::new(RefCell::new(Entity {
            schema,
            fields,
            persisted,
            associations: BTreeMap::new(),
            touched: BTreeSet::new(),
            exists,
        })))
    }

    pub fn schema(&self) -> Rc<Schema> {
        Rc::clone(&self.0.borrow().schema)
    }

    pub fn type_name(&self) -> String {
        self.0.borrow().schema.name().to_string()
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.borrow().fields.get(field).cloned()
    }

    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().fields.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> BTreeMap<String, Value> {
        self.0.borrow().fields.clone()
    }

    /// Primary key value, `None` until the record has one.
    pub fn primary_key(&self) -> Option<Value> {
        let inner = self.0.borrow();
        inner
            .fields
            .get(inner.schema.primary_key())
            .filter(|v| !is_null(v))
            .cloned()
    }

    pub fn exists(&self) -> bool {
        self.0.borrow().exists
    }

    pub fn set_exists(&self, exists: bool) {
        self.0.borrow_mut().exists = exists;
    }

    /// Whether `name` differs from its persisted value.
    ///
    /// For a relation name, whether the association was assigned since it was
    /// last embedded.
    pub fn modified(&self, name: &str) -> bool {
        let inner = self.0.borrow();
        if inner.associations.contains_key(name) {
            return inner.touched.contains(name);
        }
        inner.fields.get(name) != inner.persisted.get(name)
    }

    /// Field names whose values differ from the persisted snapshot.
    pub fn modified_fields(&self) -> Vec<String> {
        let inner = self.0.borrow();
        let mut names: BTreeSet<&String> = inner.fields.keys().collect();
        names.extend(inner.persisted.keys());
        names
            .into_iter()
            .filter(|name| inner.fields.get(*name) != inner.persisted.get(*name))
            .cloned()
            .collect()
    }

    /// Record the current field values as stored; called by `Persist` implementations.
    pub fn mark_persisted(&self) {
        let mut inner = self.0.borrow_mut();
        inner.persisted = inner.fields.clone();
        inner.exists = true;
    }

    /// Whether an association has been set under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.0.borrow().associations.contains_key(name)
    }

    pub fn association(&self, name: &str) -> Option<Association> {
        self.0.borrow().associations.get(name).cloned()
    }

    /// Single related entity stored under `name`.
    pub fn one(&self, name: &str) -> Option<EntityRef> {
        match self.0.borrow().associations.get(name) {
            Some(Association::One(related)) => related.clone(),
            Some(Association::Many(related)) => related.first().cloned(),
            None => None,
        }
    }

    /// Related entities stored under `name`, empty when unset.
    pub fn many(&self, name: &str) -> Collection {
        match self.0.borrow().associations.get(name) {
            Some(Association::Many(related)) => related.clone(),
            Some(Association::One(related)) => related.iter().cloned().collect(),
            None => Collection::default(),
        }
    }

    /// Assign a single related entity, or clear it with `None`.
    pub fn set_one(&self, name: impl Into<String>, related: Option<EntityRef>) {
        self.assign(name.into(), Association::One(related), true);
    }

    /// Assign the related collection.
    pub fn set_many<I>(&self, name: impl Into<String>, related: I)
    where
        I: IntoIterator<Item = EntityRef>,
    {
        self.assign(name.into(), Association::Many(related.into_iter().collect()), true);
    }

    pub fn unset(&self, name: &str) -> Option<Association> {
        let mut inner = self.0.borrow_mut();
        inner.touched.remove(name);
        inner.associations.remove(name)
    }

    pub(crate) fn assign(&self, name: String, association: Association, touched: bool) {
        let mut inner = self.0.borrow_mut();
        if touched {
            inner.touched.insert(name.clone());
        } else {
            inner.touched.remove(&name);
        }
        inner.associations.insert(name, association);
    }

    /// Create a new, unsaved entity of the type `relation` points to.
    pub fn build<I, K, V>(&self, relation: &str, fields: I) -> Result<EntityRef, LifelineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let target = self.schema().relation(relation)?.def().target()?;
        Ok(target.create(fields))
    }

    /// Persist this entity and cascade through its relations.
    pub fn broadcast(&self) -> Result<bool, LifelineError> {
        let schema = self.schema();
        schema.broadcast(self)
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared record, equal for every clone of this handle.
    pub(crate) fn handle_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Plain-data copy of this entity and everything embedded under it.
    ///
    /// An entity already being copied higher up the graph is omitted.
    pub fn to_row(&self) -> Row {
        let mut path = Vec::new();
        self.to_row_guarded(&mut path)
    }

    fn to_row_guarded(&self, path: &mut Vec<*const RefCell<Entity>>) -> Row {
        path.push(Rc::as_ptr(&self.0));
        let (fields, associations) = {
            let inner = self.0.borrow();
            (inner.fields.clone(), inner.associations.clone())
        };
        let mut row: Row = fields.into_iter().collect();
        for (name, association) in associations {
            let embedded = match association {
                Association::One(related) => Embedded::One(
                    related
                        .filter(|e| !path.contains(&Rc::as_ptr(&e.0)))
                        .map(|e| e.to_row_guarded(path)),
                ),
                Association::Many(related) => {
                    let mut rows = Vec::with_capacity(related.len());
                    for entity in &related {
                        if !path.contains(&Rc::as_ptr(&entity.0)) {
                            rows.push(entity.to_row_guarded(path));
                        }
                    }
                    Embedded::Many(rows)
                }
            };
            row.embed(name, embedded);
        }
        path.pop();
        row
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => f
                .debug_struct("EntityRef")
                .field("type", &inner.schema.name())
                .field("fields", &inner.fields)
                .field("associations", &inner.associations.keys().collect::<Vec<_>>())
                .field("exists", &inner.exists)
                .finish(),
            Err(_) => f.write_str("EntityRef(<borrowed>)"),
        }
    }
}

/// Ordered list of entity handles
#[derive(Clone, Default)]
pub struct Collection {
    items: Vec<EntityRef>,
}

impl Collection {
    pub fn new(items: Vec<EntityRef>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntityRef> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&EntityRef> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityRef> {
        self.items.iter()
    }

    pub fn push(&mut self, entity: EntityRef) {
        self.items.push(entity);
    }

    /// Membership by handle identity.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.items.iter().any(|e| e.ptr_eq(entity))
    }

    pub fn as_slice(&self) -> &[EntityRef] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<EntityRef> {
        self.items
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl std::ops::Index<usize> for Collection {
    type Output = EntityRef;

    fn index(&self, index: usize) -> &EntityRef {
        &self.items[index]
    }
}

impl FromIterator<EntityRef> for Collection {
    fn from_iter<I: IntoIterator<Item = EntityRef>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Collection {
    type Item = EntityRef;
    type IntoIter = std::vec::IntoIter<EntityRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a EntityRef;
    type IntoIter = std::slice::Iter<'a, EntityRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
