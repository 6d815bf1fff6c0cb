//! Shared fixtures for the integration tests.
//!
//! Model graph:
//! - Gallery has_many Images, has_one Cover
//! - Image belongs_to Gallery, has_many ImageTags, has_many_through Tags
//! - ImageTag belongs_to Image and Tag
//! - Tag has_many ImageTags, has_many_through Images

#![allow(dead_code)]

use lifeline::{
    Conditions, EntityRef, FetchOptions, Fetched, Finder, LifelineError, ModelConfig, Persist,
    Registry, RelationConfig, Schema, Value,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

// ============================================================================
// Registry
// ============================================================================

pub fn registry<S>(source: Rc<S>) -> Registry
where
    S: Finder + Persist + 'static,
{
    Registry::builder()
        .model(
            ModelConfig::new("Gallery")
                .relation(RelationConfig::has_many().to("Image").name("images"))
                .relation(RelationConfig::has_one().to("Cover")),
            source.clone(),
        )
        .model(
            ModelConfig::new("Image")
                .relation(RelationConfig::belongs_to().to("Gallery"))
                .relation(RelationConfig::has_many().to("ImageTag").name("images_tags"))
                .relation(
                    RelationConfig::has_many_through()
                        .to("Tag")
                        .name("tags")
                        .through("images_tags")
                        .using("tag"),
                ),
            source.clone(),
        )
        .model(
            ModelConfig::new("ImageTag")
                .relation(RelationConfig::belongs_to().to("Image"))
                .relation(RelationConfig::belongs_to().to("Tag")),
            source.clone(),
        )
        .model(
            ModelConfig::new("Tag")
                .relation(RelationConfig::has_many().to("ImageTag").name("images_tags"))
                .relation(
                    RelationConfig::has_many_through()
                        .to("Image")
                        .name("images")
                        .through("images_tags")
                        .using("image"),
                ),
            source.clone(),
        )
        .model(ModelConfig::new("Cover"), source)
        .build()
        .expect("fixture registry")
}

pub fn id(value: i64) -> Value {
    Value::BigInt(Some(value))
}

pub fn text(value: &str) -> Value {
    Value::from(value)
}

pub fn null() -> Value {
    Value::BigInt(None)
}

// ============================================================================
// Recording stub
// ============================================================================

/// Finder/Persist stub returning preset handles and recording every call
#[derive(Default)]
pub struct StubSource {
    responses: RefCell<VecDeque<Vec<EntityRef>>>,
    pub finds: RefCell<Vec<(String, Conditions, FetchOptions)>>,
    pub saves: RefCell<Vec<EntityRef>>,
    pub truncates: RefCell<Vec<(String, Conditions)>>,
    failing: RefCell<Vec<(String, Value)>>,
    next_id: RefCell<i64>,
}

impl StubSource {
    pub fn new(first_id: i64) -> Self {
        Self {
            next_id: RefCell::new(first_id),
            ..Self::default()
        }
    }

    /// Queue the handles returned by the next `find_all`.
    pub fn respond(&self, entities: Vec<EntityRef>) {
        self.responses.borrow_mut().push_back(entities);
    }

    /// Make saves of records whose `field` equals `value` fail.
    pub fn fail_on(&self, field: &str, value: impl Into<Value>) {
        self.failing.borrow_mut().push((field.to_string(), value.into()));
    }

    pub fn saved(&self, entity: &EntityRef) -> bool {
        self.saves.borrow().iter().any(|e| e.ptr_eq(entity))
    }
}

impl Finder for StubSource {
    fn find_all(
        &self,
        schema: &Rc<Schema>,
        conditions: &Conditions,
        options: &FetchOptions,
    ) -> Result<Fetched, LifelineError> {
        self.finds
            .borrow_mut()
            .push((schema.name().to_string(), conditions.clone(), options.clone()));
        let entities = self.responses.borrow_mut().pop_front().unwrap_or_default();
        Ok(Fetched::Entities(entities))
    }
}

impl Persist for StubSource {
    fn save(&self, schema: &Schema, entity: &EntityRef) -> Result<bool, LifelineError> {
        self.saves.borrow_mut().push(entity.clone());
        let fails = self
            .failing
            .borrow()
            .iter()
            .any(|(field, value)| entity.get(field).as_ref() == Some(value));
        if fails {
            return Ok(false);
        }
        if entity.primary_key().is_none() {
            let mut next = self.next_id.borrow_mut();
            entity.set(schema.primary_key(), Value::BigInt(Some(*next)));
            *next += 1;
        }
        entity.mark_persisted();
        Ok(true)
    }

    fn truncate(&self, schema: &Schema, conditions: &Conditions) -> Result<bool, LifelineError> {
        self.truncates
            .borrow_mut()
            .push((schema.name().to_string(), conditions.clone()));
        Ok(true)
    }
}
