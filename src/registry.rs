//! Type registry: maps type identifiers to their schema and capabilities.
//!
//! Relationships name their endpoints by type identifier. The registry
//! resolves those names once, when it is built, so nothing is looked up by
//! name on the embed or broadcast paths.
//!
//! Building happens in three phases:
//! 1. one `Schema` per declared model
//! 2. direct relations (belongs-to, has-one, has-many)
//! 3. through relations, which need the direct relations they compose
//!
//! # Example
//!
//! ```
//! use lifeline::{MemorySource, ModelConfig, Registry, RelationConfig};
//! use std::rc::Rc;
//!
//! let store = Rc::new(MemorySource::new());
//! let registry = Registry::builder()
//!     .model(
//!         ModelConfig::new("Gallery").relation(RelationConfig::has_many().to("Image").name("images")),
//!         store.clone(),
//!     )
//!     .model(ModelConfig::new("Image"), store)
//!     .build()
//!     .expect("valid registry");
//!
//! let gallery = registry.schema("Gallery").expect("registered");
//! assert!(gallery.has_relation("images"));
//! ```

use crate::config::{ModelConfig, SchemaConfig};
use crate::conventions::Conventions;
use crate::error::LifelineError;
use crate::relation::{RelationConfig, RelationType, Relationship, Resolver};
use crate::schema::Schema;
use crate::source::{Finder, Persist};
use std::collections::BTreeMap;
use std::rc::Rc;

pub struct Registry {
    schemas: BTreeMap<String, Rc<Schema>>,
    conventions: Rc<Conventions>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build every model declared in `config`, all backed by `source`.
    pub fn from_config<S>(config: SchemaConfig, source: Rc<S>) -> Result<Self, LifelineError>
    where
        S: Finder + Persist + 'static,
    {
        Self::builder().with_config(config, source).build()
    }

    /// Load `config/schema.toml` (or `LIFELINE__*` env vars) and build it.
    pub fn load<S>(source: Rc<S>) -> Result<Self, LifelineError>
    where
        S: Finder + Persist + 'static,
    {
        Self::from_config(SchemaConfig::load()?, source)
    }

    pub fn schema(&self, name: &str) -> Result<Rc<Schema>, LifelineError> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| LifelineError::configuration(format!("Unknown type `{name}`.")))
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Rc<Schema>> {
        self.schemas.values()
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Build a standalone relationship against the registered types.
    ///
    /// The result is not bound to any schema; through relations resolve
    /// their `through`/`using` parts from the relations already bound.
    pub fn relationship(&self, config: RelationConfig) -> Result<Relationship, LifelineError> {
        Relationship::new(&config, Rc::clone(&self.conventions), self)
    }
}

impl Resolver for Registry {
    fn schema(&self, name: &str) -> Option<Rc<Schema>> {
        self.schemas.get(name).cloned()
    }

    fn relation(&self, owner: &str, name: &str) -> Option<&Relationship> {
        self.schemas
            .get(owner)
            .and_then(|schema| schema.relation(name).ok())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("schemas", &self.schemas.values().collect::<Vec<_>>())
            .field("conventions", &self.conventions)
            .finish()
    }
}

struct Declared {
    model: ModelConfig,
    finder: Rc<dyn Finder>,
    persist: Rc<dyn Persist>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    conventions: Option<Conventions>,
    models: Vec<Declared>,
    bindings: Vec<(String, RelationConfig)>,
}

impl RegistryBuilder {
    pub fn conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = Some(conventions);
        self
    }

    /// Use the conventions and models of `config`, all backed by `source`.
    pub fn with_config<S>(mut self, config: SchemaConfig, source: Rc<S>) -> Self
    where
        S: Finder + Persist + 'static,
    {
        self.conventions = Some(Conventions::from_config(&config.conventions));
        for model in config.models {
            self = self.model(model, Rc::clone(&source));
        }
        self
    }

    /// Declare a model backed by `source`.
    pub fn model<S>(mut self, model: ModelConfig, source: Rc<S>) -> Self
    where
        S: Finder + Persist + 'static,
    {
        let finder: Rc<dyn Finder> = source.clone();
        let persist: Rc<dyn Persist> = source;
        self.models.push(Declared {
            model,
            finder,
            persist,
        });
        self
    }

    /// Bind an extra relation to an already declared model.
    pub fn bind(mut self, owner: impl Into<String>, relation: RelationConfig) -> Self {
        self.bindings.push((owner.into(), relation));
        self
    }

    pub fn build(self) -> Result<Registry, LifelineError> {
        let conventions = Rc::new(self.conventions.unwrap_or_default());

        let mut schemas: BTreeMap<String, Rc<Schema>> = BTreeMap::new();
        let mut declared: Vec<(String, RelationConfig)> = Vec::new();
        for Declared {
            model,
            finder,
            persist,
        } in self.models
        {
            if schemas.contains_key(&model.name) {
                return Err(LifelineError::configuration(format!(
                    "Type `{}` is declared twice.",
                    model.name
                )));
            }
            let source = model
                .source
                .clone()
                .unwrap_or_else(|| conventions.source_name(&model.name));
            let primary_key = model
                .primary_key
                .clone()
                .unwrap_or_else(|| conventions.primary_key_name().to_string());
            let schema = Schema::new(model.name.clone(), source, primary_key, finder, persist);
            schemas.insert(model.name.clone(), Rc::new(schema));
            declared.extend(
                model
                    .relations
                    .into_iter()
                    .map(|relation| (model.name.clone(), relation)),
            );
        }
        declared.extend(self.bindings);

        let mut staged = Staged {
            schemas: &schemas,
            relations: schemas
                .keys()
                .map(|name| (name.clone(), BTreeMap::new()))
                .collect(),
        };

        let (through, direct): (Vec<_>, Vec<_>) = declared
            .into_iter()
            .map(|(owner, mut relation)| {
                relation.from.get_or_insert_with(|| owner.clone());
                (owner, relation)
            })
            .partition(|(_, relation)| relation.kind == RelationType::HasManyThrough);

        for (owner, relation) in direct {
            let relationship = Relationship::new(&relation, Rc::clone(&conventions), &staged)?;
            staged.insert(&owner, relationship)?;
        }
        for (owner, relation) in through {
            if let Some(pivot) = relation.through.as_deref() {
                staged.mark_junction(&owner, pivot);
            }
            let relationship = Relationship::new(&relation, Rc::clone(&conventions), &staged)?;
            staged.insert(&owner, relationship)?;
        }

        let Staged { relations, .. } = staged;
        for (name, relations) in relations {
            if let Some(schema) = schemas.get(&name) {
                schema.install(relations)?;
            }
        }

        log::debug!("registry built with {} type(s)", schemas.len());
        Ok(Registry {
            schemas,
            conventions,
        })
    }
}

/// Relations built so far, before they are installed on their schemas
struct Staged<'a> {
    schemas: &'a BTreeMap<String, Rc<Schema>>,
    relations: BTreeMap<String, BTreeMap<String, Relationship>>,
}

impl Staged<'_> {
    fn insert(&mut self, owner: &str, relationship: Relationship) -> Result<(), LifelineError> {
        use crate::relation::Relation;

        let relations = self.relations.get_mut(owner).ok_or_else(|| {
            LifelineError::configuration(format!("Unknown type `{owner}` in relation binding."))
        })?;
        let name = relationship.name().to_string();
        if relations.contains_key(&name) {
            return Err(LifelineError::configuration(format!(
                "Relation `{name}` is declared twice on `{owner}`."
            )));
        }
        relations.insert(name, relationship);
        Ok(())
    }

    fn mark_junction(&mut self, owner: &str, pivot: &str) {
        if let Some(Relationship::HasMany(has_many)) = self
            .relations
            .get_mut(owner)
            .and_then(|relations| relations.get_mut(pivot))
        {
            has_many.mark_junction();
        }
    }
}

impl Resolver for Staged<'_> {
    fn schema(&self, name: &str) -> Option<Rc<Schema>> {
        self.schemas.get(name).cloned()
    }

    fn relation(&self, owner: &str, name: &str) -> Option<&Relationship> {
        self.relations
            .get(owner)
            .and_then(|relations| relations.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use crate::relation::Relation;

    fn store() -> Rc<MemorySource> {
        Rc::new(MemorySource::new())
    }

    #[test]
    fn test_schema_defaults_from_conventions() {
        let registry = Registry::builder()
            .model(ModelConfig::new("ImageTag"), store())
            .build()
            .expect("registry");
        let schema = registry.schema("ImageTag").expect("schema");
        assert_eq!(schema.source(), "image_tag");
        assert_eq!(schema.primary_key(), "id");
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let err = Registry::builder()
            .model(ModelConfig::new("Image"), store())
            .model(ModelConfig::new("Image"), store())
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_bind_to_unknown_owner_rejected() {
        let err = Registry::builder()
            .model(ModelConfig::new("Image"), store())
            .bind("Gallery", RelationConfig::has_many().to("Image"))
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_pivot_marked_as_junction() {
        let source = store();
        let registry = Registry::builder()
            .model(
                ModelConfig::new("Image")
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
                ModelConfig::new("ImageTag").relation(RelationConfig::belongs_to().to("Tag")),
                source.clone(),
            )
            .model(ModelConfig::new("Tag"), source)
            .build()
            .expect("registry");

        let image = registry.schema("Image").expect("schema");
        let pivot = image
            .relation("images_tags")
            .expect("pivot")
            .as_has_many()
            .expect("has many");
        assert!(pivot.is_junction());

        let tags = image
            .relation("tags")
            .expect("tags")
            .as_has_many_through()
            .expect("through");
        assert!(tags.pivot().is_junction());
        assert_eq!(tags.far().keys(), ("tag_id", "id"));
    }
}
