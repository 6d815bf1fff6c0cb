//! Relation module for entity relationships.
//!
//! This module provides the four relationship kinds and their two
//! algorithms:
//! - belongs_to: Many-to-one, foreign key on the owner
//! - has_one: One-to-one, foreign key on the related record
//! - has_many: One-to-many, foreign key on the related records
//! - has_many_through: Many-to-many via a pivot type
//!
//! # Architecture
//!
//! - **Def**: The immutable descriptor every kind shares (`RelationDef`)
//! - **Eager**: Batched loading, one finder call per relation hop
//! - **Cascade**: The diff-and-reconcile step run on broadcast
//! - **Node**: Owners as entities or as plain rows

pub mod def;
#[doc(inline)]
pub use def::{Link, RelationConfig, RelationDef, RelationType};

mod belongs_to;
mod cascade;
mod eager;
mod has_many;
mod has_many_through;
mod has_one;
mod node;

pub use belongs_to::BelongsTo;
pub use cascade::RemovalPolicy;
pub use has_many::HasMany;
pub use has_many_through::HasManyThrough;
pub use has_one::HasOne;
pub use node::Node;

pub(crate) use eager::first_occurrences;

use crate::condition::{Conditions, Fields};
use crate::conventions::Conventions;
use crate::entity::EntityRef;
use crate::error::LifelineError;
use crate::schema::Schema;
use std::rc::Rc;

/// Common interface of the relationship kinds
pub trait Relation {
    fn def(&self) -> &RelationDef;

    /// Field under which related data is stored on the owner
    fn name(&self) -> &str {
        self.def().name()
    }

    /// `(owner field, related field)`
    fn keys(&self) -> (&str, &str) {
        self.def().keys()
    }

    /// Eager-load related data onto every owner with batched queries.
    fn embed<N: Node>(&self, owners: &mut [N], options: &EmbedOptions) -> Result<(), LifelineError>;

    /// Persist the owner's association and reconcile removed records.
    ///
    /// `Ok(false)` reports that at least one cascaded write was rejected.
    fn broadcast(&self, owner: &EntityRef) -> Result<bool, LifelineError>;
}

/// Extra filtering applied to an embed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedOptions {
    /// ANDed with the key clause
    pub conditions: Conditions,
    /// Overrides the relation's selected fields when restricted
    pub fields: Fields,
}

impl EmbedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }
}

/// Looks up schemas and already-built relations while descriptors are built
pub(crate) trait Resolver {
    fn schema(&self, name: &str) -> Option<Rc<Schema>>;

    fn relation(&self, owner: &str, name: &str) -> Option<&Relationship>;
}

/// A relationship of any kind
#[derive(Debug, Clone)]
pub enum Relationship {
    BelongsTo(BelongsTo),
    HasOne(HasOne),
    HasMany(HasMany),
    HasManyThrough(HasManyThrough),
}

impl Relationship {
    pub(crate) fn new<R: Resolver + ?Sized>(
        config: &RelationConfig,
        conventions: Rc<Conventions>,
        resolver: &R,
    ) -> Result<Self, LifelineError> {
        let relationship = match config.kind {
            RelationType::BelongsTo => {
                Relationship::BelongsTo(BelongsTo::new(config, conventions, resolver)?)
            }
            RelationType::HasOne => Relationship::HasOne(HasOne::new(config, conventions, resolver)?),
            RelationType::HasMany => {
                Relationship::HasMany(HasMany::new(config, conventions, resolver)?)
            }
            RelationType::HasManyThrough => {
                Relationship::HasManyThrough(HasManyThrough::new(config, conventions, resolver)?)
            }
        };
        log::debug!(
            "built {:?} `{}.{}` -> `{}`",
            relationship.relation_type(),
            relationship.def().from(),
            relationship.name(),
            relationship.def().to()
        );
        Ok(relationship)
    }

    pub fn relation_type(&self) -> RelationType {
        self.def().rel_type()
    }

    pub fn as_has_many(&self) -> Option<&HasMany> {
        match self {
            Relationship::HasMany(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn as_has_many_through(&self) -> Option<&HasManyThrough> {
        match self {
            Relationship::HasManyThrough(relation) => Some(relation),
            _ => None,
        }
    }
}

impl Relation for Relationship {
    fn def(&self) -> &RelationDef {
        match self {
            Relationship::BelongsTo(relation) => relation.def(),
            Relationship::HasOne(relation) => relation.def(),
            Relationship::HasMany(relation) => relation.def(),
            Relationship::HasManyThrough(relation) => relation.def(),
        }
    }

    fn embed<N: Node>(&self, owners: &mut [N], options: &EmbedOptions) -> Result<(), LifelineError> {
        match self {
            Relationship::BelongsTo(relation) => relation.embed(owners, options),
            Relationship::HasOne(relation) => relation.embed(owners, options),
            Relationship::HasMany(relation) => relation.embed(owners, options),
            Relationship::HasManyThrough(relation) => relation.embed(owners, options),
        }
    }

    fn broadcast(&self, owner: &EntityRef) -> Result<bool, LifelineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "lifeline.relation.broadcast",
            relation = %self.name(),
            kind = ?self.relation_type()
        )
        .entered();

        match self {
            Relationship::BelongsTo(relation) => relation.broadcast(owner),
            Relationship::HasOne(relation) => relation.broadcast(owner),
            Relationship::HasMany(relation) => relation.broadcast(owner),
            Relationship::HasManyThrough(relation) => relation.broadcast(owner),
        }
    }
}
