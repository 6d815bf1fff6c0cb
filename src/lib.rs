//! # Lifeline
//!
//! Relationship resolution and persistence cascades for record graphs.
//!
//! Types are declared in a [`Registry`] together with their relationships
//! (belongs-to, has-one, has-many and has-many-through). Owners can then be
//! eager-loaded with one query per relation hop ([`Schema::embed`]) and saved
//! with their associations reconciled against storage ([`EntityRef::broadcast`]).
//!
//! Storage is reached only through the [`Finder`] and [`Persist`] traits;
//! [`MemorySource`] implements both in memory.

pub mod condition;
pub mod config;
pub mod conventions;
pub mod entity;
pub mod error;
pub mod memory;
pub mod registry;
pub mod relation;
pub mod row;
pub mod schema;
pub mod source;
pub mod value;

pub use condition::{Conditions, FetchOptions, Fields, ReturnMode};
pub use config::{ConventionsConfig, ModelConfig, SchemaConfig};
pub use conventions::Conventions;
pub use entity::{Association, Collection, EntityRef};
pub use error::LifelineError;
pub use memory::MemorySource;
pub use registry::{Registry, RegistryBuilder};
pub use relation::{EmbedOptions, Node, Relation, RelationConfig, RelationType, Relationship};
pub use row::{Embedded, Row};
pub use schema::Schema;
pub use source::{Fetched, Finder, Persist};
pub use value::Value;
