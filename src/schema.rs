//! Per-type schema: capabilities, primary key and relation descriptors.
//!
//! A `Schema` is built once by the [`Registry`](crate::Registry) and shared as
//! `Rc<Schema>`. Its relation table is installed after every schema exists,
//! so relations between mutually-referencing types can point at each other.

use crate::condition::{Conditions, FetchOptions};
use crate::entity::EntityRef;
use crate::error::LifelineError;
use crate::relation::{
    first_occurrences, EmbedOptions, Node, Relation, RelationType, Relationship,
};
use crate::source::{Fetched, Finder, Persist};
use crate::value::Value;
use once_cell::unsync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub struct Schema {
    name: String,
    source: String,
    primary_key: String,
    finder: Rc<dyn Finder>,
    persist: Rc<dyn Persist>,
    relations: OnceCell<BTreeMap<String, Relationship>>,
}

impl Schema {
    pub(crate) fn new(
        name: String,
        source: String,
        primary_key: String,
        finder: Rc<dyn Finder>,
        persist: Rc<dyn Persist>,
    ) -> Self {
        Self {
            name,
            source,
            primary_key,
            finder,
            persist,
            relations: OnceCell::new(),
        }
    }

    pub(crate) fn install(&self, relations: BTreeMap<String, Relationship>) -> Result<(), LifelineError> {
        self.relations.set(relations).map_err(|_| {
            LifelineError::configuration(format!("Relations of `{}` are already installed.", self.name))
        })
    }

    /// Type identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table/collection name
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Relation descriptor bound under `name`.
    pub fn relation(&self, name: &str) -> Result<&Relationship, LifelineError> {
        self.relations
            .get()
            .and_then(|relations| relations.get(name))
            .ok_or_else(|| {
                LifelineError::configuration(format!(
                    "Unexisting relation `{}` on `{}`.",
                    name, self.name
                ))
            })
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations
            .get()
            .is_some_and(|relations| relations.contains_key(name))
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relationship> {
        self.relations.get().into_iter().flat_map(|relations| relations.values())
    }

    /// New, unsaved entity of this type.
    pub fn create<I, K, V>(self: &Rc<Self>, fields: I) -> EntityRef
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        EntityRef::new(
            Rc::clone(self),
            fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            false,
        )
    }

    /// Entity hydrated from storage: exists, with a clean persisted snapshot.
    pub fn load<I, K, V>(self: &Rc<Self>, fields: I) -> EntityRef
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        EntityRef::new(
            Rc::clone(self),
            fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            true,
        )
    }

    /// Run the type's finder.
    pub fn find_all(
        self: &Rc<Self>,
        conditions: &Conditions,
        options: &FetchOptions,
    ) -> Result<Fetched, LifelineError> {
        log::trace!("find_all on `{}`: {:?} {:?}", self.name, conditions, options);
        self.finder.find_all(self, conditions, options)
    }

    /// Hard-delete the records matching `conditions`.
    pub fn truncate(&self, conditions: &Conditions) -> Result<bool, LifelineError> {
        log::debug!("truncating `{}` where {:?}", self.source, conditions);
        self.persist.truncate(self, conditions)
    }

    /// Persist a single record without cascading.
    pub fn save(&self, entity: &EntityRef) -> Result<bool, LifelineError> {
        self.persist.save(self, entity)
    }

    /// Eager-load the relations named in `paths` onto `owners`.
    ///
    /// A dotted path (`"tags.images"`) embeds `tags` on the owners, then
    /// `images` on every tag gathered across all owners, so each hop costs a
    /// single query regardless of how many owners there are.
    pub fn embed<N: Node>(&self, owners: &mut [N], paths: &[&str]) -> Result<(), LifelineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("lifeline.embed", schema = %self.name, owners = owners.len())
            .entered();

        let mut tree: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for path in paths.iter().copied() {
            match path.split_once('.') {
                Some((head, rest)) => tree.entry(head).or_default().push(rest),
                None => {
                    tree.entry(path).or_default();
                }
            }
        }

        for (name, nested) in tree {
            let relation = self.relation(name)?;
            relation.embed(owners, &EmbedOptions::default())?;
            if nested.is_empty() {
                continue;
            }

            let single = matches!(
                relation.relation_type(),
                RelationType::BelongsTo | RelationType::HasOne
            );
            let firsts = first_occurrences(owners);
            let mut counts = Vec::with_capacity(owners.len());
            let mut children = Vec::new();
            for (owner, first) in owners.iter_mut().zip(&firsts) {
                if !first {
                    counts.push(0);
                    continue;
                }
                let taken = owner.take_related(name);
                counts.push(taken.len());
                children.extend(taken);
            }

            let target = relation.def().target()?;
            target.embed(&mut children, &nested)?;

            let mut children = children.into_iter();
            for ((owner, count), first) in owners.iter_mut().zip(counts).zip(firsts) {
                if !first {
                    continue;
                }
                let mine: Vec<N> = children.by_ref().take(count).collect();
                if single {
                    owner.attach_one(name, mine.into_iter().next());
                } else {
                    owner.attach_many(name, mine);
                }
            }
        }
        Ok(())
    }

    /// Save `entity` and cascade through its relations.
    ///
    /// BelongsTo relations run first so new parents get keys before the
    /// record is written. A rejected write of the record itself ends its
    /// cascade; failures further down are aggregated and do not stop
    /// sibling relations.
    pub fn broadcast(&self, entity: &EntityRef) -> Result<bool, LifelineError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("lifeline.broadcast", schema = %self.name).entered();
        log::debug!("broadcasting `{}` (exists: {})", self.name, entity.exists());

        let mut result = true;
        for relation in self.relations() {
            if let Relationship::BelongsTo(_) = relation {
                let ok = relation.broadcast(entity)?;
                result &= ok;
            }
        }

        if !self.save(entity)? {
            log::warn!("save of `{}` rejected, skipping its cascade", self.name);
            return Ok(false);
        }

        // A through relation whose far side is assigned reconciles its pivot
        // collection itself; otherwise the pivot relation does.
        let delegated: Vec<&str> = self
            .relations()
            .filter_map(|relation| match relation {
                Relationship::HasManyThrough(through) if entity.has(through.name()) => {
                    Some(through.pivot().name())
                }
                _ => None,
            })
            .collect();

        for relation in self.relations() {
            let skip = match relation {
                Relationship::BelongsTo(_) => true,
                Relationship::HasManyThrough(through) => !entity.has(through.name()),
                Relationship::HasMany(has_many) => delegated.contains(&has_many.name()),
                Relationship::HasOne(_) => false,
            };
            if !skip {
                let ok = relation.broadcast(entity)?;
                result &= ok;
            }
        }
        Ok(result)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("primary_key", &self.primary_key)
            .field(
                "relations",
                &self
                    .relations
                    .get()
                    .map(|relations| relations.keys().collect::<Vec<_>>()),
            )
            .finish()
    }
}
