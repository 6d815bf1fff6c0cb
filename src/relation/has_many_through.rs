//! Many-to-many through a pivot type.
//!
//! The relation is composed of two existing ones: `through`, a has-many from
//! the owner to the pivot type, and `using`, a belongs-to from the pivot type
//! to the far type. Embedding runs both (two queries total); broadcasting
//! reconciles the pivot collection and hard-deletes removed links.

use super::cascade::RemovalPolicy;
use super::def::{required, RelationConfig, RelationDef};
use super::eager;
use super::node::Node;
use super::{BelongsTo, EmbedOptions, HasMany, Relation, Relationship, Resolver};
use crate::conventions::Conventions;
use crate::entity::{Association, Collection, EntityRef};
use crate::error::LifelineError;
use crate::value::{key_of, Value};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct HasManyThrough {
    def: RelationDef,
    pivot: HasMany,
    far: BelongsTo,
}

impl HasManyThrough {
    pub(crate) fn new<R: Resolver + ?Sized>(
        config: &RelationConfig,
        conventions: Rc<Conventions>,
        resolver: &R,
    ) -> Result<Self, LifelineError> {
        let from = required(&config.from, "from")?;
        let to = required(&config.to, "to")?;
        let through = required(&config.through, "through")?;
        let using = required(&config.using, "using")?;

        let pivot = match resolver.relation(from, through) {
            Some(Relationship::HasMany(pivot)) => pivot.clone(),
            Some(other) => {
                return Err(LifelineError::configuration(format!(
                    "Relation `{through}` on `{from}` is a {:?}, `through` needs a has-many.",
                    other.relation_type()
                )))
            }
            None => return Err(unexisting(through, from)),
        };
        let pivot_type = pivot.def().to();
        let far = match resolver.relation(pivot_type, using) {
            Some(Relationship::BelongsTo(far)) => far.clone(),
            Some(other) => {
                return Err(LifelineError::configuration(format!(
                    "Relation `{using}` on `{pivot_type}` is a {:?}, `using` needs a belongs-to.",
                    other.relation_type()
                )))
            }
            None => return Err(unexisting(using, pivot_type)),
        };
        if far.def().to() != to {
            return Err(LifelineError::configuration(format!(
                "Relation `{using}` on `{pivot_type}` leads to `{}`, not `{to}`.",
                far.def().to()
            )));
        }

        let def = RelationDef::new(config, conventions, |to| resolver.schema(to))?;
        Ok(Self { def, pivot, far })
    }

    /// Has-many relation from the owner to the pivot type
    pub fn pivot(&self) -> &HasMany {
        &self.pivot
    }

    /// Belongs-to relation from the pivot type to the far type
    pub fn far(&self) -> &BelongsTo {
        &self.far
    }

    /// Rebuild the owner's pivot collection from its assigned far records.
    ///
    /// Pivots already linking to a far record are reused, each at most once;
    /// new pivots are created for the others. Returns the previous pivots
    /// that were not reused.
    fn sync_pivots(&self, owner: &EntityRef) -> Result<Vec<EntityRef>, LifelineError> {
        let far_records = owner.many(self.name());
        let existing = owner.many(self.pivot.name());
        let (link_key, far_key) = self.far.def().keys();
        let pivot_schema = self.pivot.def().target()?;

        let mut pivots = Collection::default();
        for far in &far_records {
            let far_value = far.get(far_key).as_ref().and_then(key_of);
            let reused = existing.iter().find(|pivot| {
                if pivots.contains(pivot) {
                    return false;
                }
                if pivot.one(self.far.name()).is_some_and(|linked| linked.ptr_eq(far)) {
                    return true;
                }
                far_value.is_some()
                    && pivot.get(link_key).as_ref().and_then(key_of) == far_value
            });
            let pivot = match reused {
                Some(pivot) => pivot.clone(),
                None => pivot_schema.create(Vec::<(String, Value)>::new()),
            };
            pivot.set_one(self.far.name(), Some(far.clone()));
            pivots.push(pivot);
        }
        let dropped: Vec<EntityRef> = existing
            .into_iter()
            .filter(|pivot| !pivots.contains(pivot))
            .collect();

        log::trace!(
            "`{}.{}` rebuilt {} pivot(s) from {} far record(s), dropping {}",
            self.def.from(),
            self.name(),
            pivots.len(),
            far_records.len(),
            dropped.len()
        );
        owner.assign(self.pivot.name().to_string(), Association::Many(pivots), true);
        owner.assign(self.name().to_string(), Association::Many(far_records), false);
        Ok(dropped)
    }
}

fn unexisting(name: &str, type_name: &str) -> LifelineError {
    LifelineError::configuration(format!("Unexisting relation `{name}` on `{type_name}`."))
}

impl Relation for HasManyThrough {
    fn def(&self) -> &RelationDef {
        &self.def
    }

    fn embed<N: Node>(&self, owners: &mut [N], options: &EmbedOptions) -> Result<(), LifelineError> {
        let pivot_name = self.pivot.name();
        self.pivot.embed(owners, &EmbedOptions::default())?;

        let firsts = eager::first_occurrences(owners);
        let mut counts = Vec::with_capacity(owners.len());
        let mut pivots = Vec::new();
        for (owner, first) in owners.iter_mut().zip(&firsts) {
            if !first {
                counts.push(0);
                continue;
            }
            let taken = owner.take_related(pivot_name);
            counts.push(taken.len());
            pivots.extend(taken);
        }

        self.far.embed(&mut pivots, options)?;

        let far_name = self.far.name();
        let mut pivots = pivots.into_iter();
        for ((owner, count), first) in owners.iter_mut().zip(counts).zip(firsts) {
            if !first {
                continue;
            }
            let mine: Vec<N> = pivots.by_ref().take(count).collect();
            let far: Vec<N> = mine.iter().filter_map(|pivot| pivot.related_one(far_name)).collect();
            owner.attach_many(pivot_name, mine);
            owner.attach_many(self.name(), far);
        }
        Ok(())
    }

    fn broadcast(&self, owner: &EntityRef) -> Result<bool, LifelineError> {
        let dropped = if owner.modified(self.name()) {
            self.sync_pivots(owner)?
        } else {
            Vec::new()
        };
        self.pivot
            .reconcile(owner, RemovalPolicy::DeletePivot, &dropped)
    }
}
