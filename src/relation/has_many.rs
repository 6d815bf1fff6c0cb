//! Owner has many related records; the foreign key lives on the related side.

use super::cascade::{self, RemovalPolicy};
use super::def::{RelationConfig, RelationDef};
use super::eager;
use super::node::Node;
use super::{EmbedOptions, Relation, Resolver};
use crate::conventions::Conventions;
use crate::entity::EntityRef;
use crate::error::LifelineError;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct HasMany {
    def: RelationDef,
    junction: bool,
}

impl HasMany {
    pub(crate) fn new<R: Resolver + ?Sized>(
        config: &RelationConfig,
        conventions: Rc<Conventions>,
        resolver: &R,
    ) -> Result<Self, LifelineError> {
        let def = RelationDef::new(config, conventions, |to| resolver.schema(to))?;
        Ok(Self {
            def,
            junction: config.junction,
        })
    }

    /// Whether related records are links to be deleted on removal.
    pub fn is_junction(&self) -> bool {
        self.junction
    }

    pub(crate) fn mark_junction(&mut self) {
        self.junction = true;
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        if self.junction {
            RemovalPolicy::DeletePivot
        } else {
            RemovalPolicy::Nullify
        }
    }

    pub(crate) fn reconcile(
        &self,
        owner: &EntityRef,
        policy: RemovalPolicy,
        detached: &[EntityRef],
    ) -> Result<bool, LifelineError> {
        if !owner.has(self.name()) {
            return Ok(true);
        }
        let attached = owner.many(self.name());
        cascade::reconcile(&self.def, owner, attached.as_slice(), policy, detached)
    }
}

impl Relation for HasMany {
    fn def(&self) -> &RelationDef {
        &self.def
    }

    fn embed<N: Node>(&self, owners: &mut [N], options: &EmbedOptions) -> Result<(), LifelineError> {
        let (owner_key, foreign_key) = self.def.keys();
        let values = eager::collect_keys(owners, owner_key);
        if values.is_empty() {
            for owner in owners.iter_mut() {
                owner.attach_many(self.name(), Vec::new());
            }
            return Ok(());
        }

        let related = eager::fetch::<N>(&self.def, foreign_key, values, options)?;
        let groups = eager::bucket(related, foreign_key);
        for owner in owners.iter_mut() {
            let mine = eager::group_for(&groups, owner, owner_key)
                .cloned()
                .unwrap_or_default();
            owner.attach_many(self.name(), mine);
        }
        Ok(())
    }

    fn broadcast(&self, owner: &EntityRef) -> Result<bool, LifelineError> {
        self.reconcile(owner, self.removal_policy(), &[])
    }
}
