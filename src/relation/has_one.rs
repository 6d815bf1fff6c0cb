//! Owner has at most one related record; the foreign key lives on the related side.

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
pub struct HasOne {
    def: RelationDef,
}

impl HasOne {
    pub(crate) fn new<R: Resolver + ?Sized>(
        config: &RelationConfig,
        conventions: Rc<Conventions>,
        resolver: &R,
    ) -> Result<Self, LifelineError> {
        let def = RelationDef::new(config, conventions, |to| resolver.schema(to))?;
        Ok(Self { def })
    }
}

impl Relation for HasOne {
    fn def(&self) -> &RelationDef {
        &self.def
    }

    fn embed<N: Node>(&self, owners: &mut [N], options: &EmbedOptions) -> Result<(), LifelineError> {
        let (owner_key, foreign_key) = self.def.keys();
        let values = eager::collect_keys(owners, owner_key);
        if values.is_empty() {
            for owner in owners.iter_mut() {
                owner.attach_one(self.name(), None);
            }
            return Ok(());
        }

        let related = eager::fetch::<N>(&self.def, foreign_key, values, options)?;
        let groups = eager::bucket(related, foreign_key);
        for owner in owners.iter_mut() {
            let mine = eager::group_for(&groups, owner, owner_key).and_then(|group| group.first().cloned());
            owner.attach_one(self.name(), mine);
        }
        Ok(())
    }

    fn broadcast(&self, owner: &EntityRef) -> Result<bool, LifelineError> {
        if !owner.has(self.name()) {
            return Ok(true);
        }
        let attached: Vec<EntityRef> = owner.one(self.name()).into_iter().collect();
        cascade::reconcile(&self.def, owner, &attached, RemovalPolicy::Nullify, &[])
    }
}
