//! Owner references one related record; the foreign key lives on the owner.

use super::def::{RelationConfig, RelationDef};
use super::eager;
use super::node::Node;
use super::{EmbedOptions, Relation, Resolver};
use crate::conventions::Conventions;
use crate::entity::EntityRef;
use crate::error::LifelineError;
use crate::value::{is_null, null_like};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct BelongsTo {
    def: RelationDef,
}

impl BelongsTo {
    pub(crate) fn new<R: Resolver + ?Sized>(
        config: &RelationConfig,
        conventions: Rc<Conventions>,
        resolver: &R,
    ) -> Result<Self, LifelineError> {
        let def = RelationDef::new(config, conventions, |to| resolver.schema(to))?;
        Ok(Self { def })
    }
}

impl Relation for BelongsTo {
    fn def(&self) -> &RelationDef {
        &self.def
    }

    fn embed<N: Node>(&self, owners: &mut [N], options: &EmbedOptions) -> Result<(), LifelineError> {
        let (foreign_key, primary_key) = self.def.keys();
        let values = eager::collect_keys(owners, foreign_key);
        if values.is_empty() {
            for owner in owners.iter_mut() {
                owner.attach_one(self.name(), None);
            }
            return Ok(());
        }

        let related = eager::fetch::<N>(&self.def, primary_key, values, options)?;
        let groups = eager::bucket(related, primary_key);
        for owner in owners.iter_mut() {
            let parent = eager::group_for(&groups, owner, foreign_key).and_then(|group| group.first().cloned());
            owner.attach_one(self.name(), parent);
        }
        Ok(())
    }

    /// Copy the related key onto the owner.
    ///
    /// A new related record is broadcast first so it has a key to copy;
    /// an existing one is left alone.
    fn broadcast(&self, owner: &EntityRef) -> Result<bool, LifelineError> {
        if !owner.has(self.name()) {
            return Ok(true);
        }
        let (foreign_key, primary_key) = self.def.keys();
        let Some(related) = owner.one(self.name()) else {
            owner.set(foreign_key, null_like(owner.get(foreign_key).as_ref()));
            return Ok(true);
        };

        let mut result = true;
        if !related.exists() {
            let ok = related.broadcast()?;
            result &= ok;
        }
        match related.get(primary_key).filter(|v| !is_null(v)) {
            Some(value) => owner.set(foreign_key, value),
            None => log::warn!(
                "`{}.{}` points at a `{}` without `{}`",
                self.def.from(),
                self.name(),
                self.def.to(),
                primary_key
            ),
        }
        Ok(result)
    }
}
