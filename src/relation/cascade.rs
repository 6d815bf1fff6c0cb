//! Diff-and-reconcile step shared by every owner-side relation.
//!
//! The related records attached to an owner are compared with the ones
//! storage currently links to it. Attached records get the owner's key and
//! are broadcast; records only present in storage are detached according to
//! a [`RemovalPolicy`].

use super::def::RelationDef;
use crate::condition::{Conditions, FetchOptions};
use crate::entity::EntityRef;
use crate::error::LifelineError;
use crate::source::Fetched;
use crate::value::{is_null, key_of, null_like, Value};
use std::collections::HashSet;

/// What happens to a related record that is no longer attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Null its foreign key and save it; the record keeps existing
    Nullify,
    /// Hard-delete it with a single key-set truncate
    DeletePivot,
}

/// Bring storage in line with `attached` for one owner.
///
/// Sibling failures do not stop the loop; the result is the AND of every
/// individual outcome. Errors from the finder or the store are returned as-is.
///
/// `detached` holds in-memory handles the caller dropped from the
/// association. Those whose rows get deleted are marked as no longer existing.
pub(crate) fn reconcile(
    def: &RelationDef,
    owner: &EntityRef,
    attached: &[EntityRef],
    policy: RemovalPolicy,
    detached: &[EntityRef],
) -> Result<bool, LifelineError> {
    let (owner_key, foreign_key) = def.keys();
    let key_value = owner.get(owner_key).filter(|v| !is_null(v));
    let previous = previously_materialized(def, owner, foreign_key, key_value.as_ref())?;

    let mut result = true;
    for related in attached {
        let value = match &key_value {
            Some(value) => value.clone(),
            None => null_like(related.get(foreign_key).as_ref()),
        };
        related.set(foreign_key, value);
        let ok = related.broadcast()?;
        if !ok {
            log::warn!(
                "cascade of `{}.{}` failed for a `{}` record",
                def.from(),
                def.name(),
                def.to()
            );
        }
        result &= ok;
    }

    let kept: HashSet<String> = attached
        .iter()
        .filter_map(|related| related.primary_key().as_ref().and_then(key_of))
        .collect();
    let removed: Vec<EntityRef> = previous
        .into_iter()
        .filter(|stored| {
            stored
                .primary_key()
                .as_ref()
                .and_then(key_of)
                .is_some_and(|key| !kept.contains(&key))
        })
        .collect();

    if removed.is_empty() {
        return Ok(result);
    }
    log::debug!(
        "detaching {} `{}` record(s) from `{}.{}` ({:?})",
        removed.len(),
        def.to(),
        def.from(),
        def.name(),
        policy
    );

    match policy {
        RemovalPolicy::Nullify => {
            for stale in &removed {
                stale.set(foreign_key, null_like(stale.get(foreign_key).as_ref()));
                let ok = stale.broadcast()?;
                result &= ok;
            }
        }
        RemovalPolicy::DeletePivot => {
            let target = def.target()?;
            let keys: Vec<Value> = removed.iter().filter_map(EntityRef::primary_key).collect();
            let deleted: HashSet<String> = keys.iter().filter_map(key_of).collect();
            let conditions = Conditions::new().is_in(target.primary_key(), keys);
            let ok = target.truncate(&conditions)?;
            if ok {
                let held = detached.iter().filter(|handle| {
                    handle
                        .primary_key()
                        .as_ref()
                        .and_then(key_of)
                        .is_some_and(|key| deleted.contains(&key))
                });
                for stale in removed.iter().chain(held) {
                    stale.set_exists(false);
                }
            }
            result &= ok;
        }
    }
    Ok(result)
}

/// Related records storage links to `owner` before this broadcast.
///
/// A new owner, or one without a key, has none.
fn previously_materialized(
    def: &RelationDef,
    owner: &EntityRef,
    foreign_key: &str,
    key_value: Option<&Value>,
) -> Result<Vec<EntityRef>, LifelineError> {
    let Some(value) = key_value else {
        return Ok(Vec::new());
    };
    if !owner.exists() {
        return Ok(Vec::new());
    }
    let target = def.target()?;
    let conditions = Conditions::new().eq(foreign_key, value.clone());
    match target.find_all(&conditions, &FetchOptions::default())? {
        Fetched::Entities(entities) => Ok(entities),
        Fetched::Rows(_) => Err(LifelineError::Finder(format!(
            "finder of `{}` returned plain rows where entities were requested",
            target.name()
        ))),
    }
}
