//! Eager loading helpers shared by the relation variants.
//!
//! All variants use the "selectinload" strategy:
//! 1. Collect the distinct key values from every owner
//! 2. Fetch all related records in a single `key IN (values)` query
//! 3. Group the related records by their key value
//! 4. Hand each owner the group matching its own key
//!
//! Cost is one finder call per relation hop, whatever the number of owners.

use super::def::RelationDef;
use super::node::Node;
use super::EmbedOptions;
use crate::condition::{Conditions, FetchOptions};
use crate::error::LifelineError;
use crate::value::{key_of, key_of_opt, Value};
use std::collections::{HashMap, HashSet};

/// Distinct non-null values of `field` across `owners`, in first-seen order.
pub(crate) fn collect_keys<N: Node>(owners: &[N], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for owner in owners {
        let Some(value) = owner.field(field) else {
            continue;
        };
        if let Some(key) = key_of(&value) {
            if seen.insert(key) {
                values.push(value);
            }
        }
    }
    values
}

/// Group `related` by the normalized value of `field`.
///
/// Records with a null or missing `field` belong to no owner and are dropped.
pub(crate) fn bucket<N: Node>(related: Vec<N>, field: &str) -> HashMap<String, Vec<N>> {
    let mut groups: HashMap<String, Vec<N>> = HashMap::new();
    for record in related {
        match key_of_opt(record.field(field).as_ref()) {
            Some(key) => groups.entry(key).or_default().push(record),
            None => log::trace!("dropping related record without `{field}`"),
        }
    }
    log::trace!("bucketed related records into {} group(s) by `{field}`", groups.len());
    groups
}

/// The group belonging to `owner`, matched on its `field` value.
pub(crate) fn group_for<'a, N: Node>(
    groups: &'a HashMap<String, Vec<N>>,
    owner: &N,
    field: &str,
) -> Option<&'a Vec<N>> {
    key_of_opt(owner.field(field).as_ref()).and_then(|key| groups.get(&key))
}

/// Per owner, whether it is the first occurrence of its record.
///
/// Entity handles can repeat across owners (a tag shared by two images);
/// only the first occurrence may be detached and reattached.
pub(crate) fn first_occurrences<N: Node>(owners: &[N]) -> Vec<bool> {
    let mut seen = HashSet::new();
    owners
        .iter()
        .map(|owner| owner.identity().map_or(true, |id| seen.insert(id)))
        .collect()
}

/// Run the single batched query of an embed: `key IN values AND user conditions`.
pub(crate) fn fetch<N: Node>(
    def: &RelationDef,
    key: &str,
    values: Vec<Value>,
    options: &EmbedOptions,
) -> Result<Vec<N>, LifelineError> {
    let target = def.target()?;
    let fields = if options.fields.is_all() {
        def.fields().clone()
    } else {
        options.fields.clone()
    };
    let fetch = FetchOptions {
        returning: N::RETURNING,
        fields: fields.including(key),
    };
    let conditions = Conditions::new()
        .is_in(key, values)
        .and(&options.conditions);

    log::debug!(
        "embedding `{}` from `{}` into `{}`",
        def.name(),
        def.to(),
        def.from()
    );
    N::from_fetched(target.find_all(&conditions, &fetch)?)
}
