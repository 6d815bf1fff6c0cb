//! Owners and related records as seen by the eager loader.
//!
//! Embedding works the same way on hydrated entities and on plain rows; the
//! only differences are how a fetched batch is interpreted and how related
//! data is attached. `Node` captures those differences.

use crate::condition::ReturnMode;
use crate::entity::{Association, EntityRef};
use crate::error::LifelineError;
use crate::row::{Embedded, Row};
use crate::source::Fetched;
use crate::value::Value;

pub trait Node: Clone + Sized {
    /// Shape requested from the finder when loading records of this kind
    const RETURNING: ReturnMode;

    fn field(&self, name: &str) -> Option<Value>;

    fn attach_one(&mut self, name: &str, related: Option<Self>);

    fn attach_many(&mut self, name: &str, related: Vec<Self>);

    /// Single record attached under `name`, if any.
    fn related_one(&self, name: &str) -> Option<Self>;

    /// Detach and return whatever is attached under `name`.
    fn take_related(&mut self, name: &str) -> Vec<Self>;

    fn from_fetched(fetched: Fetched) -> Result<Vec<Self>, LifelineError>;

    /// Identity shared by every copy of the same record; plain rows have none.
    fn identity(&self) -> Option<usize>;
}

impl Node for EntityRef {
    const RETURNING: ReturnMode = ReturnMode::Entities;

    fn field(&self, name: &str) -> Option<Value> {
        self.get(name)
    }

    fn attach_one(&mut self, name: &str, related: Option<Self>) {
        self.assign(name.to_string(), Association::One(related), false);
    }

    fn attach_many(&mut self, name: &str, related: Vec<Self>) {
        self.assign(
            name.to_string(),
            Association::Many(related.into_iter().collect()),
            false,
        );
    }

    fn related_one(&self, name: &str) -> Option<Self> {
        self.one(name)
    }

    fn take_related(&mut self, name: &str) -> Vec<Self> {
        match self.unset(name) {
            Some(Association::One(related)) => related.into_iter().collect(),
            Some(Association::Many(related)) => related.into_vec(),
            None => Vec::new(),
        }
    }

    fn from_fetched(fetched: Fetched) -> Result<Vec<Self>, LifelineError> {
        match fetched {
            Fetched::Entities(entities) => Ok(entities),
            Fetched::Rows(rows) => Err(LifelineError::Finder(format!(
                "expected entities, finder returned {} plain rows",
                rows.len()
            ))),
        }
    }

    fn identity(&self) -> Option<usize> {
        Some(self.handle_id())
    }
}

impl Node for Row {
    const RETURNING: ReturnMode = ReturnMode::Rows;

    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn attach_one(&mut self, name: &str, related: Option<Self>) {
        self.embed(name, Embedded::One(related));
    }

    fn attach_many(&mut self, name: &str, related: Vec<Self>) {
        self.embed(name, Embedded::Many(related));
    }

    fn related_one(&self, name: &str) -> Option<Self> {
        self.one(name).cloned()
    }

    fn take_related(&mut self, name: &str) -> Vec<Self> {
        match self.take_embedded(name) {
            Some(Embedded::One(related)) => related.into_iter().collect(),
            Some(Embedded::Many(related)) => related,
            None => Vec::new(),
        }
    }

    fn from_fetched(fetched: Fetched) -> Result<Vec<Self>, LifelineError> {
        match fetched {
            Fetched::Rows(rows) => Ok(rows),
            Fetched::Entities(entities) => Ok(entities.iter().map(EntityRef::to_row).collect()),
        }
    }

    fn identity(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_take_related_detaches() {
        let mut owner: Row = [("id", 1)].into_iter().collect();
        let child: Row = [("gallery_id", 1)].into_iter().collect();
        owner.attach_many("images", vec![child.clone()]);

        assert_eq!(owner.take_related("images"), vec![child]);
        assert!(owner.embedded("images").is_none());
        assert!(owner.take_related("images").is_empty());
    }

    #[test]
    fn test_row_attach_one_none() {
        let mut owner = Row::new();
        owner.attach_one("gallery", None);
        assert_eq!(owner.embedded("gallery"), Some(&Embedded::One(None)));
        assert!(owner.related_one("gallery").is_none());
    }

    #[test]
    fn test_rows_from_rows_pass_through() {
        let rows = vec![Row::new()];
        let out = Row::from_fetched(Fetched::Rows(rows.clone())).expect("rows");
        assert_eq!(out, rows);
    }

    #[test]
    fn test_entities_reject_rows() {
        let err = EntityRef::from_fetched(Fetched::Rows(vec![Row::new()])).unwrap_err();
        assert!(matches!(err, LifelineError::Finder(_)));
    }
}
