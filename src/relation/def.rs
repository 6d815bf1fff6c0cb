//! Relationship descriptor shared by every relation variant.
//!
//! A `RelationDef` is immutable once built: endpoints, key pair, link kind,
//! selected fields and a weak handle to the related type's schema, resolved
//! once from the registry at construction time.

use crate::condition::Fields;
use crate::conventions::Conventions;
use crate::error::LifelineError;
use crate::schema::Schema;
use serde::Deserialize;
use std::rc::{Rc, Weak};

/// Relationship variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough,
}

/// How the two endpoints are linked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Link {
    /// Foreign key referencing a key column
    #[default]
    Key,
}

/// Construction options for a relationship
///
/// `from` and `to` are required; everything else falls back to the
/// conventions. `keys` is `(owner field, related field)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelationConfig {
    pub kind: RelationType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub keys: Option<(String, String)>,
    /// Restrict eager-load queries to these fields
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Pivot relation on the owner (has-many-through only)
    #[serde(default)]
    pub through: Option<String>,
    /// Far relation on the pivot type (has-many-through only)
    #[serde(default)]
    pub using: Option<String>,
    /// Delete removed children instead of nulling their foreign key
    #[serde(default)]
    pub junction: bool,
}

impl RelationConfig {
    pub fn new(kind: RelationType) -> Self {
        Self {
            kind,
            name: None,
            from: None,
            to: None,
            keys: None,
            fields: None,
            through: None,
            using: None,
            junction: false,
        }
    }

    pub fn belongs_to() -> Self {
        Self::new(RelationType::BelongsTo)
    }

    pub fn has_one() -> Self {
        Self::new(RelationType::HasOne)
    }

    pub fn has_many() -> Self {
        Self::new(RelationType::HasMany)
    }

    pub fn has_many_through() -> Self {
        Self::new(RelationType::HasManyThrough)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn keys(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.keys = Some((from.into(), to.into()));
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn through(mut self, through: impl Into<String>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn using(mut self, using: impl Into<String>) -> Self {
        self.using = Some(using.into());
        self
    }

    pub fn junction(mut self, junction: bool) -> Self {
        self.junction = junction;
        self
    }
}

pub(crate) fn required<'a>(value: &'a Option<String>, option: &str) -> Result<&'a str, LifelineError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            LifelineError::configuration(format!(
                "The relationship `{option}` option can't be empty."
            ))
        })
}

/// Immutable relationship descriptor
#[derive(Clone)]
pub struct RelationDef {
    rel_type: RelationType,
    name: String,
    from: String,
    to: String,
    keys: (String, String),
    link: Link,
    fields: Fields,
    conventions: Rc<Conventions>,
    target: Weak<Schema>,
}

impl std::fmt::Debug for RelationDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationDef")
            .field("rel_type", &self.rel_type)
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("keys", &self.keys)
            .field("link", &self.link)
            .field("fields", &self.fields)
            .finish()
    }
}

impl RelationDef {
    /// Validate `config` and apply convention defaults.
    ///
    /// `target` resolves the related type's schema by type identifier.
    pub(crate) fn new<F>(
        config: &RelationConfig,
        conventions: Rc<Conventions>,
        target: F,
    ) -> Result<Self, LifelineError>
    where
        F: FnOnce(&str) -> Option<Rc<Schema>>,
    {
        let from = required(&config.from, "from")?.to_string();
        let to = required(&config.to, "to")?.to_string();
        let schema = target(&to).ok_or_else(|| {
            LifelineError::configuration(format!(
                "Unknown type `{to}` in relationship from `{from}`."
            ))
        })?;

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| conventions.field_name(&to));
        let keys = match &config.keys {
            Some(keys) => keys.clone(),
            None => default_keys(config.kind, &from, &to, &conventions),
        };
        let fields = match &config.fields {
            Some(fields) => Fields::Only(fields.clone()),
            None => Fields::All,
        };

        Ok(Self {
            rel_type: config.kind,
            name,
            from,
            to,
            keys,
            link: Link::Key,
            fields,
            conventions,
            target: Rc::downgrade(&schema),
        })
    }

    pub fn rel_type(&self) -> RelationType {
        self.rel_type
    }

    /// Field under which related data is stored on the owner
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// `(owner field, related field)`
    pub fn keys(&self) -> (&str, &str) {
        (&self.keys.0, &self.keys.1)
    }

    /// `(related field, owner field)`
    pub fn keys_reversed(&self) -> (&str, &str) {
        (&self.keys.1, &self.keys.0)
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Schema of the related type.
    pub fn target(&self) -> Result<Rc<Schema>, LifelineError> {
        self.target.upgrade().ok_or_else(|| {
            LifelineError::configuration(format!(
                "Schema `{}` targeted by `{}.{}` is no longer registered.",
                self.to, self.from, self.name
            ))
        })
    }
}

fn default_keys(
    kind: RelationType,
    from: &str,
    to: &str,
    conventions: &Conventions,
) -> (String, String) {
    match kind {
        RelationType::BelongsTo => (
            conventions.foreign_key_name(to),
            conventions.primary_key_name().to_string(),
        ),
        RelationType::HasOne | RelationType::HasMany | RelationType::HasManyThrough => (
            conventions.primary_key_name().to_string(),
            conventions.foreign_key_name(from),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys_per_direction() {
        let conventions = Conventions::default();
        assert_eq!(
            default_keys(RelationType::HasMany, "Gallery", "Image", &conventions),
            ("id".to_string(), "gallery_id".to_string())
        );
        assert_eq!(
            default_keys(RelationType::BelongsTo, "Image", "Gallery", &conventions),
            ("gallery_id".to_string(), "id".to_string())
        );
    }

    #[test]
    fn test_required_rejects_empty() {
        let err = required(&Some(String::new()), "to").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: The relationship `to` option can't be empty."
        );
        assert_eq!(required(&Some("Image".into()), "to").unwrap(), "Image");
    }
}
