//! Schema configuration loaded from `config/schema.toml` or environment variables.
//!
//! ```toml
//! [conventions]
//! primary_key = "id"
//!
//! [[models]]
//! name = "Gallery"
//!
//! [[models.relations]]
//! kind = "has_many"
//! name = "images"
//! to = "Image"
//! keys = ["id", "gallery_id"]
//! ```
//!
//! Type and relation names are carried as values rather than table keys so
//! their case survives the `config` crate's key normalization.

use crate::relation::RelationConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const SCHEMA_FILE: &str = "config/schema.toml";
const ENV_PREFIX: &str = "LIFELINE";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConventionsConfig {
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default = "default_foreign_key_suffix")]
    pub foreign_key_suffix: String,
}

impl Default for ConventionsConfig {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            foreign_key_suffix: default_foreign_key_suffix(),
        }
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_foreign_key_suffix() -> String {
    "_id".to_string()
}

/// Declaration of one model type
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    /// Table/collection name, defaults to the conventions' source name
    #[serde(default)]
    pub source: Option<String>,
    /// Primary key column, defaults to the conventions' primary key
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            primary_key: None,
            relations: Vec::new(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    pub fn relation(mut self, relation: RelationConfig) -> Self {
        self.relations.push(relation);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SchemaConfig {
    #[serde(default)]
    pub conventions: ConventionsConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl SchemaConfig {
    /// Load the schema configuration from `config/schema.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(SCHEMA_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(SCHEMA_FILE).exists() {
                    log::warn!("failed to load {SCHEMA_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load schema configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        settings.try_deserialize::<SchemaConfig>()
    }

    /// Parse a schema configuration from inline TOML.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize::<SchemaConfig>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RelationType;

    #[test]
    fn test_conventions_defaults() {
        let config = SchemaConfig::from_toml("").expect("empty config");
        assert_eq!(config.conventions, ConventionsConfig::default());
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_models_and_relations_parse() {
        let config = SchemaConfig::from_toml(
            r#"
            [conventions]
            primary_key = "uid"

            [[models]]
            name = "Gallery"
            source = "gallery"

            [[models.relations]]
            kind = "has_many"
            name = "images"
            to = "Image"
            keys = ["uid", "gallery_uid"]

            [[models]]
            name = "Image"

            [[models.relations]]
            kind = "has_many_through"
            name = "tags"
            to = "Tag"
            through = "images_tags"
            using = "tag"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.conventions.primary_key, "uid");
        assert_eq!(config.conventions.foreign_key_suffix, "_id");
        assert_eq!(config.models.len(), 2);

        let gallery = &config.models[0];
        assert_eq!(gallery.name, "Gallery");
        assert_eq!(gallery.source.as_deref(), Some("gallery"));
        let images = &gallery.relations[0];
        assert_eq!(images.kind, RelationType::HasMany);
        assert_eq!(images.name.as_deref(), Some("images"));
        assert_eq!(
            images.keys,
            Some(("uid".to_string(), "gallery_uid".to_string()))
        );

        let tags = &config.models[1].relations[0];
        assert_eq!(tags.kind, RelationType::HasManyThrough);
        assert_eq!(tags.through.as_deref(), Some("images_tags"));
        assert_eq!(tags.using.as_deref(), Some("tag"));
    }

    #[test]
    fn test_unknown_relation_kind_is_rejected() {
        let result = SchemaConfig::from_toml(
            r#"
            [[models]]
            name = "Gallery"

            [[models.relations]]
            kind = "has_some"
            to = "Image"
            "#,
        );
        assert!(result.is_err());
    }
}
