//! Naming conventions used to derive relation names and key columns.
//!
//! Type identifiers may be plain (`ImageTag`) or qualified
//! (`app::model::ImageTag`); only the last path segment is significant.

use crate::config::ConventionsConfig;

/// Resolves default names for fields, foreign keys and primary keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conventions {
    primary_key: String,
    foreign_key_suffix: String,
}

impl Default for Conventions {
    fn default() -> Self {
        Self::from_config(&ConventionsConfig::default())
    }
}

impl Conventions {
    pub fn from_config(config: &ConventionsConfig) -> Self {
        Self {
            primary_key: config.primary_key.clone(),
            foreign_key_suffix: config.foreign_key_suffix.clone(),
        }
    }

    /// Field under which a related type is stored on its owner.
    ///
    /// ```
    /// use lifeline::Conventions;
    ///
    /// let conventions = Conventions::default();
    /// assert_eq!(conventions.field_name("app::model::ImageTag"), "image_tag");
    /// ```
    pub fn field_name(&self, type_id: &str) -> String {
        snake_case(basename(type_id))
    }

    /// Foreign key column referencing `type_id`, e.g. `gallery_id` for `Gallery`.
    pub fn foreign_key_name(&self, type_id: &str) -> String {
        format!("{}{}", self.field_name(type_id), self.foreign_key_suffix)
    }

    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    /// Default table/collection name for `type_id`
    pub fn source_name(&self, type_id: &str) -> String {
        snake_case(basename(type_id))
    }
}

fn basename(type_id: &str) -> &str {
    type_id
        .rsplit(|c| c == ':' || c == '\\' || c == '.')
        .next()
        .unwrap_or(type_id)
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_uses_basename() {
        let conventions = Conventions::default();
        assert_eq!(conventions.field_name("Image"), "image");
        assert_eq!(conventions.field_name("chaos::fixture::GalleryDetail"), "gallery_detail");
        assert_eq!(conventions.field_name("Chaos\\Fixture\\ImageTag"), "image_tag");
    }

    #[test]
    fn test_snake_case_acronyms() {
        assert_eq!(snake_case("HTTPRequest"), "http_request");
        assert_eq!(snake_case("Image2Tag"), "image2_tag");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_foreign_key_and_primary_key() {
        let conventions = Conventions::default();
        assert_eq!(conventions.foreign_key_name("Gallery"), "gallery_id");
        assert_eq!(conventions.primary_key_name(), "id");
    }

    #[test]
    fn test_custom_conventions() {
        let conventions = Conventions::from_config(&ConventionsConfig {
            primary_key: "uid".to_string(),
            foreign_key_suffix: "_uid".to_string(),
        });
        assert_eq!(conventions.foreign_key_name("ImageTag"), "image_tag_uid");
        assert_eq!(conventions.primary_key_name(), "uid");
    }
}
