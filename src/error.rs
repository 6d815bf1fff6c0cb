//! Error type shared by the relationship engine and its collaborators.
//!
//! A cascade that merely fails to persist a child is not an error: it surfaces
//! as `Ok(false)` from `broadcast`. `LifelineError` is reserved for wiring
//! mistakes and for failures reported by `Finder`/`Persist` implementations,
//! which are propagated as-is.

use std::fmt;

/// Lifeline error type
#[derive(Debug)]
pub enum LifelineError {
    /// Invalid relationship or registry configuration
    Configuration(String),
    /// Failure reported by a `Finder`
    Finder(String),
    /// Failure reported by a `Persist` implementation
    Persist(String),
    /// Configuration source could not be loaded or deserialized
    Config(config::ConfigError),
}

impl LifelineError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        LifelineError::Configuration(message.into())
    }

    /// Returns `true` for errors raised while wiring relationships.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LifelineError::Configuration(_))
    }
}

impl fmt::Display for LifelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifelineError::Configuration(s) => {
                write!(f, "Configuration error: {s}")
            }
            LifelineError::Finder(s) => {
                write!(f, "Finder error: {s}")
            }
            LifelineError::Persist(s) => {
                write!(f, "Persist error: {s}")
            }
            LifelineError::Config(e) => {
                write!(f, "Config error: {e}")
            }
        }
    }
}

impl std::error::Error for LifelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifelineError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for LifelineError {
    fn from(err: config::ConfigError) -> Self {
        LifelineError::Config(err)
    }
}
