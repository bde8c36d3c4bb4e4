//! Builder configuration loaded from TOML.


use crate::{error::InternalError, model::LockMode};
use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// BuilderConfig
///
/// Knobs consumed by `ConfiguredStrategy`. Every field is optional in the
/// TOML source; unknown keys are rejected.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    pub supports_root_entity_returns: bool,
    pub supports_root_collection_returns: bool,

    /// Associations nested deeper than this are deferred.
    pub max_fetch_depth: Option<usize>,

    /// Collections beyond this many joined ones are deferred.
    pub max_joined_collections: Option<usize>,

    pub lock_mode: LockMode,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            supports_root_entity_returns: true,
            supports_root_collection_returns: false,
            max_fetch_depth: None,
            max_joined_collections: None,
            lock_mode: LockMode::None,
        }
    }
}

impl BuilderConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|err| ConfigError::Parse {
            message: err.to_string(),
        })?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.supports_root_entity_returns && !self.supports_root_collection_returns {
            return Err(ConfigError::NoRootReturns);
        }

        Ok(())
    }
}

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid builder configuration: {message}")]
    Parse { message: String },

    #[error("builder configuration allows neither entity nor collection root returns")]
    NoRootReturns,
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
