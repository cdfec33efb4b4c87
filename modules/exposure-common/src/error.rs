use thiserror::Error;

use crate::types::EntityType;

#[derive(Error, Debug)]
pub enum ExposureError {
    #[error("Unknown entity type: {0} (expected username, email or domain)")]
    UnknownEntityType(String),

    #[error("Invalid {entity_type} key: {key:?}")]
    InvalidEntityKey { entity_type: EntityType, key: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recommendation catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
