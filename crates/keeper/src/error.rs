//! Error types for the keeper service

use smartnode_types::SmartnodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for KeeperError {
    fn from(err: std::io::Error) -> Self {
        KeeperError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for KeeperError {
    fn from(err: toml::de::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<toml::ser::Error> for KeeperError {
    fn from(err: toml::ser::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<KeeperError> for SmartnodeError {
    fn from(err: KeeperError) -> Self {
        SmartnodeError::invalid_configuration("keeper", &err.to_string())
    }
}
