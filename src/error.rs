//! Error types for rlgl-arena

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Arena not found: {0}")]
    ArenaNotFound(String),

    #[error("Arena already exists: {0}")]
    ArenaExists(String),

    #[error("Location not set: {0}")]
    LocationNotSet(&'static str),

    #[error("Arena task has shut down: {0}")]
    ArenaClosed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArenaError>;

/// Failure reported by a host collaborator. Never aborts a state transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("Player is offline")]
    PlayerOffline,

    #[error("Unknown sound: {0}")]
    UnknownSound(String),

    #[error("Rejected by host: {0}")]
    Rejected(String),
}
