//! Runtime error types.

use reconf_core::{Identity, ValueError};
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};
pub use crate::store::StoreError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No entity of the requested type is loaded.
    #[error("Configuration not registered: {0}")]
    NotRegistered(&'static str),

    /// An entity of the same type or identity is already loaded.
    #[error("Configuration already registered: {0}")]
    AlreadyRegistered(Identity),

    /// No entity with the given full name is loaded.
    #[error("Unknown configuration: {0}")]
    UnknownConfig(String),

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A JSON payload did not fit the entity.
    #[error("Invalid payload: {0}")]
    Value(#[from] ValueError),

    /// Engine settings error.
    #[error("Settings error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
