//! Engine settings.
//!
//! This module provides layered loading and validation of the settings that
//! drive the hosting layer: logging, persistence and commit notifications.
//! They are distinct from the configuration entities the engine manages.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    EngineConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig, StorageBackend,
    StorageConfig, SyncConfig,
};
pub use validation::validate_config;
