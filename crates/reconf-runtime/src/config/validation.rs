//! Engine settings validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{EngineConfig, LogOutput, LoggingConfig, StorageBackend, StorageConfig, SyncConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &EngineConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_storage_config(&config.storage)?;
    validate_sync_config(&config.sync)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation(
            "logging.max_files must be greater than 0",
        ));
    }

    for module in logging.filters.keys() {
        if module.is_empty() || module.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid module filter name: '{module}'"
            )));
        }
    }

    Ok(())
}

/// Validates storage settings.
fn validate_storage_config(storage: &StorageConfig) -> ConfigResult<()> {
    if storage.backend == StorageBackend::File && storage.dir.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("storage.dir"));
    }
    Ok(())
}

/// Validates sync settings.
fn validate_sync_config(sync: &SyncConfig) -> ConfigResult<()> {
    if sync.broadcast_capacity == 0 {
        return Err(ConfigError::validation(
            "sync.broadcast_capacity must be greater than 0",
        ));
    }
    Ok(())
}
