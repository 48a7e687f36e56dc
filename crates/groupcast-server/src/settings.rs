//! Coordinator settings from the config file and command-line overrides.

use std::path::Path;

use groupcast_core::{ConfigError, CoordinatorConfig, RetentionWindow};

use crate::error::ServerError;

/// Merge an optional config file with flag overrides.
///
/// Flags win over file values. Without a file both flags are required.
pub fn resolve_config(
    file: Option<&Path>,
    port: Option<u16>,
    retention_secs: Option<u64>,
) -> Result<CoordinatorConfig, ServerError> {
    let config = merge(file, port, retention_secs)?;
    tracing::debug!(port = config.port, retention = ?config.retention.duration(), "resolved config");
    Ok(config)
}

fn merge(
    file: Option<&Path>,
    port: Option<u16>,
    retention_secs: Option<u64>,
) -> Result<CoordinatorConfig, ConfigError> {
    let base = file.map(CoordinatorConfig::load).transpose()?;

    let port = match (port, &base) {
        (Some(0), _) => return Err(ConfigError::InvalidPort("0".to_string())),
        (Some(port), _) => port,
        (None, Some(base)) => base.port,
        (None, None) => return Err(ConfigError::Missing("listen port")),
    };
    let retention = match (retention_secs, &base) {
        (Some(secs), _) => RetentionWindow::from_secs(secs),
        (None, Some(base)) => base.retention,
        (None, None) => return Err(ConfigError::Missing("retention window")),
    };

    Ok(CoordinatorConfig { port, retention })
}
