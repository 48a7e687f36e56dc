//! Server error types.

use std::fmt;

use groupcast_core::ConfigError;

/// Errors that can occur in the coordinator.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error
    Config(ConfigError),

    /// Transport/network error
    Transport(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Transport(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn config_error_is_source() {
        let err = ServerError::from(ConfigError::Missing("listen port"));
        assert_eq!(err.to_string(), "configuration error: missing listen port");
        assert!(err.source().is_some());
    }

    #[test]
    fn io_error_maps_to_transport() {
        let err = ServerError::from(std::io::Error::other("reset"));
        assert!(matches!(err, ServerError::Transport(_)));
    }
}
