//! Startup configuration files.
//!
//! Coordinator file:
//!
//! ```text
//! <listen port>
//! <retention window in seconds>
//! ```
//!
//! Participant file:
//!
//! ```text
//! <participant id>
//! <local log path>
//! <coordinator host> <coordinator port>
//! ```
//!
//! Any error here is fatal: the binaries exit before binding a socket.

use std::path::{Path, PathBuf};

use crate::{error::ConfigError, log::RetentionWindow};

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// TCP port for inbound command connections.
    pub port: u16,
    /// Replay window for reconnecting participants.
    pub retention: RetentionWindow,
}

impl CoordinatorConfig {
    /// Parse the two-value coordinator file format.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut tokens = contents.split_ascii_whitespace();
        let port = parse_port(tokens.next().ok_or(ConfigError::Missing("listen port"))?)?;
        let retention =
            parse_retention(tokens.next().ok_or(ConfigError::Missing("retention window"))?)?;
        Ok(Self { port, retention })
    }

    /// Read and parse a coordinator config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read(path)?)
    }
}

/// Participant settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantConfig {
    /// Participant id announced on register/reconnect.
    pub identity: String,
    /// Append-only file receiving every delivered message.
    pub log_path: PathBuf,
    /// Coordinator host.
    pub coordinator_host: String,
    /// Coordinator command port.
    pub coordinator_port: u16,
}

impl ParticipantConfig {
    /// Parse the participant file format.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());

        let identity = lines.next().ok_or(ConfigError::Missing("participant id"))?;
        if identity.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidIdentity(identity.to_string()));
        }
        let log_path = lines.next().ok_or(ConfigError::Missing("log file path"))?;

        let rest: Vec<&str> = lines.flat_map(str::split_ascii_whitespace).collect();
        let host = rest.first().ok_or(ConfigError::Missing("coordinator host"))?;
        let port = parse_port(rest.get(1).ok_or(ConfigError::Missing("coordinator port"))?)?;

        Ok(Self {
            identity: identity.to_string(),
            log_path: PathBuf::from(log_path),
            coordinator_host: (*host).to_string(),
            coordinator_port: port,
        })
    }

    /// Read and parse a participant config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::parse(&read(path)?)
    }
}

/// Parse a non-zero TCP port.
pub fn parse_port(token: &str) -> Result<u16, ConfigError> {
    match token.parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidPort(token.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Parse a retention window in whole seconds.
pub fn parse_retention(token: &str) -> Result<RetentionWindow, ConfigError> {
    token
        .parse::<u64>()
        .map(RetentionWindow::from_secs)
        .map_err(|_| ConfigError::InvalidRetention(token.to_string()))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_file() {
        let config = CoordinatorConfig::parse("5000\n30\n").unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.retention, RetentionWindow::from_secs(30));
    }

    #[test]
    fn coordinator_rejects_bad_values() {
        assert!(matches!(CoordinatorConfig::parse("port\n5"), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(CoordinatorConfig::parse("0\n5"), Err(ConfigError::InvalidPort(_))));
        assert!(matches!(
            CoordinatorConfig::parse("5000\n-1"),
            Err(ConfigError::InvalidRetention(_))
        ));
        assert!(matches!(
            CoordinatorConfig::parse("5000"),
            Err(ConfigError::Missing("retention window"))
        ));
    }

    #[test]
    fn participant_file() {
        let config = ParticipantConfig::parse("alice\n/tmp/alice.log\n10.0.0.1 5000\n").unwrap();
        assert_eq!(
            config,
            ParticipantConfig {
                identity: "alice".into(),
                log_path: PathBuf::from("/tmp/alice.log"),
                coordinator_host: "10.0.0.1".into(),
                coordinator_port: 5000,
            }
        );
    }

    #[test]
    fn participant_host_and_port_may_span_lines() {
        let config = ParticipantConfig::parse("bob\nbob.log\nlocalhost\n6000").unwrap();
        assert_eq!(config.coordinator_host, "localhost");
        assert_eq!(config.coordinator_port, 6000);
    }

    #[test]
    fn participant_missing_port() {
        assert!(matches!(
            ParticipantConfig::parse("bob\nbob.log\nlocalhost"),
            Err(ConfigError::Missing("coordinator port"))
        ));
    }

    #[test]
    fn participant_id_with_whitespace_is_invalid() {
        let err = ParticipantConfig::parse("alice smith\nalice.log\nlocalhost 5000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentity(ref id) if id == "alice smith"));
        assert_eq!(
            err.to_string(),
            "invalid participant id \"alice smith\": must not contain whitespace"
        );
    }

    #[test]
    fn load_reports_path() {
        let err = CoordinatorConfig::load(Path::new("/nonexistent/groupcast.conf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/groupcast.conf"));
    }
}
