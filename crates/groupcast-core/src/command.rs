//! Line-oriented wire commands on the inbound connection.
//!
//! ```text
//! register <id> <host> <port>
//! deregister
//! disconnect
//! reconnect <id> <host> <port>
//! msend <word> [<word> ...]
//! ```
//!
//! Tokens are separated by runs of ASCII whitespace; a trailing `\r` is
//! tolerated.

use std::fmt;

use crate::error::ProtocolError;

/// Address where a participant accepts the coordinator's delivery connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// IP address or host name.
    pub host: String,
    /// TCP port, never zero.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One parsed inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join the group as a fresh entrant.
    Register {
        /// Participant id used to tag messages.
        identity: String,
        /// Where to open the delivery channel.
        endpoint: Endpoint,
    },

    /// Leave the group; no replay on a later join.
    Deregister,

    /// Go offline temporarily; a later reconnect replays the window.
    Disconnect,

    /// Come back online after `Disconnect`.
    Reconnect {
        /// Participant id used to tag messages.
        identity: String,
        /// Where to open the new delivery channel.
        endpoint: Endpoint,
    },

    /// Multicast the words, space-joined.
    Msend {
        /// Message words (at least one).
        words: Vec<String>,
    },
}

impl Command {
    /// Parse one line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_ascii_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        match keyword {
            "register" => {
                let (identity, endpoint) = parse_join("register", &args)?;
                Ok(Self::Register { identity, endpoint })
            },
            "reconnect" => {
                let (identity, endpoint) = parse_join("reconnect", &args)?;
                Ok(Self::Reconnect { identity, endpoint })
            },
            "deregister" => no_args("deregister", &args).map(|()| Self::Deregister),
            "disconnect" => no_args("disconnect", &args).map(|()| Self::Disconnect),
            "msend" => {
                if args.is_empty() {
                    return Err(ProtocolError::Arity {
                        command: "msend",
                        expected: "at least 1",
                        actual: 0,
                    });
                }
                Ok(Self::Msend { words: args.iter().map(ToString::to_string).collect() })
            },
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    /// Command keyword as it appears on the wire.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Deregister => "deregister",
            Self::Disconnect => "disconnect",
            Self::Reconnect { .. } => "reconnect",
            Self::Msend { .. } => "msend",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register { identity, endpoint } | Self::Reconnect { identity, endpoint } => {
                write!(f, "{} {} {} {}", self.keyword(), identity, endpoint.host, endpoint.port)
            },
            Self::Deregister | Self::Disconnect => f.write_str(self.keyword()),
            Self::Msend { words } => write!(f, "msend {}", words.join(" ")),
        }
    }
}

/// Parse a port token, rejecting zero.
pub fn parse_port(token: &str) -> Result<u16, ProtocolError> {
    match token.parse::<u16>() {
        Ok(0) | Err(_) => Err(ProtocolError::InvalidPort(token.to_string())),
        Ok(port) => Ok(port),
    }
}

fn parse_join(command: &'static str, args: &[&str]) -> Result<(String, Endpoint), ProtocolError> {
    let [identity, host, port] = args else {
        return Err(ProtocolError::Arity { command, expected: "3", actual: args.len() });
    };
    let port = parse_port(port)?;
    Ok(((*identity).to_string(), Endpoint::new(*host, port)))
}

fn no_args(command: &'static str, args: &[&str]) -> Result<(), ProtocolError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::Arity { command, expected: "0", actual: args.len() })
    }
}
