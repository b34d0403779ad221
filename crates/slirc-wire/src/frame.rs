//! Worker IPC framing.
//!
//! Every frame is one `\n`-terminated line.
//!
//! | direction        | form                                          |
//! |------------------|-----------------------------------------------|
//! | parent -> worker | `S<connection id> <protocol line>`            |
//! | worker -> parent | `:CONNECT <nick> <user> <host> <port> <0\|1>` |
//! | worker -> parent | `:RELOAD`                                     |
//! | worker -> parent | `S<connection id or server name> <line>`      |
//!
//! Outbound event frames always address connections by numeric id.
//! Routed frames coming back may use either form; a token made only of
//! digits is read as an id.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Upper bound on one IPC frame, tag included.
pub const MAX_FRAME_LEN: usize = 8192;

/// Encode one protocol line for delivery to a worker.
///
/// Any line terminators already on `line` are stripped so the frame stays a
/// single line.
pub fn encode_event(connection_id: u64, line: &str) -> String {
    format!("S{} {}\n", connection_id, line.trim_end_matches(['\r', '\n']))
}

/// Encode a routed protocol line from a worker back to the parent.
pub fn encode_routed(address: &Address, line: &str) -> String {
    format!("S{} {}\n", address, line.trim_end_matches(['\r', '\n']))
}

/// How a routed frame names its connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    /// Process-unique connection id.
    Id(u64),
    /// Configured server name.
    Name(String),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Id(id) => write!(f, "{}", id),
            Address::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for Address {
    fn from(id: u64) -> Self {
        Address::Id(id)
    }
}

impl FromStr for Address {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(FrameError::MissingAddress(s.to_owned()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = s.parse() {
                return Ok(Address::Id(id));
            }
        }
        Ok(Address::Name(s.to_owned()))
    }
}

/// Arguments of a `:CONNECT` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Nickname to register with.
    pub nick: String,
    /// Username (ident) to register with.
    pub username: String,
    /// Remote host.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Negotiate TLS.
    pub tls: bool,
}

/// Management commands a worker may issue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagementCommand {
    /// Open and register a new server connection.
    Connect(ConnectRequest),
    /// Restart handler state in every worker.
    Reload,
}

impl ManagementCommand {
    /// The command word.
    pub fn name(&self) -> &'static str {
        match self {
            ManagementCommand::Connect(_) => "CONNECT",
            ManagementCommand::Reload => "RELOAD",
        }
    }

    fn parse(name: &str, args: &str) -> Result<Self, FrameError> {
        match name {
            "CONNECT" => {
                let parts: Vec<&str> = args.split_whitespace().collect();
                if parts.len() < 5 {
                    return Err(FrameError::NotEnoughArguments {
                        command: "CONNECT",
                        expected: 5,
                        got: parts.len(),
                    });
                }
                let port = parts[3]
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| FrameError::InvalidArgument {
                        field: "port",
                        value: parts[3].to_owned(),
                    })?;
                let tls = match parts[4] {
                    "0" => false,
                    "1" => true,
                    other => {
                        return Err(FrameError::InvalidArgument {
                            field: "tls",
                            value: other.to_owned(),
                        });
                    }
                };
                Ok(ManagementCommand::Connect(ConnectRequest {
                    nick: parts[0].to_owned(),
                    username: parts[1].to_owned(),
                    host: parts[2].to_owned(),
                    port,
                    tls,
                }))
            }
            "RELOAD" => Ok(ManagementCommand::Reload),
            other => Err(FrameError::UnknownCommand(other.to_owned())),
        }
    }
}

/// Wire form, terminated by `\n`.
impl fmt::Display for ManagementCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagementCommand::Connect(req) => writeln!(
                f,
                ":CONNECT {} {} {} {} {}",
                req.nick,
                req.username,
                req.host,
                req.port,
                u8::from(req.tls)
            ),
            ManagementCommand::Reload => writeln!(f, ":RELOAD"),
        }
    }
}

/// One frame read from a worker's channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// `:<COMMAND> [args]`
    Management(ManagementCommand),
    /// `S<address> <line>` to be written to a server connection.
    Routed {
        /// Target connection.
        address: Address,
        /// Protocol line, without terminator.
        line: String,
    },
}

impl FromStr for InboundFrame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(['\r', '\n']);
        if s.trim().is_empty() {
            return Err(FrameError::Empty);
        }

        if let Some(command) = s.strip_prefix(':') {
            let (name, args) = command.split_once(' ').unwrap_or((command, ""));
            return ManagementCommand::parse(name, args).map(InboundFrame::Management);
        }

        let tagged = s
            .strip_prefix('S')
            .ok_or_else(|| FrameError::MissingAddress(s.to_owned()))?;
        let (address, line) = tagged
            .split_once(' ')
            .ok_or_else(|| FrameError::MissingLine(tagged.to_owned()))?;
        if line.is_empty() {
            return Err(FrameError::MissingLine(address.to_owned()));
        }

        Ok(InboundFrame::Routed {
            address: address.parse()?,
            line: line.to_owned(),
        })
    }
}
