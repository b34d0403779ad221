//! Error types for line parsing, IPC framing and the line codec.

use thiserror::Error;

/// Convenience alias for parser results.
pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Reasons a protocol line could not be turned into a [`Message`](crate::Message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The line was empty (or only line terminators).
    #[error("empty line")]
    Empty,

    /// The line ended before a command token was found.
    #[error("no command in line: {0:?}")]
    MissingCommand(String),
}

/// Errors in the worker IPC grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The frame carried nothing but whitespace.
    #[error("empty frame")]
    Empty,

    /// A routed frame did not start with an `S<address>` token.
    #[error("missing connection address in frame: {0:?}")]
    MissingAddress(String),

    /// A routed frame had an address but no protocol line after it.
    #[error("no protocol line after address {0}")]
    MissingLine(String),

    /// A management command name that is not recognised.
    #[error("unknown management command: {0}")]
    UnknownCommand(String),

    /// A management command had too few arguments.
    #[error("{command} expects {expected} arguments, got {got}")]
    NotEnoughArguments {
        /// The management command name.
        command: &'static str,
        /// Number of arguments required.
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },

    /// A management argument failed to parse.
    #[error("invalid {field} argument: {value:?}")]
    InvalidArgument {
        /// Which argument was invalid.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// A line [`LineCodec`](crate::LineCodec) had to drop.
///
/// These are reported in-band: the stream stays usable and decoding resumes
/// at the next line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LineError {
    /// A line exceeded the codec's length limit.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    TooLong {
        /// Bytes seen before the line was cut off.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// A line was not valid UTF-8.
    #[error("invalid UTF-8 at byte {byte_pos}")]
    InvalidUtf8 {
        /// Position of the first invalid byte.
        byte_pos: usize,
    },
}

impl LineError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TooLong { .. } => "line_too_long",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
        }
    }
}
