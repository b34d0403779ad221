//! Command classification.

use std::fmt;

/// The closed set of message types the relay distinguishes.
///
/// Anything that is neither numeric nor in the command table stays
/// [`MessageKind::Unset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    /// Unrecognised command.
    #[default]
    Unset,
    /// Synthetic start-up event delivered to handlers; never parsed off the wire.
    Init,
    /// `PING`
    Ping,
    /// `PRIVMSG`
    Privmsg,
    /// `NOTICE`
    Notice,
    /// `JOIN`
    Join,
    /// `PART`
    Part,
    /// `QUIT`
    Quit,
    /// `NICK`
    Nick,
    /// `MODE`
    Mode,
    /// `KICK`
    Kick,
    /// `TOPIC`
    Topic,
    /// Three-digit server reply, carrying its numeric code.
    Numeric(u16),
}

/// Exact-match lookup table for named commands.
const COMMAND_TABLE: &[(&str, MessageKind)] = &[
    ("JOIN", MessageKind::Join),
    ("KICK", MessageKind::Kick),
    ("MODE", MessageKind::Mode),
    ("NICK", MessageKind::Nick),
    ("NOTICE", MessageKind::Notice),
    ("PART", MessageKind::Part),
    ("PING", MessageKind::Ping),
    ("PRIVMSG", MessageKind::Privmsg),
    ("QUIT", MessageKind::Quit),
    ("TOPIC", MessageKind::Topic),
];

impl MessageKind {
    /// Classify a command token.
    ///
    /// A token starting with an ASCII digit is always numeric, checked before
    /// the table lookup. The numeric code is read from at most the first three
    /// leading digits.
    pub fn classify(command: &str) -> Self {
        let bytes = command.as_bytes();
        if bytes.first().is_some_and(u8::is_ascii_digit) {
            let code = bytes
                .iter()
                .take(3)
                .take_while(|b| b.is_ascii_digit())
                .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
            return MessageKind::Numeric(code);
        }

        COMMAND_TABLE
            .iter()
            .find(|(name, _)| *name == command)
            .map(|(_, kind)| *kind)
            .unwrap_or(MessageKind::Unset)
    }

    /// Whether this is a server numeric reply.
    pub fn is_numeric(&self) -> bool {
        matches!(self, MessageKind::Numeric(_))
    }

    /// The numeric code, if any.
    pub fn numeric(&self) -> Option<u16> {
        match self {
            MessageKind::Numeric(code) => Some(*code),
            _ => None,
        }
    }

    /// Upper-case label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Unset => "UNSET",
            MessageKind::Init => "INIT",
            MessageKind::Ping => "PING",
            MessageKind::Privmsg => "PRIVMSG",
            MessageKind::Notice => "NOTICE",
            MessageKind::Join => "JOIN",
            MessageKind::Part => "PART",
            MessageKind::Quit => "QUIT",
            MessageKind::Nick => "NICK",
            MessageKind::Mode => "MODE",
            MessageKind::Kick => "KICK",
            MessageKind::Topic => "TOPIC",
            MessageKind::Numeric(_) => "NUMERIC",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Numeric(code) => write!(f, "NUMERIC({:03})", code),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        assert_eq!(MessageKind::classify("PRIVMSG"), MessageKind::Privmsg);
        assert_eq!(MessageKind::classify("TOPIC"), MessageKind::Topic);
        assert_eq!(MessageKind::classify("privmsg"), MessageKind::Unset);
        assert_eq!(MessageKind::classify("CAP"), MessageKind::Unset);
    }

    #[test]
    fn test_numeric_precedence() {
        assert_eq!(MessageKind::classify("001"), MessageKind::Numeric(1));
        assert_eq!(MessageKind::classify("433"), MessageKind::Numeric(433));
        assert_eq!(MessageKind::classify("9ABC"), MessageKind::Numeric(9));
        assert_eq!(MessageKind::classify("12345"), MessageKind::Numeric(123));
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageKind::Numeric(5).to_string(), "NUMERIC(005)");
        assert_eq!(MessageKind::Join.to_string(), "JOIN");
    }
}
