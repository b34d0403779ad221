//! Parsed IRC protocol lines.
//!
//! A [`Message`] is produced from exactly one input line and is immutable
//! afterwards; all fields are exposed through accessors.
//!
//! Absent versus empty is kept distinct: a field whose delimiter never
//! appeared is `None`, while a trailing parameter written as a bare `:` is
//! `Some("")`. Prefix segments that are present but empty collapse to
//! `None`.

mod kind;
mod parse;
mod prefix;

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::ParseError;

pub use self::kind::MessageKind;
pub use self::parse::parse;
pub use self::prefix::Prefix;

/// Maximum number of positional parameters retained per message.
///
/// Tokens past this cap are dropped without error.
pub const MAX_PARAMS: usize = 15;

/// Positional parameter storage.
pub type Params = SmallVec<[String; 4]>;

/// One fully parsed protocol line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub(crate) connection_id: Option<u64>,
    pub(crate) prefix: Option<Prefix>,
    pub(crate) command: String,
    pub(crate) kind: MessageKind,
    pub(crate) params: Params,
    pub(crate) text: Option<String>,
}

impl Message {
    /// The synthetic start-up message handed to handlers once per
    /// (re)initialisation.
    pub fn init() -> Self {
        Self {
            connection_id: None,
            prefix: None,
            command: "INIT".to_owned(),
            kind: MessageKind::Init,
            params: Params::new(),
            text: None,
        }
    }

    /// Connection tag (`S<id>`) when the line came off the worker channel.
    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    /// The prefix segment, if the line carried one.
    pub fn prefix(&self) -> Option<&Prefix> {
        self.prefix.as_ref()
    }

    /// Nickname of the sender.
    pub fn nickname(&self) -> Option<&str> {
        self.prefix.as_ref()?.nickname.as_deref()
    }

    /// User/ident part of the sender.
    pub fn realname(&self) -> Option<&str> {
        self.prefix.as_ref()?.realname.as_deref()
    }

    /// Host part of the sender (or the server name for server lines).
    pub fn host(&self) -> Option<&str> {
        self.prefix.as_ref()?.host.as_deref()
    }

    /// The raw command token.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Classified type.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Numeric code for server replies.
    pub fn numeric(&self) -> Option<u16> {
        self.kind.numeric()
    }

    /// Positional parameters, in order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Positional parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Trailing free-text parameter.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// One-line diagnostic rendering of every parsed field.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(id) = self.connection_id {
            out.push_str(&format!("S{} ", id));
        }
        match &self.prefix {
            Some(p) if p.nickname.is_some() => out.push_str(&format!(
                "<{}!{}@{}> ",
                p.nickname.as_deref().unwrap_or(""),
                p.realname.as_deref().unwrap_or(""),
                p.host.as_deref().unwrap_or("")
            )),
            Some(p) => out.push_str(&format!("h:{} ", p.host.as_deref().unwrap_or(""))),
            None => {}
        }
        out.push_str(&format!("c:{} [{}]", self.command, self.kind));
        for param in &self.params {
            out.push_str(&format!(" p:{}", param));
        }
        if let Some(text) = &self.text {
            out.push_str(&format!(" t:{}", text));
        }
        out
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Serializes back to protocol form, without the connection tag or line
/// terminator.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        if let Some(text) = &self.text {
            write!(f, " :{}", text)?;
        }
        Ok(())
    }
}
