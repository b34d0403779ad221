//! Message prefix (origin) segment.

use std::fmt;

/// The `:nick!user@host` segment preceding a command.
///
/// Each component is `None` when its delimiter was absent or its segment
/// was empty. A bare server name (`:irc.example.net`) populates only
/// [`host`](Prefix::host).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Prefix {
    /// Text before the first `!` (or before `@` when there is no `!`).
    pub nickname: Option<String>,
    /// Text between `!` and `@` (the user/ident part).
    pub realname: Option<String>,
    /// Text after the last delimiter, up to the first space.
    pub host: Option<String>,
}

impl Prefix {
    /// Whether this prefix names a user rather than a server.
    pub fn is_user(&self) -> bool {
        self.nickname.is_some()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(nick) = &self.nickname {
            f.write_str(nick)?;
        }
        if let Some(user) = &self.realname {
            write!(f, "!{}", user)?;
        }
        match (&self.host, self.nickname.is_some() || self.realname.is_some()) {
            (Some(host), true) => write!(f, "@{}", host),
            (Some(host), false) => f.write_str(host),
            (None, _) => Ok(()),
        }
    }
}
