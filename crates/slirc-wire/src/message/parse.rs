//! Finite-state-machine line parser.
//!
//! The machine walks the line left to right. Each state consumes a prefix of
//! the remaining input and names the next state; the run halts when the
//! input is exhausted or a state returns `None`.
//!
//! ```text
//! ConnectionTag -> Begin -> [Prefix] -> Command -> Params
//! ```

use super::{Message, MessageKind, Params, Prefix, MAX_PARAMS};
use crate::error::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    ConnectionTag,
    Begin,
    Prefix,
    Command,
    Params,
}

struct Machine<'a> {
    rest: &'a str,
    connection_id: Option<u64>,
    prefix: Option<Prefix>,
    command: Option<&'a str>,
    kind: MessageKind,
    params: Params,
    text: Option<&'a str>,
}

impl<'a> Machine<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            rest: line,
            connection_id: None,
            prefix: None,
            command: None,
            kind: MessageKind::Unset,
            params: Params::new(),
            text: None,
        }
    }

    fn run(&mut self) {
        let mut state = Some(State::ConnectionTag);
        while let Some(current) = state {
            state = self.step(current);
            if self.rest.is_empty() {
                break;
            }
        }
    }

    fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::ConnectionTag => self.connection_tag(),
            State::Begin => self.begin(),
            State::Prefix => self.prefix(),
            State::Command => self.command(),
            State::Params => self.params(),
        }
    }

    /// `S<digits> ` as written on the worker channel; absent on raw lines.
    fn connection_tag(&mut self) -> Option<State> {
        if let Some(after) = self.rest.strip_prefix('S') {
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            if digits > 0 && after.as_bytes().get(digits) == Some(&b' ') {
                if let Ok(id) = after[..digits].parse::<u64>() {
                    self.connection_id = Some(id);
                    self.rest = &after[digits + 1..];
                }
            }
        }
        Some(State::Begin)
    }

    fn begin(&mut self) -> Option<State> {
        match self.rest.strip_prefix(':') {
            Some(after) => {
                self.rest = after;
                Some(State::Prefix)
            }
            None => Some(State::Command),
        }
    }

    fn prefix(&mut self) -> Option<State> {
        let mut prefix = Prefix::default();
        let mut seen_bang = false;
        let mut seen_at = false;
        let mut start = 0;
        let mut end = None;

        for (i, b) in self.rest.bytes().enumerate() {
            match b {
                b'!' if !seen_bang && !seen_at => {
                    prefix.nickname = segment(&self.rest[start..i]);
                    seen_bang = true;
                    start = i + 1;
                }
                b'@' if !seen_at => {
                    let part = segment(&self.rest[start..i]);
                    if seen_bang {
                        prefix.realname = part;
                    } else {
                        prefix.nickname = part;
                    }
                    seen_at = true;
                    start = i + 1;
                }
                b' ' => {
                    end = Some(i);
                    break;
                }
                _ => {}
            }
        }

        match end {
            Some(i) => {
                prefix.host = segment(&self.rest[start..i]);
                self.rest = &self.rest[i + 1..];
            }
            None => {
                prefix.host = segment(&self.rest[start..]);
                self.rest = "";
            }
        }

        self.prefix = Some(prefix);
        Some(State::Command)
    }

    fn command(&mut self) -> Option<State> {
        let (token, tail) = match self.rest.split_once(' ') {
            Some((token, tail)) => (token, tail),
            None => (self.rest, ""),
        };
        if token.is_empty() {
            return None;
        }

        self.command = Some(token);
        self.kind = MessageKind::classify(token);
        self.rest = tail;
        Some(State::Params)
    }

    fn params(&mut self) -> Option<State> {
        loop {
            let rest = self.rest.trim_start_matches(' ');
            if rest.is_empty() {
                self.rest = "";
                break;
            }
            if let Some(text) = rest.strip_prefix(':') {
                self.text = Some(text);
                self.rest = "";
                break;
            }

            let (token, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            // Over the cap: token dropped, keep scanning for trailing text.
            if self.params.len() < MAX_PARAMS {
                self.params.push(token.to_owned());
            }
            self.rest = tail;
        }
        None
    }

    fn finish(self, original: &str) -> Result<Message, ParseError> {
        let command = self
            .command
            .ok_or_else(|| ParseError::MissingCommand(original.to_owned()))?;

        Ok(Message {
            connection_id: self.connection_id,
            prefix: self.prefix,
            command: command.to_owned(),
            kind: self.kind,
            params: self.params,
            text: self.text.map(str::to_owned),
        })
    }
}

fn segment(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_owned())
}

/// Parse one line (with or without a worker-channel connection tag).
///
/// Trailing `\r\n` / `\n` are ignored.
pub fn parse(line: &str) -> Result<Message, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut machine = Machine::new(line);
    machine.run();
    machine.finish(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_prefix_roundtrip() {
        let msg = parse(":nick!user@host COMMAND p1 p2 :trailing text").unwrap();
        assert_eq!(msg.nickname(), Some("nick"));
        assert_eq!(msg.realname(), Some("user"));
        assert_eq!(msg.host(), Some("host"));
        assert_eq!(msg.command(), "COMMAND");
        assert_eq!(msg.params(), ["p1", "p2"]);
        assert_eq!(msg.text(), Some("trailing text"));
        assert_eq!(msg.kind(), MessageKind::Unset);
        assert_eq!(msg.connection_id(), None);
    }

    #[test]
    fn test_tagged_ping() {
        let msg = parse("S42 :irc.example.net PING :abc123").unwrap();
        assert_eq!(msg.connection_id(), Some(42));
        assert_eq!(msg.host(), Some("irc.example.net"));
        assert_eq!(msg.nickname(), None);
        assert_eq!(msg.command(), "PING");
        assert_eq!(msg.kind(), MessageKind::Ping);
        assert_eq!(msg.text(), Some("abc123"));
    }

    #[test]
    fn test_numeric() {
        let msg = parse(":irc.example.net 001 bot :Welcome to the network").unwrap();
        assert_eq!(msg.kind(), MessageKind::Numeric(1));
        assert_eq!(msg.numeric(), Some(1));
        assert_eq!(msg.params(), ["bot"]);
    }

    #[test]
    fn test_param_cap_keeps_trailing() {
        let params: Vec<String> = (0..20).map(|i| format!("p{}", i)).collect();
        let line = format!("CMD {} :the end", params.join(" "));
        let msg = parse(&line).unwrap();
        assert_eq!(msg.params().len(), MAX_PARAMS);
        assert_eq!(msg.params()[0], "p0");
        assert_eq!(msg.params()[MAX_PARAMS - 1], format!("p{}", MAX_PARAMS - 1));
        assert_eq!(msg.text(), Some("the end"));
    }

    #[test]
    fn test_last_param_without_trailing_space() {
        let msg = parse("JOIN #channel").unwrap();
        assert_eq!(msg.kind(), MessageKind::Join);
        assert_eq!(msg.params(), ["#channel"]);
        assert_eq!(msg.text(), None);
    }

    #[test]
    fn test_trailing_marker_first() {
        let msg = parse("PING :token here").unwrap();
        assert!(msg.params().is_empty());
        assert_eq!(msg.text(), Some("token here"));
    }

    #[test]
    fn test_empty_trailing_is_present() {
        let msg = parse("PRIVMSG #a :").unwrap();
        assert_eq!(msg.text(), Some(""));
    }

    #[test]
    fn test_prefix_with_command_only() {
        let msg = parse(":irc.example.net 376").unwrap();
        assert_eq!(msg.host(), Some("irc.example.net"));
        assert_eq!(msg.kind(), MessageKind::Numeric(376));
        assert!(msg.params().is_empty());
        assert_eq!(msg.text(), None);
    }

    #[test]
    fn test_nick_at_host() {
        let msg = parse(":nick@host.example QUIT :bye").unwrap();
        assert_eq!(msg.nickname(), Some("nick"));
        assert_eq!(msg.realname(), None);
        assert_eq!(msg.host(), Some("host.example"));
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("\r\n"), Err(ParseError::Empty));
        assert!(matches!(parse(":nick!user@host"), Err(ParseError::MissingCommand(_))));
        assert!(matches!(parse(":"), Err(ParseError::MissingCommand(_))));
        assert!(matches!(parse("S7 "), Err(ParseError::MissingCommand(_))));
    }

    #[test]
    fn test_crlf_stripped() {
        let msg = parse("PRIVMSG #a :hi\r\n").unwrap();
        assert_eq!(msg.text(), Some("hi"));
    }

    #[test]
    fn test_repeated_spaces() {
        let msg = parse("MODE  #chan   +o  nick").unwrap();
        assert_eq!(msg.params(), ["#chan", "+o", "nick"]);
    }

    #[test]
    fn test_not_a_tag() {
        let msg = parse("SQUIT server :bye").unwrap();
        assert_eq!(msg.connection_id(), None);
        assert_eq!(msg.command(), "SQUIT");

        let msg = parse("S12x PRIVMSG").unwrap();
        assert_eq!(msg.connection_id(), None);
        assert_eq!(msg.command(), "S12x");
    }
}
