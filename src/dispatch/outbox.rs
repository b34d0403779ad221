//! Command writer handed to event handlers.
//!
//! Every call appends exactly one IPC frame; the worker loop flushes them to
//! the parent after the handler returns.

use slirc_wire::frame::encode_routed;
use slirc_wire::{Address, ConnectRequest, ManagementCommand};

use super::Event;

#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<String>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a protocol line verbatim.
    pub fn raw(&mut self, to: impl Into<Address>, line: impl AsRef<str>) {
        self.frames.push(encode_routed(&to.into(), line.as_ref()));
    }

    pub fn privmsg(&mut self, to: impl Into<Address>, target: &str, text: &str) {
        self.raw(to, format!("PRIVMSG {} :{}", target, text));
    }

    pub fn notice(&mut self, to: impl Into<Address>, target: &str, text: &str) {
        self.raw(to, format!("NOTICE {} :{}", target, text));
    }

    /// PRIVMSG back to where `event` came from. Emits nothing if the event
    /// has no connection or no reply target.
    pub fn say(&mut self, event: &Event, text: &str) -> bool {
        match (event.address(), event.reply_target()) {
            (Some(to), Some(target)) => {
                self.privmsg(to, target, text);
                true
            }
            _ => false,
        }
    }

    pub fn join(&mut self, to: impl Into<Address>, channel: &str) {
        self.raw(to, format!("JOIN {}", channel));
    }

    /// One JOIN for several channels; `keys` pair up with the leading channels.
    pub fn join_with_keys(&mut self, to: impl Into<Address>, channels: &[&str], keys: &[&str]) {
        let mut line = format!("JOIN {}", channels.join(","));
        if !keys.is_empty() {
            line.push(' ');
            line.push_str(&keys.join(","));
        }
        self.raw(to, line);
    }

    pub fn part(&mut self, to: impl Into<Address>, channel: &str, reason: Option<&str>) {
        match reason {
            Some(reason) => self.raw(to, format!("PART {} :{}", channel, reason)),
            None => self.raw(to, format!("PART {}", channel)),
        }
    }

    /// Set the topic, or query it with `None`.
    pub fn topic(&mut self, to: impl Into<Address>, channel: &str, topic: Option<&str>) {
        match topic {
            Some(topic) => self.raw(to, format!("TOPIC {} :{}", channel, topic)),
            None => self.raw(to, format!("TOPIC {}", channel)),
        }
    }

    pub fn mode(&mut self, to: impl Into<Address>, target: &str, modes: &str) {
        self.raw(to, format!("MODE {} {}", target, modes));
    }

    pub fn kick(&mut self, to: impl Into<Address>, channel: &str, nick: &str, reason: Option<&str>) {
        match reason {
            Some(reason) => self.raw(to, format!("KICK {} {} :{}", channel, nick, reason)),
            None => self.raw(to, format!("KICK {} {}", channel, nick)),
        }
    }

    pub fn whois(&mut self, to: impl Into<Address>, nick: &str) {
        self.raw(to, format!("WHOIS {}", nick));
    }

    pub fn who(&mut self, to: impl Into<Address>, mask: &str) {
        self.raw(to, format!("WHO {}", mask));
    }

    pub fn userhost(&mut self, to: impl Into<Address>, nicks: &[&str]) {
        self.raw(to, format!("USERHOST {}", nicks.join(" ")));
    }

    /// Ask the parent to open a new server connection.
    pub fn connect(&mut self, request: ConnectRequest) {
        self.frames
            .push(ManagementCommand::Connect(request).to_string());
    }

    /// Ask the parent to re-initialise every worker.
    pub fn reload(&mut self) {
        self.frames.push(ManagementCommand::Reload.to_string());
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drain the queued frames.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_frame_per_command() {
        let mut out = Outbox::new();
        out.privmsg(3, "#c", "hello there");
        out.notice(Address::Name("libera".into()), "nick", "hi");
        out.join(3, "#rust");
        out.join_with_keys(3, &["#a", "#b"], &["key"]);
        out.part(3, "#a", Some("bye"));
        out.topic(3, "#a", None);
        out.mode(3, "#a", "+o nick");
        out.kick(3, "#a", "nick", None);
        out.whois(3, "nick");
        out.who(3, "#a");
        out.userhost(3, &["a", "b"]);
        out.reload();

        assert_eq!(
            out.take(),
            [
                "S3 PRIVMSG #c :hello there\n",
                "Slibera NOTICE nick :hi\n",
                "S3 JOIN #rust\n",
                "S3 JOIN #a,#b key\n",
                "S3 PART #a :bye\n",
                "S3 TOPIC #a\n",
                "S3 MODE #a +o nick\n",
                "S3 KICK #a nick\n",
                "S3 WHOIS nick\n",
                "S3 WHO #a\n",
                "S3 USERHOST a b\n",
                ":RELOAD\n",
            ]
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_say_replies_in_context() {
        let mut out = Outbox::new();
        let ev = Event::from_frame("S9 :alice!a@h PRIVMSG #rust :!ping").unwrap();
        assert!(out.say(&ev, "pong"));
        let ev = Event::from_frame("S9 :alice!a@h PRIVMSG bot :!ping").unwrap();
        assert!(out.say(&ev, "pong"));
        assert!(!out.say(&Event::init(), "nobody"));
        assert_eq!(
            out.take(),
            ["S9 PRIVMSG #rust :pong\n", "S9 PRIVMSG alice :pong\n"]
        );
    }

    #[test]
    fn test_connect_frame() {
        let mut out = Outbox::new();
        out.connect(ConnectRequest {
            nick: "bot".into(),
            username: "bot".into(),
            host: "irc.oftc.net".into(),
            port: 6697,
            tls: true,
        });
        assert_eq!(out.take(), [":CONNECT bot bot irc.oftc.net 6697 1\n"]);
    }
}
