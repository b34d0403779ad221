//! Classified events: a parsed [`Message`] plus routing context.

use std::borrow::Cow;

use slirc_wire::{Address, FrameError, Message, MessageKind};

use crate::error::DispatchError;
use crate::network::ConnectionId;

/// Channel name prefixes recognised for reply targeting.
const CHANNEL_PREFIXES: [char; 4] = ['#', '&', '+', '!'];

#[derive(Debug, Clone)]
pub struct Event {
    message: Message,
    connection_id: Option<ConnectionId>,
    server: Option<String>,
}

impl Event {
    pub fn new(message: Message, connection_id: ConnectionId, server: Option<String>) -> Self {
        Self {
            message,
            connection_id: Some(connection_id),
            server,
        }
    }

    /// Decode an `S<id> <line>` frame read on the worker channel.
    pub fn from_frame(frame: &str) -> Result<Self, DispatchError> {
        let message: Message = frame.parse()?;
        let connection_id = message
            .connection_id()
            .ok_or_else(|| FrameError::MissingAddress(frame.to_owned()))?;
        Ok(Self {
            message,
            connection_id: Some(connection_id),
            server: None,
        })
    }

    /// Synthetic start-up event, not tied to any connection.
    pub fn init() -> Self {
        Self {
            message: Message::init(),
            connection_id: None,
            server: None,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    /// Server name, when known to whoever built the event.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// How to address replies to this event's connection.
    pub fn address(&self) -> Option<Address> {
        self.connection_id.map(Address::Id)
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn command(&self) -> &str {
        self.message.command()
    }

    pub fn is_numeric(&self) -> bool {
        self.message.kind().is_numeric()
    }

    pub fn numeric(&self) -> Option<u16> {
        self.message.numeric()
    }

    pub fn nickname(&self) -> Option<&str> {
        self.message.nickname()
    }

    pub fn text(&self) -> Option<&str> {
        self.message.text()
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.message.param(index)
    }

    /// Key handlers are looked up by: the command name, or the three-digit
    /// code for numerics.
    pub fn handler_key(&self) -> Cow<'_, str> {
        match self.message.numeric() {
            Some(code) => Cow::Owned(format!("{:03}", code)),
            None => Cow::Borrowed(self.message.command()),
        }
    }

    /// Who this event is aimed at, from our point of view.
    ///
    /// For messages sent straight to `own_nick` the sender is returned, so a
    /// reply goes back to them rather than to ourselves.
    pub fn target(&self, own_nick: &str) -> Option<&str> {
        let first = self.message.param(0)?;
        match self.message.kind() {
            MessageKind::Privmsg | MessageKind::Notice if first.eq_ignore_ascii_case(own_nick) => {
                self.message.nickname()
            }
            _ => Some(first),
        }
    }

    /// The channel the event happened in, else the sender.
    pub fn reply_target(&self) -> Option<&str> {
        match self.message.param(0) {
            Some(first) if first.starts_with(CHANNEL_PREFIXES) => Some(first),
            _ => self.message.nickname(),
        }
    }
}
