//! Worker-side handler collaborator.
//!
//! A handler sees one classified event at a time and answers only through
//! its [`Outbox`].

use slirc_wire::MessageKind;
use tracing::{debug, info};

use super::{Event, Outbox};

pub trait EventHandler: Send {
    /// Handle one event. Look-ups go by [`Event::handler_key`].
    fn handle(&mut self, event: &Event, out: &mut Outbox);

    /// Drop and rebuild handler state (SIGHUP). An INIT event follows.
    fn reinitialize(&mut self) {}
}

/// Built-in handler: logs what it sees and sends nothing.
#[derive(Debug)]
pub struct CoreHandler {
    own_nick: String,
    generation: u32,
}

impl CoreHandler {
    pub fn new(own_nick: impl Into<String>) -> Self {
        Self {
            own_nick: own_nick.into(),
            generation: 0,
        }
    }

    #[cfg(test)]
    /// Number of re-initialisations so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl EventHandler for CoreHandler {
    fn handle(&mut self, event: &Event, _out: &mut Outbox) {
        match event.kind() {
            MessageKind::Init => {
                info!(generation = self.generation, "Handler initialised");
            }
            MessageKind::Privmsg | MessageKind::Notice => {
                info!(
                    connection = event.connection_id(),
                    kind = %event.kind(),
                    from = event.nickname().unwrap_or("*"),
                    target = event.target(&self.own_nick).unwrap_or("*"),
                    text = event.text().unwrap_or(""),
                    "Message"
                );
            }
            _ => {
                debug!(
                    connection = event.connection_id(),
                    key = %event.handler_key(),
                    event = %event.message().dump(),
                    "Event"
                );
            }
        }
    }

    fn reinitialize(&mut self) {
        self.generation += 1;
    }
}
