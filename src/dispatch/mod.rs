//! Event dispatch on both sides of the worker channel.
//!
//! - [`EventDispatcher`] runs in the supervisor: it parses each line read
//!   from a server, answers PING itself, auto-joins on welcome and forwards
//!   everything else to a worker through an [`EventSink`].
//! - [`FrameDispatcher`] runs in a worker: it decodes forwarded frames and
//!   hands them to an [`EventHandler`].

mod event;
mod handler;
mod outbox;
mod worker;

use std::sync::Arc;

use slirc_wire::{Message, MessageKind};
use tracing::{debug, warn};

pub use self::event::Event;
pub use self::handler::{CoreHandler, EventHandler};
pub use self::outbox::Outbox;
pub use self::worker::FrameDispatcher;

use crate::error::{ConnectionError, DispatchError};
use crate::network::{Connection, ConnectionId, Identity};

/// RPL_WELCOME
const RPL_WELCOME: u16 = 1;

// ============================================================================
// Seams
// ============================================================================

/// Where forwarded events go.
pub trait EventSink {
    /// Hand one raw server line, read on `connection_id`, to a worker.
    fn submit(&self, connection_id: ConnectionId, line: &str) -> Result<(), DispatchError>;
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn submit(&self, connection_id: ConnectionId, line: &str) -> Result<(), DispatchError> {
        (**self).submit(connection_id, line)
    }
}

/// The connection a line was read from.
pub trait Origin {
    fn id(&self) -> ConnectionId;
    fn server_name(&self) -> Option<&str>;
    fn identity(&self) -> &Identity;
    fn write_line(&self, line: &str) -> Result<usize, ConnectionError>;
}

impl Origin for Connection {
    fn id(&self) -> ConnectionId {
        Connection::id(self)
    }

    fn server_name(&self) -> Option<&str> {
        Some(self.name())
    }

    fn identity(&self) -> &Identity {
        Connection::identity(self)
    }

    fn write_line(&self, line: &str) -> Result<usize, ConnectionError> {
        Connection::write_line(self, line)
    }
}

// ============================================================================
// Supervisor-side dispatch
// ============================================================================

/// What happened to one inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handled in place (PING).
    Answered,
    /// Handed to a worker.
    Forwarded,
    /// Did not parse; dropped.
    Malformed,
    /// Unclassified command; dropped.
    Ignored,
    /// No worker would take it; dropped.
    Undelivered,
}

pub struct EventDispatcher<S> {
    sink: S,
}

impl<S: EventSink> EventDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Route one line read from `origin`.
    pub fn dispatch(&self, line: &str, origin: &dyn Origin) -> Outcome {
        let message: Message = match line.parse() {
            Ok(m) => m,
            Err(e) => {
                warn!(connection = origin.id(), error = %e, line, "Dropping malformed line");
                return Outcome::Malformed;
            }
        };
        let event = Event::new(
            message,
            origin.id(),
            origin.server_name().map(str::to_owned),
        );

        match event.kind() {
            MessageKind::Ping => {
                answer_ping(&event, origin);
                return Outcome::Answered;
            }
            MessageKind::Unset => {
                debug!(
                    connection = origin.id(),
                    server = event.server(),
                    event = %event.message().dump(),
                    "Ignoring unclassified line"
                );
                return Outcome::Ignored;
            }
            MessageKind::Numeric(RPL_WELCOME) => autojoin(origin),
            _ => {}
        }

        match self.sink.submit(origin.id(), line) {
            Ok(()) => Outcome::Forwarded,
            Err(e) => {
                warn!(
                    connection = origin.id(),
                    server = event.server(),
                    error = %e,
                    error_code = e.error_code(),
                    "Dropping event"
                );
                Outcome::Undelivered
            }
        }
    }
}

fn answer_ping(event: &Event, origin: &dyn Origin) {
    let reply = match (event.text(), event.param(0)) {
        (Some(text), _) => format!("PONG :{}", text),
        (None, Some(token)) => format!("PONG {}", token),
        (None, None) => "PONG".to_owned(),
    };
    if let Err(e) = origin.write_line(&reply) {
        warn!(connection = origin.id(), error = %e, "Failed to answer PING");
    }
}

fn autojoin(origin: &dyn Origin) {
    for channel in &origin.identity().channels {
        if let Err(e) = origin.write_line(&format!("JOIN {}", channel)) {
            warn!(connection = origin.id(), channel = %channel, error = %e, "Auto-join failed");
            return;
        }
    }
}
