//! Worker-side frame dispatch.

use tracing::debug;

use super::{Event, EventHandler, Outbox};
use crate::error::DispatchError;

/// Turns inbound `S<id> <line>` frames into handler calls and collects the
/// frames the handler wants sent back.
pub struct FrameDispatcher<H> {
    handler: H,
    outbox: Outbox,
}

impl<H: EventHandler> FrameDispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            outbox: Outbox::new(),
        }
    }

    #[cfg(test)]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Deliver the start-up INIT event.
    pub fn init(&mut self) -> Vec<String> {
        self.deliver(&Event::init())
    }

    /// Rebuild handler state and deliver INIT again.
    pub fn reinitialize(&mut self) -> Vec<String> {
        self.handler.reinitialize();
        self.init()
    }

    pub fn dispatch_frame(&mut self, frame: &str) -> Result<Vec<String>, DispatchError> {
        let event = Event::from_frame(frame)?;
        debug!(connection = event.connection_id(), key = %event.handler_key(), "Dispatching event");
        Ok(self.deliver(&event))
    }

    fn deliver(&mut self, event: &Event) -> Vec<String> {
        self.handler.handle(event, &mut self.outbox);
        self.outbox.take()
    }
}
