//! # slirc-wire
//!
//! Wire-level building blocks for the slirc relay:
//!
//! - [`message`]: a finite-state-machine parser that turns one IRC protocol
//!   line into a classified [`Message`].
//! - [`frame`]: the line-oriented grammar spoken between the relay
//!   supervisor and its worker processes.
//! - [`line`]: a newline codec for tokio transports (behind the `tokio`
//!   feature).
//!
//! ## Parsing a protocol line
//!
//! ```rust
//! use slirc_wire::{Message, MessageKind};
//!
//! let msg: Message = ":nick!user@host PRIVMSG #rust :hello there".parse().unwrap();
//! assert_eq!(msg.kind(), MessageKind::Privmsg);
//! assert_eq!(msg.nickname(), Some("nick"));
//! assert_eq!(msg.params(), ["#rust"]);
//! assert_eq!(msg.text(), Some("hello there"));
//! ```
//!
//! ## Worker channel framing
//!
//! ```rust
//! use slirc_wire::frame;
//!
//! let frame = frame::encode_event(42, "PING :abc123");
//! assert_eq!(frame, "S42 PING :abc123\n");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;

pub use self::error::{FrameError, LineError, ParseError};
pub use self::frame::{Address, ConnectRequest, InboundFrame, ManagementCommand};
#[cfg(feature = "tokio")]
pub use self::line::{Decoded, LineCodec};
pub use self::message::{Message, MessageKind, Params, Prefix, MAX_PARAMS};
