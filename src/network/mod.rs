//! Network module.
//!
//! Outbound server connections: the managed [`Connection`], its plain/TLS
//! transport, the process-wide TLS context and the registry of live servers.

mod connection;
mod registry;
mod stream;
pub mod tls;

pub use connection::{
    Connection, ConnectionEvent, ConnectionFlags, ConnectionHandler, ConnectionId,
    ConnectionSettings, ConnectionState, Identity, ReadControl,
};
pub use registry::ServerRegistry;
