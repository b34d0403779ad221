//! Unified error handling for slirc-relay.
//!
//! One enum per layer, each with a static `error_code()` used as a
//! structured log field.

use std::io;

use slirc_wire::{FrameError, LineError, ParseError};
use thiserror::Error;

// ============================================================================
// Connection Errors (transport lifecycle)
// ============================================================================

/// Errors raised by a server connection.
///
/// Synchronous failures come back from `connect`/`reconnect`; everything
/// else reaches the handler through the connection's event callback.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to resolve {host}: {source}")]
    Dns {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("TLS handshake failed: {0}")]
    Tls(io::Error),

    #[error("TLS context unavailable: {0}")]
    TlsContext(String),

    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    #[error("no data received for {0:?}")]
    Timeout(std::time::Duration),

    #[error("unusable server line: {0}")]
    Line(#[from] LineError),

    #[error("connection has been released")]
    Closed,

    #[error("connection has no live transport")]
    NotConnected,
}

impl ConnectionError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Dns { .. } => "dns",
            Self::Socket(_) => "socket",
            Self::Tls(_) => "tls",
            Self::TlsContext(_) => "tls_context",
            Self::InvalidServerName(_) => "invalid_server_name",
            Self::Timeout(_) => "timeout",
            Self::Line(_) => "line",
            Self::Closed => "closed",
            Self::NotConnected => "not_connected",
        }
    }

    /// Whether this is a name-resolution failure.
    pub fn is_dns(&self) -> bool {
        matches!(self, Self::Dns { .. })
    }
}

// ============================================================================
// Dispatch Errors (event routing)
// ============================================================================

/// Errors while routing events between connections and workers.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed line: {0}")]
    Parse(#[from] ParseError),

    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("no live workers")]
    NoWorkers,

    #[error("every live worker rejected the event ({attempts} attempts)")]
    Undeliverable { attempts: usize },

    #[error("no connection for address {0}")]
    UnknownConnection(String),

    #[error("write to connection failed: {0}")]
    Write(#[from] ConnectionError),
}

impl DispatchError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Frame(_) => "frame",
            Self::NoWorkers => "no_workers",
            Self::Undeliverable { .. } => "undeliverable",
            Self::UnknownConnection(_) => "unknown_connection",
            Self::Write(_) => "write",
        }
    }
}

// ============================================================================
// Worker Errors (IPC channel and process management)
// ============================================================================

/// Failure to queue a frame on a worker channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("worker channel is full")]
    Full,

    #[error("worker channel is closed")]
    Closed,
}

/// Failure to start a worker process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to launch worker: {0}")]
    Io(#[from] io::Error),

    #[error("worker exited before reporting a pid")]
    NoPid,

    #[error("worker stdio was not captured")]
    MissingPipe,
}

/// Supervisor-level failures.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("could not start worker pool: {0}")]
    Bootstrap(#[source] SpawnError),

    #[error("workers ignored shutdown and were killed: {0:?}")]
    Stragglers(Vec<u32>),

    #[error("failed to signal worker {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },
}

impl SupervisorError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Bootstrap(_) => "bootstrap",
            Self::Stragglers(_) => "stragglers",
            Self::Signal { .. } => "signal",
        }
    }
}

// ============================================================================
// Relay Errors (process start-up and main loop)
// ============================================================================

/// Failures that stop the supervisor process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("could not connect to server '{name}': {source}")]
    Server {
        name: String,
        #[source]
        source: ConnectionError,
    },

    #[error("signal handler setup failed: {0}")]
    Signals(#[from] io::Error),
}

impl RelayError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Supervisor(e) => e.error_code(),
            Self::Server { .. } => "server",
            Self::Signals(_) => "signals",
        }
    }
}
