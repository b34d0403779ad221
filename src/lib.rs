//! slirc-relay library: connection, dispatch and worker machinery.
//!
//! The `slirc-relay` binary is a thin wrapper. Custom event handlers build
//! on [`dispatch::EventHandler`], [`dispatch::Event`] and [`dispatch::Outbox`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod relay;
pub mod worker;
