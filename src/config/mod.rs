//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and the [`ServerSource`] collaborator
//! - [`validation`]: start-up checks that collect every problem at once
//! - `defaults`: serde default functions

mod defaults;
mod types;
mod validation;

pub use types::{Config, ServerConfig, ServerSource};
pub use validation::validate;
