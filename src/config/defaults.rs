//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Worker Pool Defaults
// =============================================================================

pub fn default_worker_count() -> usize {
    4
}

pub fn default_shutdown_grace_secs() -> u64 {
    5
}

pub fn default_channel_capacity() -> usize {
    1024
}

// =============================================================================
// Connection Defaults
// =============================================================================

pub fn default_read_timeout_secs() -> u64 {
    300
}

pub fn default_reconnect_delay_secs() -> u64 {
    5
}

pub fn default_port() -> u16 {
    6667
}

// =============================================================================
// Identity Defaults
// =============================================================================

pub fn default_nick() -> String {
    "slirc".to_string()
}

pub fn default_username() -> String {
    "slirc".to_string()
}

pub fn default_realname() -> String {
    "slirc relay".to_string()
}
