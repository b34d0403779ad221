//! Integration test common infrastructure.
//!
//! Runs the real `slirc-relay` binary against in-process fake IRC servers.

pub mod ircd;
pub mod relay;

#[allow(unused_imports)]
pub use ircd::{FakeIrcd, ServerSide};
#[allow(unused_imports)]
pub use relay::TestRelay;
