// ABOUTME: SSH transport for running bootstrap commands on deployment targets.
// ABOUTME: One russh session per target; keys come from the agent, a configured file or ~/.ssh.

mod auth;
mod error;
mod host_keys;
mod session;

pub use error::{Error, Result};
pub use host_keys::HostKeyPolicy;
pub use session::{Session, SessionConfig};
