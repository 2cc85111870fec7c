// ABOUTME: Typed shell command construction and the command-runner capability.
// ABOUTME: Remote commands are only ever assembled from validated, quoted arguments.

mod command;
mod runner;
pub(crate) mod sealed;

pub use command::{SafeArg, ShellCommand, quote};
pub use runner::{CommandOutput, CommandRunner, ExecError, LocalRunner};
