// ABOUTME: Library root for pushdeploy - exposes the release pipeline for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod bootstrap;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod git;
pub mod hooks;
pub mod install;
pub mod lock;
pub mod manifest;
pub mod notify;
pub mod output;
pub mod process;
pub mod release;
pub mod rollback;
pub mod shell;
pub mod ssh;
pub mod stage;
pub mod types;
