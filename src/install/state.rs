// ABOUTME: Installation state marker types for the type state pattern.
// ABOUTME: States carry what the next step needs, so steps cannot run out of order.

use crate::manifest::ReleaseManifest;
use crate::process::RestartAction;

/// Push received, nothing touched yet.
/// Available actions: `checkout()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Received;

/// Release tree checked out; its manifest is now authoritative.
/// Available actions: `write_environment()`
#[derive(Debug, Clone)]
pub struct CheckedOut {
    pub(crate) manifest: ReleaseManifest,
}

/// Environment file written.
/// Available actions: `install_dependencies()`
#[derive(Debug, Clone)]
pub struct EnvironmentReady {
    pub(crate) manifest: ReleaseManifest,
}

/// Dependencies installed.
/// Available actions: `run_post_install()`, `restart()`
#[derive(Debug, Clone)]
pub struct DependenciesInstalled {
    pub(crate) manifest: ReleaseManifest,
}

/// Process restarted through its manager.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy)]
pub struct Restarted {
    pub(crate) action: RestartAction,
}
