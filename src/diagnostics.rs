// ABOUTME: Diagnostics accumulator for non-fatal warnings during a command.
// ABOUTME: Collects warnings that shouldn't fail a release but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during stage, release, init, install and rollback.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings of one kind.
    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_artifact(message: impl Into<String>) -> Self {
        Self::new(WarningKind::MissingArtifact, message)
    }

    pub fn target_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::TargetFailed, message)
    }

    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::HookFailed, message)
    }

    pub fn notification_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::NotificationFailed, message)
    }

    pub fn missing_binary(message: impl Into<String>) -> Self {
        Self::new(WarningKind::MissingBinary, message)
    }

    pub fn targets_diverged(message: impl Into<String>) -> Self {
        Self::new(WarningKind::TargetsDiverged, message)
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SshDisconnect, message)
    }
}

/// Categories of warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A configured artifact matched nothing in the source directory.
    MissingArtifact,
    /// A push, rollback push or bootstrap failed on one target while others may succeed.
    TargetFailed,
    /// A non-fatal hook command exited non-zero.
    HookFailed,
    /// The notification sink failed.
    NotificationFailed,
    /// The installer binary is not on the target's PATH.
    MissingBinary,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
    /// Targets run different releases after a rollback of the primary alone.
    TargetsDiverged,
}
