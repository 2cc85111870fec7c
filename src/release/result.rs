// ABOUTME: DeploymentResult, the per-operation summary printed, serialized and sent to sinks.
// ABOUTME: ExitPolicy decides when partial multi-target failure fails the command.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{CommitHash, Label, ServiceName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Release,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFailure {
    pub label: Label,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResult {
    pub service_id: ServiceName,
    pub operation: Operation,
    pub targets_attempted: usize,
    pub targets_succeeded: usize,
    pub targets_failed: Vec<TargetFailure>,
    pub commit_hash: Option<CommitHash>,
    pub timestamp_utc: DateTime<Utc>,
    pub duration_seconds: f64,
    pub no_changes: bool,
}

impl DeploymentResult {
    pub fn new(service_id: ServiceName, operation: Operation) -> Self {
        Self {
            service_id,
            operation,
            targets_attempted: 0,
            targets_succeeded: 0,
            targets_failed: Vec::new(),
            commit_hash: None,
            timestamp_utc: Utc::now(),
            duration_seconds: 0.0,
            no_changes: false,
        }
    }

    /// Record one target's push outcome.
    pub fn record(&mut self, label: &Label, outcome: Result<(), String>) {
        self.targets_attempted += 1;
        match outcome {
            Ok(()) => self.targets_succeeded += 1,
            Err(error) => self.targets_failed.push(TargetFailure {
                label: label.clone(),
                error,
            }),
        }
    }

    pub fn all_failed(&self) -> bool {
        self.targets_attempted > 0 && self.targets_succeeded == 0
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let verb = match self.operation {
            Operation::Release => "Released",
            Operation::Rollback => "Rolled back to",
        };
        if self.no_changes {
            return "No changes to release.".to_string();
        }
        let commit = self
            .commit_hash
            .as_ref()
            .map(|c| c.short().to_string())
            .unwrap_or_else(|| "(no commit)".to_string());
        if self.targets_attempted == 0 {
            return format!("{} {} (not pushed)", verb, commit);
        }
        format!(
            "{} {} to {}/{} target(s)",
            verb, commit, self.targets_succeeded, self.targets_attempted
        )
    }
}

/// When a multi-target operation counts as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Fail only when every attempted target failed.
    AllTargetsFailed,
    /// Fail when any attempted target failed.
    AnyTargetFailed,
}

/// The exit-status policy applied by release, rollback and init.
pub const EXIT_POLICY: ExitPolicy = ExitPolicy::AllTargetsFailed;

impl ExitPolicy {
    pub fn is_failure(&self, result: &DeploymentResult) -> bool {
        if result.targets_attempted == 0 {
            return false;
        }
        match self {
            ExitPolicy::AllTargetsFailed => result.targets_succeeded == 0,
            ExitPolicy::AnyTargetFailed => !result.targets_failed.is_empty(),
        }
    }
}
