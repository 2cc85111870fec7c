// ABOUTME: Validated git branch name for the deployment branch.
// ABOUTME: A conservative subset of git-check-ref-format that is also shell-safe.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::name::{NameError, check};
use crate::shell::SafeArg;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        const WHAT: &str = "branch name";
        check(value, WHAT, 200, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/')
        })?;
        if value.contains("..") || value.contains("//") {
            return Err(NameError::Invalid {
                what: WHAT,
                reason: "consecutive dots or slashes",
            });
        }
        if value.starts_with('/') || value.ends_with('/') || value.ends_with(".lock") {
            return Err(NameError::Invalid {
                what: WHAT,
                reason: "leading/trailing slash or .lock suffix",
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified ref, e.g. `refs/heads/master`.
    pub fn full_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl Default for BranchName {
    fn default() -> Self {
        Self("master".to_string())
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<BranchName> for String {
    fn from(value: BranchName) -> Self {
        value.0
    }
}

impl crate::shell::sealed::Sealed for BranchName {}

impl SafeArg for BranchName {
    fn as_arg(&self) -> &str {
        &self.0
    }
}
