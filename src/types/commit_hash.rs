// ABOUTME: Hex commit identifier as printed by git.
// ABOUTME: Accepts abbreviated and full SHA-1/SHA-256 object names.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::name::NameError;
use crate::shell::SafeArg;

const SHORT_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(value: &str) -> Result<Self, NameError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(NameError::Empty { what: "commit hash" });
        }
        if value.len() < 4 || value.len() > 64 {
            return Err(NameError::Invalid {
                what: "commit hash",
                reason: "must be 4 to 64 hex characters",
            });
        }
        if let Some(found) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(NameError::InvalidChar {
                what: "commit hash",
                found,
            });
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(SHORT_LEN)]
    }

    /// True for git's all-zero object name, used for ref creation and deletion.
    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CommitHash> for String {
    fn from(value: CommitHash) -> Self {
        value.0
    }
}

impl crate::shell::sealed::Sealed for CommitHash {}

impl SafeArg for CommitHash {
    fn as_arg(&self) -> &str {
        &self.0
    }
}
