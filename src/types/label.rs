// ABOUTME: Human-readable server label used in results and remote selection.

use std::fmt;

use serde::Serialize;

use super::name::{NameError, check};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(value: &str) -> Result<Self, NameError> {
        check(value, "server label", 64, |c| {
            c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
        })?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
