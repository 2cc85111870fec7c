// ABOUTME: Identifier handed to the process manager (pm2 app, systemd unit, daemon name).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::name::{NameError, check};
use crate::shell::SafeArg;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessName(String);

impl ProcessName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        check(value, "process name", 128, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@')
        })?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProcessName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ProcessName> for String {
    fn from(value: ProcessName) -> Self {
        value.0
    }
}

impl crate::shell::sealed::Sealed for ProcessName {}

impl SafeArg for ProcessName {
    fn as_arg(&self) -> &str {
        &self.0
    }
}
