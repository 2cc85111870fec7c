// ABOUTME: Validated POSIX user or group name.
// ABOUTME: Follows the portable useradd(8) pattern [a-z_][a-z0-9_-]*.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::name::{NameError, check};
use crate::shell::SafeArg;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        check(value, "account name", 32, |c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
        })?;
        if let Some(found) = value.chars().next().filter(|c| c.is_ascii_digit()) {
            return Err(NameError::InvalidStart {
                what: "account name",
                found,
            });
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AccountName> for String {
    fn from(value: AccountName) -> Self {
        value.0
    }
}

impl crate::shell::sealed::Sealed for AccountName {}

impl SafeArg for AccountName {
    fn as_arg(&self) -> &str {
        &self.0
    }
}
