// ABOUTME: Validated remote host name (DNS name or IPv4 literal).
// ABOUTME: Restricted to characters that never need shell quoting.

use std::fmt;

use super::name::{NameError, check};
use crate::shell::SafeArg;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostName(String);

impl HostName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        check(value, "host name", 253, |c| {
            c.is_ascii_alphanumeric() || c == '.' || c == '-'
        })?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl crate::shell::sealed::Sealed for HostName {}

impl SafeArg for HostName {
    fn as_arg(&self) -> &str {
        &self.0
    }
}
