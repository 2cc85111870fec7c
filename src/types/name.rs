// ABOUTME: Shared validation error and character checks for identifier-like types.
// ABOUTME: Used by host, account, label, branch and process names.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("{what} cannot be empty")]
    Empty { what: &'static str },

    #[error("{what} exceeds maximum length of {max} characters")]
    TooLong { what: &'static str, max: usize },

    #[error("{what} cannot start with '{found}'")]
    InvalidStart { what: &'static str, found: char },

    #[error("invalid character in {what}: '{found}'")]
    InvalidChar { what: &'static str, found: char },

    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: &'static str },
}

/// Check emptiness, length and the allowed character set in one pass.
pub(super) fn check(
    value: &str,
    what: &'static str,
    max: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty { what });
    }
    if value.len() > max {
        return Err(NameError::TooLong { what, max });
    }
    if let Some(found) = value.chars().find(|c| !allowed(*c)) {
        return Err(NameError::InvalidChar { what, found });
    }
    if let Some(found) = value.chars().next().filter(|c| *c == '-') {
        return Err(NameError::InvalidStart { what, found });
    }
    Ok(())
}
