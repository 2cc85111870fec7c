// ABOUTME: Shell-safe absolute remote paths and relative payload paths.
// ABOUTME: Validation is the trust boundary for every path placed in a remote command.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shell::SafeArg;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path cannot be empty")]
    Empty,

    #[error("path must be absolute: {0}")]
    NotAbsolute(String),

    #[error("path must be relative: {0}")]
    NotRelative(String),

    #[error("path cannot refer to the filesystem root")]
    Root,

    #[error("path cannot contain '..' segments: {0}")]
    ParentSegment(String),

    #[error("invalid character in path {path}: '{found}'")]
    InvalidChar { path: String, found: char },
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/')
}

fn check_segments(value: &str) -> Result<(), PathError> {
    if let Some(found) = value.chars().find(|c| !is_path_char(*c)) {
        return Err(PathError::InvalidChar {
            path: value.to_string(),
            found,
        });
    }
    if value.split('/').any(|segment| segment == "..") {
        return Err(PathError::ParentSegment(value.to_string()));
    }
    if value.split('/').any(|segment| segment.starts_with('-')) {
        return Err(PathError::InvalidChar {
            path: value.to_string(),
            found: '-',
        });
    }
    Ok(())
}

/// Absolute path on a deployment target (bare repository, working directory).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(value: &str) -> Result<Self, PathError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PathError::Empty);
        }
        if !value.starts_with('/') {
            return Err(PathError::NotAbsolute(value.to_string()));
        }
        check_segments(value)?;

        let normalized = value.trim_end_matches('/');
        if normalized.is_empty() {
            return Err(PathError::Root);
        }
        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Append a relative payload path.
    pub fn join(&self, relative: &RelativePath) -> RemotePath {
        RemotePath(format!("{}/{}", self.0, relative.as_str()))
    }

    /// Append a fixed, crate-internal path component such as `hooks/post-receive`.
    pub(crate) fn child(&self, name: &'static str) -> RemotePath {
        debug_assert!(name.chars().all(is_path_char) && !name.contains(".."));
        RemotePath(format!("{}/{}", self.0, name))
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RemotePath> for String {
    fn from(value: RemotePath) -> Self {
        value.0
    }
}

impl crate::shell::sealed::Sealed for RemotePath {}

impl SafeArg for RemotePath {
    fn as_arg(&self) -> &str {
        &self.0
    }
}

/// Relative path inside the deploy payload (e.g. a monorepo sub-package).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    pub fn new(value: &str) -> Result<Self, PathError> {
        let value = value.trim().trim_start_matches("./").trim_end_matches('/');
        if value.is_empty() || value == "." {
            return Err(PathError::Empty);
        }
        if value.starts_with('/') {
            return Err(PathError::NotRelative(value.to_string()));
        }
        check_segments(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}

impl crate::shell::sealed::Sealed for RelativePath {}

impl SafeArg for RelativePath {
    fn as_arg(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let path = RemotePath::new("/srv/git/app.git/").unwrap();
        assert_eq!(path.as_str(), "/srv/git/app.git");
    }

    #[test]
    fn root_is_rejected() {
        assert_eq!(RemotePath::new("/"), Err(PathError::Root));
    }

    #[test]
    fn relative_rejects_parent_and_absolute() {
        assert!(RelativePath::new("../etc").is_err());
        assert!(RelativePath::new("/etc").is_err());
        assert_eq!(RelativePath::new("./packages/api/").unwrap().as_str(), "packages/api");
    }

    #[test]
    fn join_appends_relative() {
        let base = RemotePath::new("/srv/app").unwrap();
        let sub = RelativePath::new("packages/api").unwrap();
        assert_eq!(base.join(&sub).as_str(), "/srv/app/packages/api");
        assert_eq!(base.child("hooks/post-receive").as_str(), "/srv/app/hooks/post-receive");
    }
}
