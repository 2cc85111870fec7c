// ABOUTME: Artifact patterns: relative paths whose last segment may use * and ? wildcards.
// ABOUTME: Expansion against the source tree yields the concrete paths to stage.

use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
    raw: String,
    parent: PathBuf,
    leaf: String,
}

impl ArtifactPattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim().trim_start_matches("./").trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return Err("artifact path cannot be empty".to_string());
        }

        let path = Path::new(trimmed);
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => {
                    return Err(format!("artifact path cannot contain '..': {}", raw));
                }
                _ => return Err(format!("artifact path must be relative: {}", raw)),
            }
        }

        let (parent, leaf) = match trimmed.rsplit_once('/') {
            Some((parent, leaf)) => (PathBuf::from(parent), leaf.to_string()),
            None => (PathBuf::new(), trimmed.to_string()),
        };

        if parent.to_string_lossy().contains(['*', '?']) {
            return Err(format!(
                "wildcards are only supported in the last path segment: {}",
                raw
            ));
        }
        if leaf == ".git" || parent.components().any(|c| c.as_os_str() == ".git") {
            return Err(format!("artifact path cannot reference .git: {}", raw));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            parent,
            leaf,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_wildcards(&self) -> bool {
        self.leaf.contains(['*', '?'])
    }

    /// Relative paths under `source_dir` matched by this pattern, sorted.
    pub fn expand(&self, source_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        if !self.has_wildcards() {
            let relative = self.parent.join(&self.leaf);
            let exists = source_dir.join(&relative).symlink_metadata().is_ok();
            return Ok(if exists { vec![relative] } else { Vec::new() });
        }

        let dir = source_dir.join(&self.parent);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name != ".git" && wildcard_match(&self.leaf, &name) {
                matches.push(self.parent.join(name.as_ref()));
            }
        }
        matches.sort();
        Ok(matches)
    }
}

impl fmt::Display for ArtifactPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Match `name` against a pattern where `*` is any run and `?` any single char.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((star_pi, star_ni)) = star {
            pi = star_pi + 1;
            ni = star_ni + 1;
            star = Some((star_pi, star_ni + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}
