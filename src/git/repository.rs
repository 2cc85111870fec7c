// ABOUTME: The local deploy repository: a git working copy whose commit log is the release history.
// ABOUTME: Wraps the git binary through tokio::process with argv, never a shell.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use snafu::ResultExt;
use tokio::process::Command;

use super::error::{
    CommandSnafu, GitError, PrepareSnafu, SpawnSnafu, UnexpectedOutputSnafu, UnknownRevisionSnafu,
};
use crate::types::{BranchName, CommitHash};

/// Identity recorded on release commits.
pub const COMMITTER_NAME: &str = "pushdeploy";

/// One entry of the release history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub hash: CommitHash,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct GitOutput {
    code: i32,
    stdout: String,
    stderr: String,
}

/// How a push treats a target branch that does not fast-forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMode {
    /// Plain push; the target rejects non-fast-forward updates.
    FastForward,
    /// Overwrite the target branch unconditionally.
    Force,
    /// Overwrite the target branch only while it still points at this commit.
    Lease(CommitHash),
}

#[derive(Debug, Clone)]
pub struct DeployRepository {
    path: PathBuf,
    connect_timeout: Duration,
}

impl DeployRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Bound for establishing SSH connections during pushes.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the working copy has been initialized.
    pub fn exists(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Path of a file inside the `.git` directory.
    pub fn git_dir_path(&self, name: &str) -> PathBuf {
        self.path.join(".git").join(name)
    }

    fn ssh_command(&self) -> String {
        format!(
            "ssh -o BatchMode=yes -o ConnectTimeout={}",
            self.connect_timeout.as_secs().max(1)
        )
    }

    async fn exec(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        tracing::debug!("git {} (in {})", args.join(" "), self.path.display());
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .env("GIT_SSH_COMMAND", self.ssh_command())
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .stdin(Stdio::null())
            .output()
            .await
            .context(SpawnSnafu {
                args: args.join(" "),
            })?;

        Ok(GitOutput {
            code: output.status.code().unwrap_or(128),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run git and return stdout, failing on a non-zero exit.
    async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.exec(args).await?;
        if output.code == 0 {
            return Ok(output.stdout);
        }
        // Some porcelain (commit) reports failures on stdout.
        let message = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        CommandSnafu {
            args: args.join(" "),
            code: output.code,
            stderr: message,
        }
        .fail()
    }

    /// Create the working copy with HEAD on `branch` and a local committer identity.
    pub async fn init(&self, branch: &BranchName) -> Result<(), GitError> {
        std::fs::create_dir_all(&self.path).context(PrepareSnafu {
            path: self.path.display().to_string(),
        })?;

        self.git(&["init", "--quiet"]).await?;
        let head = branch.full_ref();
        self.git(&["symbolic-ref", "HEAD", &head]).await?;
        self.git(&["config", "user.name", COMMITTER_NAME]).await?;
        let email = format!(
            "{}@{}",
            COMMITTER_NAME,
            gethostname::gethostname().to_string_lossy()
        );
        self.git(&["config", "user.email", &email]).await?;

        tracing::info!("initialized deploy repository at {}", self.path.display());
        Ok(())
    }

    /// Configured remotes and their fetch URLs.
    pub async fn remotes(&self) -> Result<BTreeMap<String, String>, GitError> {
        let output = self
            .exec(&["config", "--get-regexp", r"^remote\..*\.url$"])
            .await?;
        // Exit 1 means no matching keys.
        if output.code == 1 {
            return Ok(BTreeMap::new());
        }
        if output.code != 0 {
            return CommandSnafu {
                args: "config --get-regexp remote urls".to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            }
            .fail();
        }

        let mut remotes = BTreeMap::new();
        for line in output.stdout.lines() {
            let Some((key, url)) = line.split_once(' ') else {
                continue;
            };
            if let Some(name) = key
                .strip_prefix("remote.")
                .and_then(|k| k.strip_suffix(".url"))
            {
                remotes.insert(name.to_string(), url.to_string());
            }
        }
        Ok(remotes)
    }

    /// Add or re-point remotes so they match `desired` (name, url).
    pub async fn sync_remotes(&self, desired: &[(String, String)]) -> Result<(), GitError> {
        let current = self.remotes().await?;
        for (name, url) in desired {
            match current.get(name) {
                Some(existing) if existing == url => {}
                Some(_) => {
                    tracing::debug!("updating remote {} -> {}", name, url);
                    self.git(&["remote", "set-url", name, url]).await?;
                }
                None => {
                    tracing::debug!("adding remote {} -> {}", name, url);
                    self.git(&["remote", "add", name, url]).await?;
                }
            }
        }
        Ok(())
    }

    /// Stage every change in the working copy, deletions included.
    pub async fn add_all(&self) -> Result<(), GitError> {
        self.git(&["add", "-A"]).await.map(|_| ())
    }

    /// Current HEAD commit, or None before the first commit.
    pub async fn head(&self) -> Result<Option<CommitHash>, GitError> {
        let output = self.exec(&["rev-parse", "--verify", "--quiet", "HEAD"]).await?;
        if output.code != 0 {
            return Ok(None);
        }
        parse_hash("rev-parse HEAD", &output.stdout).map(Some)
    }

    /// Resolve any revision expression to a commit.
    pub async fn resolve(&self, rev: &str) -> Result<CommitHash, GitError> {
        if rev.starts_with('-') || rev.is_empty() {
            return UnknownRevisionSnafu { rev }.fail();
        }
        let spec = format!("{}^{{commit}}", rev);
        let output = self.exec(&["rev-parse", "--verify", "--quiet", &spec]).await?;
        if output.code != 0 {
            return UnknownRevisionSnafu { rev }.fail();
        }
        parse_hash("rev-parse", &output.stdout)
    }

    /// Whether the index differs from HEAD (or holds anything before the first commit).
    pub async fn has_staged_changes(&self) -> Result<bool, GitError> {
        if self.head().await?.is_none() {
            let files = self.git(&["ls-files"]).await?;
            return Ok(!files.trim().is_empty());
        }
        let output = self.exec(&["diff", "--cached", "--quiet"]).await?;
        match output.code {
            0 => Ok(false),
            1 => Ok(true),
            code => CommandSnafu {
                args: "diff --cached --quiet".to_string(),
                code,
                stderr: output.stderr.trim().to_string(),
            }
            .fail(),
        }
    }

    /// `git status --porcelain` entries, staged or not.
    pub async fn pending_changes(&self) -> Result<Vec<String>, GitError> {
        let stdout = self.git(&["status", "--porcelain", "--untracked-files=all"]).await?;
        Ok(stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.to_string())
            .collect())
    }

    /// Record the index as a new commit and return its hash.
    pub async fn commit(&self, message: &str) -> Result<CommitHash, GitError> {
        self.git(&["-c", "commit.gpgsign=false", "commit", "--quiet", "-m", message])
            .await?;
        match self.head().await? {
            Some(hash) => Ok(hash),
            None => UnexpectedOutputSnafu {
                args: "commit",
                output: "HEAD missing after commit",
            }
            .fail(),
        }
    }

    /// Push HEAD to `refs/heads/<branch>` on `remote`.
    pub async fn push(&self, remote: &str, branch: &BranchName, mode: &PushMode) -> Result<(), GitError> {
        let refspec = format!("HEAD:{}", branch.full_ref());
        let lease;
        let mut args = vec!["push", "--porcelain"];
        match mode {
            PushMode::FastForward => {}
            PushMode::Force => args.push("--force"),
            PushMode::Lease(expected) => {
                lease = format!("--force-with-lease={}:{}", branch.full_ref(), expected);
                args.push(lease.as_str());
            }
        }
        args.extend([remote, refspec.as_str()]);
        self.git(&args).await.map(|_| ())
    }

    /// Where `remote` last had `branch`, as recorded by the previous push or fetch.
    pub async fn tracking_head(
        &self,
        remote: &str,
        branch: &BranchName,
    ) -> Result<Option<CommitHash>, GitError> {
        let tracking = format!("refs/remotes/{}/{}^{{commit}}", remote, branch);
        let output = self.exec(&["rev-parse", "--verify", "--quiet", &tracking]).await?;
        if output.code != 0 {
            return Ok(None);
        }
        parse_hash("rev-parse", &output.stdout).map(Some)
    }

    /// Record that `remote` now has `branch` at `commit`.
    pub async fn set_tracking_head(
        &self,
        remote: &str,
        branch: &BranchName,
        commit: &CommitHash,
    ) -> Result<(), GitError> {
        let tracking = format!("refs/remotes/{}/{}", remote, branch);
        self.git(&["update-ref", &tracking, commit.as_str()])
            .await
            .map(|_| ())
    }

    /// Whether `ancestor` is reachable from `descendant`.
    pub async fn is_ancestor(
        &self,
        ancestor: &CommitHash,
        descendant: &CommitHash,
    ) -> Result<bool, GitError> {
        let args = ["merge-base", "--is-ancestor", ancestor.as_str(), descendant.as_str()];
        let output = self.exec(&args).await?;
        match output.code {
            0 => Ok(true),
            1 => Ok(false),
            code => CommandSnafu {
                args: args.join(" "),
                code,
                stderr: output.stderr.trim().to_string(),
            }
            .fail(),
        }
    }

    /// Move HEAD, index and working tree to `target`.
    pub async fn reset_hard(&self, target: &CommitHash) -> Result<(), GitError> {
        self.git(&["reset", "--hard", "--quiet", target.as_str()])
            .await
            .map(|_| ())
    }

    /// The newest `limit` commits reachable from HEAD.
    pub async fn log(&self, limit: usize) -> Result<Vec<LogEntry>, GitError> {
        if self.head().await?.is_none() {
            return Ok(Vec::new());
        }
        let count = format!("--max-count={}", limit);
        let stdout = self
            .git(&["log", &count, "--format=%H%x1f%cI%x1f%s%x1f%D"])
            .await?;
        stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(parse_log_line)
            .collect()
    }

    /// Number of commits reachable from HEAD.
    pub async fn commit_count(&self) -> Result<usize, GitError> {
        if self.head().await?.is_none() {
            return Ok(0);
        }
        let stdout = self.git(&["rev-list", "--count", "HEAD"]).await?;
        stdout
            .trim()
            .parse()
            .map_err(|_| GitError::UnexpectedOutput {
                args: "rev-list --count HEAD".to_string(),
                output: stdout.trim().to_string(),
            })
    }
}

fn parse_hash(args: &str, stdout: &str) -> Result<CommitHash, GitError> {
    CommitHash::new(stdout.trim()).map_err(|_| GitError::UnexpectedOutput {
        args: args.to_string(),
        output: stdout.trim().to_string(),
    })
}

fn parse_log_line(line: &str) -> Result<LogEntry, GitError> {
    let unexpected = || GitError::UnexpectedOutput {
        args: "log".to_string(),
        output: line.to_string(),
    };

    let mut fields = line.split('\x1f');
    let hash = fields.next().ok_or_else(unexpected)?;
    let date = fields.next().ok_or_else(unexpected)?;
    let subject = fields.next().ok_or_else(unexpected)?;
    let decorations = fields.next().unwrap_or("");

    let hash = CommitHash::new(hash).map_err(|_| unexpected())?;
    let date = DateTime::parse_from_rfc3339(date)
        .map_err(|_| unexpected())?
        .with_timezone(&Utc);
    let tags = decorations
        .split(", ")
        .filter_map(|d| d.strip_prefix("tag: "))
        .map(|t| t.to_string())
        .collect();

    Ok(LogEntry {
        hash,
        date,
        subject: subject.to_string(),
        tags,
    })
}
