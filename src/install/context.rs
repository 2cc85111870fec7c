// ABOUTME: Install context read from the post-receive hook environment or CLI flags.
// ABOUTME: Also parses the `old new ref` lines git feeds the hook on stdin.

use crate::bootstrap::{ENV_BRANCH, ENV_GIT_DIR, ENV_PROCESS_USER, ENV_TARGET_DIR};
use crate::types::{AccountName, BranchName, CommitHash, RemotePath, ServiceName};

use super::error::InstallError;

/// Where and what the installer deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallContext {
    /// Work tree the release is checked out into.
    pub target_dir: RemotePath,
    /// Bare repository that received the push.
    pub git_dir: RemotePath,
    pub service: ServiceName,
    pub branch: BranchName,
    pub process_user: Option<AccountName>,
}

/// Values given on the command line; each wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct InstallOverrides {
    pub target_dir: Option<String>,
    pub git_dir: Option<String>,
    pub branch: Option<String>,
}

fn lookup(variable: &'static str, value: Option<String>) -> Option<String> {
    value.or_else(|| std::env::var(variable).ok().filter(|v| !v.is_empty()))
}

fn required(variable: &'static str, value: Option<String>) -> Result<String, InstallError> {
    lookup(variable, value).ok_or(InstallError::MissingContext { variable })
}

fn invalid(variable: &'static str) -> impl FnOnce(String) -> InstallError {
    move |reason| InstallError::InvalidContext { variable, reason }
}

impl InstallContext {
    /// Build the context from `PUSHDEPLOY_*` variables, with CLI overrides taking precedence.
    pub fn from_env(service: ServiceName, overrides: InstallOverrides) -> Result<Self, InstallError> {
        let target_dir = required(ENV_TARGET_DIR, overrides.target_dir)?;
        let target_dir =
            RemotePath::new(&target_dir).map_err(|e| invalid(ENV_TARGET_DIR)(e.to_string()))?;

        let git_dir = required(ENV_GIT_DIR, overrides.git_dir)?;
        let git_dir = RemotePath::new(&git_dir).map_err(|e| invalid(ENV_GIT_DIR)(e.to_string()))?;

        let branch = match lookup(ENV_BRANCH, overrides.branch) {
            Some(branch) => {
                BranchName::new(&branch).map_err(|e| invalid(ENV_BRANCH)(e.to_string()))?
            }
            None => BranchName::default(),
        };

        let process_user = lookup(ENV_PROCESS_USER, None)
            .map(|user| AccountName::new(&user))
            .transpose()
            .map_err(|e| invalid(ENV_PROCESS_USER)(e.to_string()))?;

        Ok(Self {
            target_dir,
            git_dir,
            service,
            branch,
            process_user,
        })
    }
}

/// One line of post-receive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: CommitHash,
    pub new: CommitHash,
    pub refname: String,
}

impl RefUpdate {
    /// Parse `<old> <new> <ref>` lines, skipping anything malformed.
    pub fn parse_lines(input: &str) -> Vec<RefUpdate> {
        input
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let parsed = Self::parse_line(line);
                if parsed.is_none() {
                    tracing::warn!("ignoring malformed ref update line: {:?}", line);
                }
                parsed
            })
            .collect()
    }

    fn parse_line(line: &str) -> Option<RefUpdate> {
        let mut parts = line.split_whitespace();
        let old = CommitHash::new(parts.next()?).ok()?;
        let new = CommitHash::new(parts.next()?).ok()?;
        let refname = parts.next()?.to_string();
        if parts.next().is_some() {
            return None;
        }
        Some(RefUpdate { old, new, refname })
    }

    pub fn is_deletion(&self) -> bool {
        self.new.is_zero()
    }
}

/// The update to deploy: the push to `branch`, unless it deletes the branch.
pub fn select_deploy_update<'a>(
    updates: &'a [RefUpdate],
    branch: &BranchName,
) -> Option<&'a RefUpdate> {
    let wanted = branch.full_ref();
    updates
        .iter()
        .filter(|update| update.refname == wanted)
        .find(|update| !update.is_deletion())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD: &str = "1111111111111111111111111111111111111111";
    const NEW: &str = "2222222222222222222222222222222222222222";
    const ZERO: &str = "0000000000000000000000000000000000000000";

    #[test]
    fn parses_update_lines() {
        let input = format!("{OLD} {NEW} refs/heads/master\n\nnot a line\n");
        let updates = RefUpdate::parse_lines(&input);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].new.as_str(), NEW);
        assert_eq!(updates[0].refname, "refs/heads/master");
    }

    #[test]
    fn selects_configured_branch_only() {
        let input = format!("{OLD} {NEW} refs/heads/feature\n{OLD} {NEW} refs/heads/main\n");
        let updates = RefUpdate::parse_lines(&input);
        let main = BranchName::new("main").unwrap();
        let selected = select_deploy_update(&updates, &main).unwrap();
        assert_eq!(selected.refname, "refs/heads/main");

        let other = BranchName::new("release").unwrap();
        assert!(select_deploy_update(&updates, &other).is_none());
    }

    #[test]
    fn ignores_branch_deletion() {
        let input = format!("{OLD} {ZERO} refs/heads/master\n");
        let updates = RefUpdate::parse_lines(&input);
        assert!(updates[0].is_deletion());
        assert!(select_deploy_update(&updates, &BranchName::default()).is_none());
    }

    #[test]
    fn overrides_win_over_environment() {
        temp_env::with_vars(
            [
                (ENV_TARGET_DIR, Some("/srv/apps/api")),
                (ENV_GIT_DIR, Some("/srv/git/api.git")),
                (ENV_BRANCH, Some("main")),
                (ENV_PROCESS_USER, None),
            ],
            || {
                let context = InstallContext::from_env(
                    ServiceName::new("api").unwrap(),
                    InstallOverrides {
                        target_dir: Some("/srv/other".to_string()),
                        ..Default::default()
                    },
                )
                .unwrap();
                assert_eq!(context.target_dir.as_str(), "/srv/other");
                assert_eq!(context.git_dir.as_str(), "/srv/git/api.git");
                assert_eq!(context.branch.as_str(), "main");
                assert!(context.process_user.is_none());
            },
        );
    }

    #[test]
    fn missing_git_dir_is_reported() {
        temp_env::with_vars(
            [
                (ENV_TARGET_DIR, Some("/srv/apps/api")),
                (ENV_GIT_DIR, None::<&str>),
            ],
            || {
                let err = InstallContext::from_env(
                    ServiceName::new("api").unwrap(),
                    InstallOverrides::default(),
                )
                .unwrap_err();
                assert!(matches!(
                    err,
                    InstallError::MissingContext {
                        variable: ENV_GIT_DIR
                    }
                ));
            },
        );
    }
}
