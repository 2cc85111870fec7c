// ABOUTME: Renders the post-receive hook that hands pushed refs to the server-side installer.
// ABOUTME: Every interpolated value is quoted; the script is rewritten on each init.

use crate::config::ServerTarget;
use crate::shell::quote;
use crate::types::{BranchName, ServiceName};

pub const HOOK_NAME: &str = "post-receive";

/// Environment variable the installer context is read from.
pub const ENV_TARGET_DIR: &str = "PUSHDEPLOY_TARGET_DIR";
pub const ENV_GIT_DIR: &str = "PUSHDEPLOY_GIT_DIR";
pub const ENV_SERVICE: &str = "PUSHDEPLOY_SERVICE";
pub const ENV_BRANCH: &str = "PUSHDEPLOY_BRANCH";
pub const ENV_PROCESS_USER: &str = "PUSHDEPLOY_PROCESS_USER";

/// The post-receive hook for `target`.
pub fn hook_script(service: &ServiceName, target: &ServerTarget, branch: &BranchName) -> String {
    let mut script = String::from("#!/bin/sh\n# Managed by pushdeploy init. Local edits are overwritten.\n");

    let mut export = |name: &str, value: &str| {
        script.push_str(&format!("export {}={}\n", name, quote(value)));
    };
    export(ENV_TARGET_DIR, target.work_dir.as_str());
    export(ENV_GIT_DIR, target.bare_repo.as_str());
    export(ENV_SERVICE, service.as_str());
    export(ENV_BRANCH, branch.as_str());
    if let Some(user) = &target.process_user {
        export(ENV_PROCESS_USER, user.as_str());
    }

    script.push_str("unset GIT_DIR\n");
    script.push_str(&format!(
        "exec \"${{PUSHDEPLOY_BIN:-pushdeploy}}\" install \"${}\"\n",
        ENV_SERVICE
    ));
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Transport;
    use crate::types::{AccountName, HostName, Label, RemotePath};

    fn target(process_user: Option<&str>) -> ServerTarget {
        ServerTarget {
            host: HostName::new("web1").unwrap(),
            port: 22,
            user: None,
            transport: Transport::Ssh,
            bare_repo: RemotePath::new("/srv/git/api.git").unwrap(),
            work_dir: RemotePath::new("/srv/apps/api").unwrap(),
            owner: None,
            group: None,
            label: Label::new("web1").unwrap(),
            process_user: process_user.map(|u| AccountName::new(u).unwrap()),
            trust_first_connection: false,
            key_path: None,
        }
    }

    #[test]
    fn exports_context_and_execs_installer() {
        let script = hook_script(
            &ServiceName::new("api").unwrap(),
            &target(None),
            &BranchName::new("main").unwrap(),
        );

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("export PUSHDEPLOY_TARGET_DIR=/srv/apps/api\n"));
        assert!(script.contains("export PUSHDEPLOY_GIT_DIR=/srv/git/api.git\n"));
        assert!(script.contains("export PUSHDEPLOY_SERVICE=api\n"));
        assert!(script.contains("export PUSHDEPLOY_BRANCH=main\n"));
        assert!(!script.contains("PUSHDEPLOY_PROCESS_USER"));
        assert!(script.contains("unset GIT_DIR\n"));
        assert!(script.ends_with(
            "exec \"${PUSHDEPLOY_BIN:-pushdeploy}\" install \"$PUSHDEPLOY_SERVICE\"\n"
        ));
    }

    #[test]
    fn exports_process_user_when_set() {
        let script = hook_script(
            &ServiceName::new("api").unwrap(),
            &target(Some("www-data")),
            &BranchName::default(),
        );
        assert!(script.contains("export PUSHDEPLOY_PROCESS_USER=www-data\n"));
    }
}
