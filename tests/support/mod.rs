// ABOUTME: Test support utilities.
// ABOUTME: Recording command runner, scratch git repositories and local-transport service configs.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use pushdeploy::config::{Config, ServiceConfig};
use pushdeploy::shell::{CommandOutput, CommandRunner, ExecError, ShellCommand};
use pushdeploy::types::RemotePath;
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("pushdeploy=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A CommandRunner that records rendered commands and answers from canned responses.
///
/// Commands without a matching response succeed with empty output.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    files: Mutex<Vec<(String, String, u32)>>,
    responses: Vec<(String, u32, String)>,
}

#[allow(dead_code)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose rendering contains `needle` with `exit_code` and `stdout`.
    pub fn respond(mut self, needle: &str, exit_code: u32, stdout: &str) -> Self {
        self.responses
            .push((needle.to_string(), exit_code, stdout.to_string()));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn files(&self) -> Vec<(String, String, u32)> {
        self.files.lock().unwrap().clone()
    }

    /// Index of the first recorded command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.contains(needle))
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ExecError> {
        let rendered = command.render();
        self.commands.lock().unwrap().push(rendered.clone());
        let output = self
            .responses
            .iter()
            .find(|(needle, _, _)| rendered.contains(needle.as_str()))
            .map(|(_, code, stdout)| CommandOutput {
                exit_code: *code,
                stdout: stdout.clone(),
                stderr: if *code == 0 {
                    String::new()
                } else {
                    "simulated failure".to_string()
                },
            })
            .unwrap_or_default();
        Ok(output)
    }

    async fn write_file(
        &self,
        path: &RemotePath,
        contents: &str,
        mode: u32,
    ) -> Result<(), ExecError> {
        self.files
            .lock()
            .unwrap()
            .push((path.to_string(), contents.to_string(), mode));
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Run git in `dir`, panicking on failure.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a bare repository at `path`.
#[allow(dead_code)]
pub fn bare_repo(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "--bare", "--quiet"]);
}

/// Commit hash `branch` points at in the bare repository, if the branch exists.
#[allow(dead_code)]
pub fn bare_head(path: &Path, branch: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
        .current_dir(path)
        .env_remove("GIT_DIR")
        .output()
        .unwrap();
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// A scratch project: a build directory with artifacts and local bare-repository targets.
#[allow(dead_code)]
pub struct Workspace {
    pub dir: TempDir,
    pub service: ServiceConfig,
}

#[allow(dead_code)]
impl Workspace {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root().join("build")
    }

    pub fn remote(&self, index: usize) -> PathBuf {
        self.root().join(format!("remote-{}.git", index))
    }

    pub fn work_dir(&self, index: usize) -> PathBuf {
        self.root().join(format!("work-{}", index))
    }

    pub fn write_artifact(&self, relative: &str, contents: &str) {
        let path = self.build_dir().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}

/// Options for `workspace_with`.
#[allow(dead_code)]
#[derive(Default)]
pub struct WorkspaceOptions {
    /// Number of local targets.
    pub targets: usize,
    /// Target indices whose bare repository is never created.
    pub missing_remotes: Vec<usize>,
    /// Extra YAML lines appended to the service entry (indented by 4 spaces).
    pub extra: String,
}

/// A workspace with `targets` healthy local targets.
#[allow(dead_code)]
pub fn workspace(targets: usize) -> Workspace {
    workspace_with(WorkspaceOptions {
        targets,
        ..Default::default()
    })
}

#[allow(dead_code)]
pub fn workspace_with(options: WorkspaceOptions) -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("build/dist")).unwrap();
    std::fs::write(root.join("build/dist/app.js"), "console.log('v1');\n").unwrap();
    std::fs::write(root.join("build/package.json"), "{\"name\":\"api\"}\n").unwrap();

    let mut servers = String::new();
    for index in 0..options.targets {
        let remote = root.join(format!("remote-{}.git", index));
        if !options.missing_remotes.contains(&index) {
            bare_repo(&remote);
        }
        servers.push_str(&format!(
            "      - transport: local\n        label: target-{index}\n        bare_repo: {}\n        work_dir: {}\n",
            remote.display(),
            root.join(format!("work-{}", index)).display()
        ));
    }

    let yaml = format!(
        "services:\n  api:\n    source: {}\n    artifacts: [dist, package.json]\n    process_manager: systemd\n{}    servers:\n{}",
        root.join("build").display(),
        options.extra,
        servers
    );
    std::fs::write(root.join("pushdeploy.yml"), &yaml).unwrap();

    let service = Config::load(&root.join("pushdeploy.yml"))
        .unwrap()
        .service("api")
        .unwrap();
    Workspace { dir, service }
}
