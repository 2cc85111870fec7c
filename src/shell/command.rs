// ABOUTME: ShellCommand builder rendering to a POSIX shell string or an argv vector.
// ABOUTME: Arguments are static literals, validated types, or free text that is always quoted.

use std::fmt;

use super::sealed::Sealed;
use crate::types::{AccountName, RemotePath};

/// A value whose constructor guarantees it contains only shell-safe characters.
pub trait SafeArg: Sealed {
    fn as_arg(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Static(&'static str),
    Safe(String),
    Text(String),
}

impl Arg {
    fn as_str(&self) -> &str {
        match self {
            Arg::Static(s) => s,
            Arg::Safe(s) | Arg::Text(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Elevation {
    Root,
    User(AccountName),
}

/// A single command, built from typed parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: &'static str,
    args: Vec<Arg>,
    env: Vec<(&'static str, Arg)>,
    cwd: Option<RemotePath>,
    elevation: Option<Elevation>,
}

impl ShellCommand {
    pub fn new(program: &'static str) -> Self {
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            elevation: None,
        }
    }

    /// Append a crate-internal literal (flags, subcommands).
    pub fn arg(mut self, arg: &'static str) -> Self {
        self.args.push(Arg::Static(arg));
        self
    }

    /// Append a validated value.
    pub fn safe(mut self, arg: &impl SafeArg) -> Self {
        self.args.push(Arg::Safe(arg.as_arg().to_string()));
        self
    }

    /// Append arbitrary text. Always quoted when rendered.
    pub fn text(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Text(arg.into()));
        self
    }

    pub fn env(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.env.push((name, Arg::Text(value.into())));
        self
    }

    pub fn current_dir(mut self, dir: &RemotePath) -> Self {
        self.cwd = Some(dir.clone());
        self
    }

    /// Run through `sudo -n` as root.
    pub fn sudo(mut self) -> Self {
        self.elevation = Some(Elevation::Root);
        self
    }

    /// Run through `sudo -n -u <user> -H`.
    pub fn as_user(mut self, user: &AccountName) -> Self {
        self.elevation = Some(Elevation::User(user.clone()));
        self
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    pub fn working_dir(&self) -> Option<&RemotePath> {
        self.cwd.as_ref()
    }

    /// Full argument vector, including any sudo/env prefix.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        match &self.elevation {
            Some(Elevation::Root) => argv.extend(["sudo".to_string(), "-n".to_string()]),
            Some(Elevation::User(user)) => argv.extend([
                "sudo".to_string(),
                "-n".to_string(),
                "-u".to_string(),
                user.as_str().to_string(),
                "-H".to_string(),
            ]),
            None => {}
        }
        if !self.env.is_empty() {
            argv.push("env".to_string());
            for (name, value) in &self.env {
                argv.push(format!("{}={}", name, value.as_str()));
            }
        }
        argv.push(self.program.to_string());
        argv.extend(self.args.iter().map(|a| a.as_str().to_string()));
        argv
    }

    /// Render as a single POSIX shell command line.
    pub fn render(&self) -> String {
        let line = self
            .argv()
            .iter()
            .map(|a| quote(a))
            .collect::<Vec<_>>()
            .join(" ");
        match &self.cwd {
            Some(dir) => format!("cd {} && {}", quote(dir.as_str()), line),
            None => line,
        }
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | ':' | '@' | '%' | '+' | '=' | ',')
}

/// Quote a string for a POSIX shell, leaving plain words untouched.
pub fn quote(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_bare_char) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}
