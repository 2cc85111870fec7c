// ABOUTME: Errors from connecting to and running commands on a target over SSH.
// ABOUTME: Messages name the host so multi-target output stays readable.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("connecting to {host}:{port} took longer than {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("{user}@{host} rejected every offered key")]
    AuthenticationFailed { user: String, host: String },

    #[error("no SSH credentials available: {0}")]
    NoCredentials(String),

    #[error("cannot read SSH key {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("could not start remote command: {0}")]
    Channel(String),

    #[error("remote command ran longer than {0:?}")]
    CommandTimeout(Duration),

    #[error("connection dropped before the command reported an exit status")]
    ChannelClosed,

    #[error(transparent)]
    Protocol(#[from] russh::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
