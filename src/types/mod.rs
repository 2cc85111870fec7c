// ABOUTME: Validated domain types for service names, remote paths, hosts and git refs.
// ABOUTME: Everything here is shell-safe by construction and may flow into remote commands.

mod account_name;
mod branch_name;
mod commit_hash;
mod host_name;
mod label;
mod name;
mod path;
mod process_name;
mod service_name;

pub use account_name::AccountName;
pub use branch_name::BranchName;
pub use commit_hash::CommitHash;
pub use host_name::HostName;
pub use label::Label;
pub use name::NameError;
pub use path::{PathError, RelativePath, RemotePath};
pub use process_name::ProcessName;
pub use service_name::{ServiceName, ServiceNameError};
