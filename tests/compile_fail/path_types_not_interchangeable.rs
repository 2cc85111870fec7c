// A service name cannot stand in for a remote path.
use pushdeploy::types::{RemotePath, ServiceName};

fn work_tree(_path: &RemotePath) {}

fn main() {
    let name = ServiceName::new("api").unwrap();
    work_tree(&name);
}
