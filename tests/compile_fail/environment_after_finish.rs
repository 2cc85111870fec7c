// A finished install cannot go back to writing its environment.
use pushdeploy::install::{Installation, Restarted};

fn rewind(installation: Installation<'_, Restarted>) {
    let _ = installation.write_environment();
}

fn main() {}
