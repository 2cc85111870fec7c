// Restarting requires dependencies to be installed first.
use pushdeploy::install::{Installation, Received};

async fn skip_ahead(installation: Installation<'_, Received>) {
    let _ = installation.restart().await;
}

fn main() {}
