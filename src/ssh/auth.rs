// ABOUTME: Credential discovery and public-key authentication for target sessions.
// ABOUTME: A configured key file wins; otherwise the agent, then the usual ~/.ssh keys.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::client::Handle;
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use tokio::net::UnixStream;

use super::error::{Error, Result};
use super::host_keys::HostKeyVerifier;

const DEFAULT_KEYS: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

pub(super) enum Credentials {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

fn load_key(path: &Path) -> Result<Credentials> {
    load_secret_key(path, None)
        .map(|key| Credentials::Key(Arc::new(key)))
        .map_err(|e| Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

impl Credentials {
    pub(super) async fn resolve(key_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = key_path {
            return load_key(path);
        }
        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(Credentials::Agent(agent));
        }

        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| Error::NoCredentials("no agent and HOME is not set".to_string()))?;
        DEFAULT_KEYS
            .iter()
            .map(|name| home.join(".ssh").join(name))
            .find_map(|path| load_key(&path).ok())
            .ok_or_else(|| {
                Error::NoCredentials(format!(
                    "no agent and no key among ~/.ssh/{{{}}}",
                    DEFAULT_KEYS.join(",")
                ))
            })
    }

    /// Offer the credentials to the server. `Ok(false)` means every key was refused.
    pub(super) async fn authenticate(
        self,
        handle: &mut Handle<HostKeyVerifier>,
        user: &str,
    ) -> Result<bool> {
        match self {
            Credentials::Agent(mut agent) => {
                let identities = agent
                    .request_identities()
                    .await
                    .map_err(|e| Error::NoCredentials(format!("agent refused to list keys: {}", e)))?;
                if identities.is_empty() {
                    return Err(Error::NoCredentials("the SSH agent holds no keys".to_string()));
                }
                for identity in identities {
                    let accepted = handle
                        .authenticate_publickey_with(user, identity, None, &mut agent)
                        .await
                        .map(|result| result.success())
                        .unwrap_or(false);
                    if accepted {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Credentials::Key(key) => {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await?;
                Ok(result.success())
            }
        }
    }
}
