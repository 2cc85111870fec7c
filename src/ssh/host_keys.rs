// ABOUTME: Server host key verification against the user's known_hosts file.
// ABOUTME: Unknown keys are refused unless the target opts into trust on first connection.

use russh::client;
use russh::keys::known_hosts::{check_known_hosts, learn_known_hosts};
use russh::keys::ssh_key;

/// What to do with a host key that known_hosts has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    #[default]
    Strict,
    /// Accept and record the key the first time; a changed key is still refused.
    TrustFirstUse,
}

pub(super) struct HostKeyVerifier {
    pub(super) host: String,
    pub(super) port: u16,
    pub(super) policy: HostKeyPolicy,
}

impl HostKeyVerifier {
    fn verify(&self, key: &ssh_key::PublicKey) -> bool {
        match check_known_hosts(&self.host, self.port, key) {
            Ok(true) => true,
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(
                    "host key for {}:{} does not match known_hosts; refusing to connect",
                    self.host,
                    self.port
                );
                false
            }
            Ok(false) | Err(_) => self.unknown(key),
        }
    }

    fn unknown(&self, key: &ssh_key::PublicKey) -> bool {
        match self.policy {
            HostKeyPolicy::Strict => {
                tracing::warn!(
                    "{}:{} is not in known_hosts; set trust_first_connection to accept it",
                    self.host,
                    self.port
                );
                false
            }
            HostKeyPolicy::TrustFirstUse => {
                tracing::warn!("recording new host key for {}:{}", self.host, self.port);
                if let Err(e) = learn_known_hosts(&self.host, self.port, key) {
                    tracing::warn!("could not update known_hosts: {}", e);
                }
                true
            }
        }
    }
}

impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.verify(server_public_key))
    }
}
