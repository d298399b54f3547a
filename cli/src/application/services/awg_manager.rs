//! Application service: AmneziaWG peer lifecycle.
//!
//! Operates on an open [`ConfigSession`]. Disabled peers stay in `wg0.conf`
//! commented out, so their addresses remain reserved.

use std::path::PathBuf;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use crate::application::ports::{ArtifactWriter, KeyGenerator, RemoteTransport};
use crate::application::services::provision::ClientSummary;
use crate::application::services::session::ConfigSession;
use crate::domain::awg::{AwgConfig, ClientConfig, obfuscation_params};
use crate::domain::keys::PeerKeys;
use crate::domain::ledger::LedgerEntry;
use crate::domain::shell::file_stem;
use crate::domain::{AddressPool, ProvisionError};

pub struct AwgManager<'s, 'a, T: RemoteTransport> {
    session: &'s mut ConfigSession<'a, T>,
    config: AwgConfig,
    pool: AddressPool,
}

/// Inputs for a client config file.
pub struct ArtifactRequest<'r> {
    pub client_name: &'r str,
    pub private_key: &'r SecretString,
    pub preshared_key: Option<&'r str>,
    pub address: &'r str,
}

impl<'s, 'a, T: RemoteTransport> AwgManager<'s, 'a, T> {
    /// # Errors
    ///
    /// Returns `FileSync` if `wg0.conf` cannot be parsed.
    pub fn new(session: &'s mut ConfigSession<'a, T>) -> Result<Self, ProvisionError> {
        let config = AwgConfig::parse(session.config_text())
            .map_err(|e| ProvisionError::file_sync(session.config_path(), e))?;
        Ok(Self {
            session,
            config,
            pool: AddressPool::default(),
        })
    }

    /// Fresh keypair plus the profile's pre-shared key.
    pub fn generate_keys(&self, keys: &impl KeyGenerator) -> PeerKeys {
        PeerKeys {
            keypair: keys.generate(),
            preshared_key: self.session.profile().preshared_key.clone(),
        }
    }

    /// Next address after the highest one held by any peer, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns `PoolExhausted` when no address is left.
    pub fn allocate_address(&self) -> Result<String, ProvisionError> {
        self.pool
            .next_address(self.config.peers().map(|p| p.allowed_ips()))
    }

    /// Register a peer in the ledger and `wg0.conf`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the public key is already known.
    pub async fn add_peer(
        &mut self,
        public_key: &str,
        preshared_key: Option<&str>,
        address: &str,
        client_name: &str,
    ) -> Result<(), ProvisionError> {
        if self.peer_exists(public_key) {
            return Err(ProvisionError::AlreadyExists {
                client_id: public_key.to_string(),
            });
        }
        let entry = LedgerEntry::wg_peer(public_key, client_name, address, Utc::now());
        self.session.append_ledger_entry(entry).await?;

        let mut attrs = Vec::with_capacity(2);
        if let Some(psk) = preshared_key {
            attrs.push(("PresharedKey", psk));
        }
        attrs.push(("AllowedIPs", address));
        self.config.add_peer(public_key, &attrs);
        self.save().await?;

        tracing::info!(
            server = %self.session.server().name,
            client_id = %public_key,
            %client_name,
            %address,
            "issued amneziawg peer"
        );
        Ok(())
    }

    /// Delete a peer from the ledger and `wg0.conf`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the peer is in neither.
    pub async fn remove_peer(&mut self, public_key: &str) -> Result<(), ProvisionError> {
        if !self.peer_exists(public_key) {
            return Err(ProvisionError::NotFound {
                client_id: public_key.to_string(),
            });
        }
        self.session.remove_ledger_entry(public_key).await?;
        if self.config.remove_peer(public_key) {
            self.save().await?;
        }
        tracing::info!(server = %self.session.server().name, client_id = %public_key, "revoked amneziawg peer");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` if `wg0.conf` has no such peer.
    pub async fn enable_peer(&mut self, public_key: &str) -> Result<bool, ProvisionError> {
        self.set_enabled(public_key, true).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` if `wg0.conf` has no such peer.
    pub async fn disable_peer(&mut self, public_key: &str) -> Result<bool, ProvisionError> {
        self.set_enabled(public_key, false).await
    }

    async fn set_enabled(&mut self, public_key: &str, enabled: bool) -> Result<bool, ProvisionError> {
        let changed = self
            .config
            .set_peer_enabled(public_key, enabled)
            .ok_or_else(|| ProvisionError::NotFound {
                client_id: public_key.to_string(),
            })?;
        if changed {
            self.save().await?;
        }
        Ok(changed)
    }

    #[must_use]
    pub fn peer_exists(&self, public_key: &str) -> bool {
        self.config.peer(public_key).is_some()
            || self.session.ledger().is_some_and(|l| l.contains(public_key))
    }

    #[must_use]
    pub fn is_enabled(&self, public_key: &str) -> bool {
        self.config.peer(public_key).is_some_and(|p| p.is_enabled())
    }

    /// The peer's address: from the ledger when one is kept, else from the
    /// peer's `AllowedIPs`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the peer is unknown.
    pub fn lookup_address(&self, public_key: &str) -> Result<String, ProvisionError> {
        let found = match self.session.ledger() {
            Some(ledger) => ledger
                .find(public_key)
                .and_then(|e| e.user_data.allowed_ips.clone()),
            None => self
                .config
                .peer(public_key)
                .map(|p| p.allowed_ips().to_string()),
        };
        found.ok_or_else(|| ProvisionError::NotFound {
            client_id: public_key.to_string(),
        })
    }

    /// Server public key: the profile's, else
    /// `wireguard_server_public_key.key` on the server.
    ///
    /// # Errors
    ///
    /// Returns `FileSync` if neither is available.
    pub async fn server_public_key(&self) -> Result<String, ProvisionError> {
        let profile = self.session.profile();
        match &profile.public_key {
            Some(key) => Ok(key.clone()),
            None => self.session.read_remote_text(profile.kind.public_key_filename()).await,
        }
    }

    /// Render a client config and write it to a fresh file.
    ///
    /// # Errors
    ///
    /// Returns `FileSync` if the server's `[Interface]` lacks an obfuscation
    /// value, or the writer's error.
    pub async fn build_client_artifact(
        &self,
        writer: &impl ArtifactWriter,
        request: &ArtifactRequest<'_>,
    ) -> Result<PathBuf, ProvisionError> {
        let obfuscation = obfuscation_params(&self.config).map_err(|key| {
            ProvisionError::file_sync(
                self.session.config_path(),
                format!("[Interface] has no {key} value"),
            )
        })?;
        let server_public_key = self.server_public_key().await?;
        let contents = ClientConfig {
            address: request.address,
            private_key: request.private_key.expose_secret(),
            preshared_key: request.preshared_key,
            server_public_key: &server_public_key,
            endpoint_host: &self.session.server().host,
            obfuscation,
        }
        .render();
        writer
            .write_artifact(&file_stem(request.client_name), &contents)
            .await
    }

    /// Ledger entries merged with the peers in `wg0.conf`.
    #[must_use]
    pub fn clients(&self) -> Vec<ClientSummary> {
        let mut out: Vec<ClientSummary> = self
            .session
            .ledger()
            .map(|l| l.entries())
            .unwrap_or_default()
            .iter()
            .map(|e| ClientSummary {
                client_id: e.client_id.clone(),
                client_name: e.user_data.client_name.clone(),
                address: e.user_data.allowed_ips.clone(),
                enabled: self.is_enabled(&e.client_id),
                in_ledger: true,
            })
            .collect();
        for peer in self.config.peers() {
            if !out.iter().any(|c| c.client_id == peer.public_key()) {
                out.push(ClientSummary {
                    client_id: peer.public_key().to_string(),
                    client_name: String::new(),
                    address: Some(peer.allowed_ips().to_string()),
                    enabled: peer.is_enabled(),
                    in_ledger: false,
                });
            }
        }
        out
    }

    async fn save(&mut self) -> Result<(), ProvisionError> {
        self.session.replace_config(self.config.render());
        self.session.persist_config().await
    }
}
