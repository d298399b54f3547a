//! Application service: VLESS client lifecycle on an Xray server.
//!
//! Operates on an open [`ConfigSession`]. Each mutation is persisted before
//! the method returns; the session's `finish` applies it with a restart.

use chrono::Utc;
use uuid::Uuid;

use crate::application::ports::RemoteTransport;
use crate::application::services::provision::ClientSummary;
use crate::application::services::session::ConfigSession;
use crate::domain::ProvisionError;
use crate::domain::ledger::{LedgerEntry, composite_client_name};
use crate::domain::xray::{VlessLink, XrayConfig};

pub struct XrayManager<'s, 'a, T: RemoteTransport> {
    session: &'s mut ConfigSession<'a, T>,
    config: XrayConfig,
}

impl<'s, 'a, T: RemoteTransport> XrayManager<'s, 'a, T> {
    /// # Errors
    ///
    /// Returns `FileSync` if the live config has no client list.
    pub fn new(session: &'s mut ConfigSession<'a, T>) -> Result<Self, ProvisionError> {
        let config = XrayConfig::parse(session.config_text())
            .map_err(|e| ProvisionError::file_sync(session.config_path(), e))?;
        Ok(Self { session, config })
    }

    /// Issue a new client. Returns `(client_id, client_name)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger or live config cannot be written.
    pub async fn add_client(&mut self, display_name: &str) -> Result<(String, String), ProvisionError> {
        let client_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let client_name = composite_client_name(display_name, now);

        self.session
            .append_ledger_entry(LedgerEntry::tls_client(&client_id, &client_name, now))
            .await?;
        self.config.add_client(&client_id, &client_name);
        self.save().await?;

        tracing::info!(
            server = %self.session.server().name,
            %client_id,
            %client_name,
            "issued xray client"
        );
        Ok((client_id, client_name))
    }

    /// Delete a client from the ledger and the live config.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client is in neither.
    pub async fn remove_client(&mut self, client_id: &str) -> Result<(), ProvisionError> {
        if !self.client_exists(client_id) {
            return Err(ProvisionError::NotFound {
                client_id: client_id.to_string(),
            });
        }
        self.session.remove_ledger_entry(client_id).await?;
        self.disable_client(client_id).await?;
        tracing::info!(server = %self.session.server().name, %client_id, "revoked xray client");
        Ok(())
    }

    /// Stop accepting a client without forgetting it. Returns whether the
    /// live config changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the live config cannot be written.
    pub async fn disable_client(&mut self, client_id: &str) -> Result<bool, ProvisionError> {
        if !self.config.remove_client(client_id) {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Accept a client again. Returns whether the live config changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the live config cannot be written.
    pub async fn enable_client(&mut self, client_id: &str, client_name: &str) -> Result<bool, ProvisionError> {
        if !self.config.add_client(client_id, client_name) {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Present in the ledger or the live config.
    #[must_use]
    pub fn client_exists(&self, client_id: &str) -> bool {
        self.config.contains(client_id)
            || self.session.ledger().is_some_and(|l| l.contains(client_id))
    }

    #[must_use]
    pub fn is_enabled(&self, client_id: &str) -> bool {
        self.config.contains(client_id)
    }

    /// REALITY public key: the profile's, else `xray_public.key` on the server.
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

    /// Connection link for an existing client.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the ledger is kept and lacks the client.
    pub async fn client_url(&self, client_id: &str, client_name: &str) -> Result<String, ProvisionError> {
        if self.session.ledger().is_some_and(|l| !l.contains(client_id)) {
            return Err(ProvisionError::NotFound {
                client_id: client_id.to_string(),
            });
        }
        let public_key = self.server_public_key().await?;
        Ok(VlessLink {
            client_id,
            host: &self.session.server().host,
            public_key: &public_key,
            client_name,
        }
        .to_url())
    }

    /// Ledger entries merged with live membership. Live clients missing from
    /// the ledger are listed after it.
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
                address: None,
                enabled: self.config.contains(&e.client_id),
                in_ledger: true,
            })
            .collect();
        for id in self.config.client_ids() {
            if !out.iter().any(|c| c.client_id == id) {
                out.push(ClientSummary {
                    client_id: id.to_string(),
                    client_name: String::new(),
                    address: None,
                    enabled: true,
                    in_ledger: false,
                });
            }
        }
        out
    }

    async fn save(&mut self) -> Result<(), ProvisionError> {
        let text = self
            .config
            .render()
            .map_err(|e| ProvisionError::file_sync(self.session.config_path(), e))?;
        self.session.replace_config(text);
        self.session.persist_config().await
    }
}
