//! Application service: issue, revoke and inspect credentials on one server.
//!
//! Every operation connects, opens a [`ConfigSession`] for the requested
//! protocol, runs the matching manager, finishes the session and closes the
//! connection. Eligibility (active server, protocol offered, spare capacity)
//! is checked before any remote I/O.

use std::path::{Path, PathBuf};

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use vpnctl_common::{ProtocolKind, ProtocolProfile, Server, ServerLoad};

use crate::application::ports::{ArtifactWriter, KeyGenerator, RemoteTransport, TransportConnector};
use crate::application::services::awg_manager::{ArtifactRequest, AwgManager};
use crate::application::services::locks::SessionLocks;
use crate::application::services::session::{ConfigSession, SessionOptions};
use crate::application::services::xray_manager::XrayManager;
use crate::domain::ProvisionError;
use crate::domain::ledger::composite_client_name;
use crate::domain::xray::VlessLink;

/// What a successful issue hands back to the caller for its records.
#[derive(Debug, Serialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum IssuedCredential {
    Xray {
        client_id: String,
        client_name: String,
        url: String,
    },
    #[serde(rename = "amneziawg")]
    AmneziaWg {
        client_id: String,
        client_name: String,
        #[serde(skip)]
        private_key: SecretString,
        preshared_key: Option<String>,
        address: String,
        artifact: PathBuf,
    },
}

impl IssuedCredential {
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::Xray { client_id, .. } | Self::AmneziaWg { client_id, .. } => client_id,
        }
    }

    #[must_use]
    pub fn client_name(&self) -> &str {
        match self {
            Self::Xray { client_name, .. } | Self::AmneziaWg { client_name, .. } => client_name,
        }
    }

    /// Private key of an AmneziaWG client. Left out of serialization.
    #[must_use]
    pub fn private_key(&self) -> Option<&SecretString> {
        match self {
            Self::AmneziaWg { private_key, .. } => Some(private_key),
            Self::Xray { .. } => None,
        }
    }
}

/// One client as seen by the ledger and the live config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    pub client_id: String,
    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Accepted by the live config.
    pub enabled: bool,
    pub in_ledger: bool,
}

/// Settings shared by every session the provisioner opens.
#[derive(Debug, Clone, Default)]
pub struct ProvisionerOptions {
    pub session: SessionOptions,
}

/// Inputs for regenerating an AmneziaWG client file.
pub struct ExistingPeer<'r> {
    pub public_key: &'r str,
    pub private_key: &'r SecretString,
    pub client_name: &'r str,
    /// Looked up in the ledger when `None`.
    pub address: Option<&'r str>,
}

pub struct Provisioner<C, K, W> {
    connector: C,
    keys: K,
    writer: W,
    locks: SessionLocks,
    options: ProvisionerOptions,
}

impl<C, K, W> Provisioner<C, K, W>
where
    C: TransportConnector,
    K: KeyGenerator,
    W: ArtifactWriter,
{
    pub fn new(connector: C, keys: K, writer: W, options: ProvisionerOptions) -> Self {
        Self {
            connector,
            keys,
            writer,
            locks: SessionLocks::new(),
            options,
        }
    }

    /// Share a lock registry with other provisioners in this process.
    #[must_use]
    pub fn with_locks(mut self, locks: SessionLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Issue a credential for `display_name`.
    ///
    /// # Errors
    ///
    /// Returns `ServerInactive`, `UnsupportedProtocol` or `CapacityExceeded`
    /// before connecting; otherwise any session or manager error.
    pub async fn issue(
        &self,
        server: &Server,
        kind: ProtocolKind,
        display_name: &str,
        load: ServerLoad,
    ) -> Result<IssuedCredential, ProvisionError> {
        let profile = usable_profile(server, kind)?;
        if load.is_overloaded() {
            return Err(ProvisionError::CapacityExceeded {
                server: server.name.clone(),
                issued: load.issued,
                max_configs: load.max_configs,
            });
        }
        let transport = self.connector.connect(server).await?;
        let result = async {
            let mut session = self.open(&transport, server, profile, true).await?;
            let outcome = match kind {
                ProtocolKind::Xray => issue_xray(&mut session, display_name).await,
                ProtocolKind::AmneziaWg => self.issue_awg(&mut session, display_name).await,
            };
            let artifact = match &outcome {
                Ok(IssuedCredential::AmneziaWg { artifact, .. }) => Some(artifact.clone()),
                _ => None,
            };
            let finished = session.finish(outcome).await;
            // The caller never receives this credential.
            if let (Err(_), Some(path)) = (&finished, artifact) {
                discard_artifact(&path).await;
            }
            finished
        }
        .await;
        disconnect(&transport, server).await;
        result
    }

    /// Delete a client from the ledger and the live config.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the client is unknown on the server.
    pub async fn revoke(
        &self,
        server: &Server,
        kind: ProtocolKind,
        client_id: &str,
    ) -> Result<(), ProvisionError> {
        let profile = reachable_profile(server, kind)?;
        let transport = self.connector.connect(server).await?;
        let result = async {
            let mut session = self.open(&transport, server, profile, true).await?;
            let outcome = remove(&mut session, kind, client_id).await;
            session.finish(outcome).await
        }
        .await;
        disconnect(&transport, server).await;
        result
    }

    /// Enable or disable a client without touching the ledger. Returns
    /// whether the live config changed.
    ///
    /// `client_name` is used to re-enable an Xray client; when absent it is
    /// taken from the ledger. Enabling an Xray client does not require a
    /// ledger entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when disabling an unknown client, or toggling an
    /// AmneziaWG peer missing from `wg0.conf`.
    pub async fn set_enabled(
        &self,
        server: &Server,
        kind: ProtocolKind,
        client_id: &str,
        client_name: Option<&str>,
        enabled: bool,
    ) -> Result<bool, ProvisionError> {
        let profile = reachable_profile(server, kind)?;
        let transport = self.connector.connect(server).await?;
        let result = async {
            let mut session = self.open(&transport, server, profile, true).await?;
            let outcome = toggle(&mut session, kind, client_id, client_name, enabled).await;
            session.finish(outcome).await
        }
        .await;
        disconnect(&transport, server).await;
        result
    }

    /// Connection link for an existing Xray client.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the ledger lacks the client.
    pub async fn client_url(
        &self,
        server: &Server,
        client_id: &str,
        client_name: &str,
    ) -> Result<String, ProvisionError> {
        let profile = reachable_profile(server, ProtocolKind::Xray)?;
        let transport = self.connector.connect(server).await?;
        let result = async {
            let mut session = self.open(&transport, server, profile, false).await?;
            let outcome = match XrayManager::new(&mut session) {
                Ok(manager) => manager.client_url(client_id, client_name).await,
                Err(e) => Err(e),
            };
            session.finish(outcome).await
        }
        .await;
        disconnect(&transport, server).await;
        result
    }

    /// Regenerate the client file of an existing AmneziaWG peer.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no address is given and the ledger lacks the
    /// peer.
    pub async fn client_artifact(
        &self,
        server: &Server,
        peer: &ExistingPeer<'_>,
    ) -> Result<PathBuf, ProvisionError> {
        let profile = reachable_profile(server, ProtocolKind::AmneziaWg)?;
        let transport = self.connector.connect(server).await?;
        let result = async {
            let mut session = self.open(&transport, server, profile, false).await?;
            let outcome = self.existing_artifact(&mut session, peer).await;
            session.finish(outcome).await
        }
        .await;
        disconnect(&transport, server).await;
        result
    }

    /// List clients without changing anything or restarting the service.
    ///
    /// # Errors
    ///
    /// Returns session errors only.
    pub async fn inspect(
        &self,
        server: &Server,
        kind: ProtocolKind,
    ) -> Result<Vec<ClientSummary>, ProvisionError> {
        let profile = reachable_profile(server, kind)?;
        let transport = self.connector.connect(server).await?;
        let result = async {
            let mut session = self.open(&transport, server, profile, false).await?;
            let outcome = match kind {
                ProtocolKind::Xray => XrayManager::new(&mut session).map(|m| m.clients()),
                ProtocolKind::AmneziaWg => AwgManager::new(&mut session).map(|m| m.clients()),
            };
            session.finish(outcome).await
        }
        .await;
        disconnect(&transport, server).await;
        result
    }

    async fn open<'a>(
        &self,
        transport: &'a C::Transport,
        server: &'a Server,
        profile: &'a ProtocolProfile,
        mutating: bool,
    ) -> Result<ConfigSession<'a, C::Transport>, ProvisionError> {
        let mut options = self.options.session.clone();
        if !mutating {
            options = options.inspect();
        }
        ConfigSession::open(transport, server, profile, &self.locks, options).await
    }

    async fn issue_awg(
        &self,
        session: &mut ConfigSession<'_, C::Transport>,
        display_name: &str,
    ) -> Result<IssuedCredential, ProvisionError> {
        let mut manager = AwgManager::new(session)?;
        let keys = manager.generate_keys(&self.keys);
        let address = manager.allocate_address()?;
        let client_id = keys.keypair.public_key.clone();
        let client_name = display_name.trim().to_string();

        let artifact = manager
            .build_client_artifact(
                &self.writer,
                &ArtifactRequest {
                    client_name: &client_name,
                    private_key: &keys.keypair.private_key,
                    preshared_key: keys.preshared_key.as_deref(),
                    address: &address,
                },
            )
            .await?;
        if let Err(e) = manager
            .add_peer(&client_id, keys.preshared_key.as_deref(), &address, &client_name)
            .await
        {
            discard_artifact(&artifact).await;
            return Err(e);
        }

        Ok(IssuedCredential::AmneziaWg {
            client_id,
            client_name,
            private_key: keys.keypair.private_key,
            preshared_key: keys.preshared_key,
            address,
            artifact,
        })
    }

    async fn existing_artifact(
        &self,
        session: &mut ConfigSession<'_, C::Transport>,
        peer: &ExistingPeer<'_>,
    ) -> Result<PathBuf, ProvisionError> {
        let preshared_key = session.profile().preshared_key.as_deref();
        let manager = AwgManager::new(session)?;
        let address = match peer.address {
            Some(address) => address.to_string(),
            None => manager.lookup_address(peer.public_key)?,
        };
        manager
            .build_client_artifact(
                &self.writer,
                &ArtifactRequest {
                    client_name: peer.client_name,
                    private_key: peer.private_key,
                    preshared_key,
                    address: &address,
                },
            )
            .await
    }
}

async fn discard_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove unused client config");
    }
}

async fn disconnect(transport: &impl RemoteTransport, server: &Server) {
    if let Err(e) = transport.close().await {
        tracing::warn!(server = %server.name, error = %e, "failed to close connection");
    }
}

async fn issue_xray<T: RemoteTransport>(
    session: &mut ConfigSession<'_, T>,
    display_name: &str,
) -> Result<IssuedCredential, ProvisionError> {
    let host = &session.server().host;
    let mut manager = XrayManager::new(session)?;
    let public_key = manager.server_public_key().await?;
    let (client_id, client_name) = manager.add_client(display_name).await?;
    let url = VlessLink {
        client_id: &client_id,
        host,
        public_key: &public_key,
        client_name: &client_name,
    }
    .to_url();
    Ok(IssuedCredential::Xray {
        client_id,
        client_name,
        url,
    })
}

async fn remove<T: RemoteTransport>(
    session: &mut ConfigSession<'_, T>,
    kind: ProtocolKind,
    client_id: &str,
) -> Result<(), ProvisionError> {
    match kind {
        ProtocolKind::Xray => XrayManager::new(session)?.remove_client(client_id).await,
        ProtocolKind::AmneziaWg => AwgManager::new(session)?.remove_peer(client_id).await,
    }
}

async fn toggle<T: RemoteTransport>(
    session: &mut ConfigSession<'_, T>,
    kind: ProtocolKind,
    client_id: &str,
    client_name: Option<&str>,
    enabled: bool,
) -> Result<bool, ProvisionError> {
    match kind {
        ProtocolKind::Xray => {
            let ledger_name = session
                .ledger()
                .and_then(|l| l.find(client_id))
                .map(|e| e.user_data.client_name.clone());
            let mut manager = XrayManager::new(session)?;
            if enabled {
                // Re-admission works without a ledger entry.
                let name = client_name
                    .map(str::to_string)
                    .or(ledger_name)
                    .unwrap_or_else(|| composite_client_name(client_id, Utc::now()));
                return manager.enable_client(client_id, &name).await;
            }
            if !manager.client_exists(client_id) {
                return Err(ProvisionError::NotFound {
                    client_id: client_id.to_string(),
                });
            }
            manager.disable_client(client_id).await
        }
        ProtocolKind::AmneziaWg => {
            let mut manager = AwgManager::new(session)?;
            if enabled {
                manager.enable_peer(client_id).await
            } else {
                manager.disable_peer(client_id).await
            }
        }
    }
}

/// The profile for `kind`, provided the server may receive new clients.
fn usable_profile(server: &Server, kind: ProtocolKind) -> Result<&ProtocolProfile, ProvisionError> {
    if !server.is_active {
        return Err(ProvisionError::ServerInactive(server.name.clone()));
    }
    reachable_profile(server, kind)
}

/// The profile for `kind`. Inactive servers still accept revocations and
/// inspection.
fn reachable_profile(server: &Server, kind: ProtocolKind) -> Result<&ProtocolProfile, ProvisionError> {
    server
        .profile(kind)
        .ok_or_else(|| ProvisionError::UnsupportedProtocol {
            server: server.name.clone(),
            protocol: kind.to_string(),
        })
}
