//! Application service: a scoped, locally mirrored view of one protocol's
//! remote files.
//!
//! [`ConfigSession::open`] pulls the live config (and the ledger when the
//! profile has one) into a fresh scratch directory. Mutations are written
//! back with the `persist_*` methods. [`ConfigSession::finish`] restarts the
//! remote service and removes the scratch directory on every exit path; the
//! directory is also removed on drop if a session is abandoned.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::sync::OwnedMutexGuard;
use vpnctl_common::{ProtocolProfile, Server};

use crate::application::ports::RemoteTransport;
use crate::application::services::locks::SessionLocks;
use crate::application::services::transfer;
use crate::domain::ProvisionError;
use crate::domain::ledger::{LEDGER_FILENAME, Ledger, LedgerEntry};
use crate::domain::shell::quote;

/// Behaviour switches for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Restart the container when the session finishes.
    pub restart: bool,
    /// Compare each remote file with its fetched digest before overwriting.
    pub verify_remote_digest: bool,
    /// Parent directory for scratch directories (system temp dir if `None`).
    pub scratch_root: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            restart: true,
            verify_remote_digest: true,
            scratch_root: None,
        }
    }
}

impl SessionOptions {
    /// Read-only variant: no restart on finish.
    #[must_use]
    pub fn inspect(mut self) -> Self {
        self.restart = false;
        self
    }
}

/// A remote file and its scratch copy.
#[derive(Debug)]
struct Mirror {
    name: String,
    remote: String,
    local: PathBuf,
    digest: String,
}

/// Exclusive, scoped access to one server's protocol files.
pub struct ConfigSession<'a, T: RemoteTransport> {
    transport: &'a T,
    server: &'a Server,
    profile: &'a ProtocolProfile,
    options: SessionOptions,
    scratch: TempDir,
    config: Mirror,
    config_text: String,
    ledger: Option<(Mirror, Ledger)>,
    _guard: OwnedMutexGuard<()>,
}

impl<'a, T: RemoteTransport> ConfigSession<'a, T> {
    /// Lock the (server, protocol) pair and mirror its files locally.
    ///
    /// # Errors
    ///
    /// Returns `Local` if the scratch directory cannot be created, and
    /// `FileSync` if an expected remote file is missing or unparseable.
    pub async fn open(
        transport: &'a T,
        server: &'a Server,
        profile: &'a ProtocolProfile,
        locks: &SessionLocks,
        options: SessionOptions,
    ) -> Result<Self, ProvisionError> {
        let guard = locks.acquire(&server.name, profile.kind).await;
        let scratch = create_scratch(options.scratch_root.as_deref())?;
        tracing::debug!(
            server = %server.name,
            protocol = %profile.kind,
            scratch = %scratch.path().display(),
            "opening session"
        );

        let (config, config_text) =
            fetch_mirror(transport, profile, scratch.path(), profile.config_filename()).await?;

        let ledger = if profile.ledger {
            let (mirror, text) =
                fetch_mirror(transport, profile, scratch.path(), LEDGER_FILENAME).await?;
            let ledger = Ledger::parse(&text)
                .map_err(|e| ProvisionError::file_sync(&mirror.remote, e))?;
            Some((mirror, ledger))
        } else {
            None
        };

        Ok(Self {
            transport,
            server,
            profile,
            options,
            scratch,
            config,
            config_text,
            ledger,
            _guard: guard,
        })
    }

    #[must_use]
    pub fn server(&self) -> &'a Server {
        self.server
    }

    #[must_use]
    pub fn profile(&self) -> &'a ProtocolProfile {
        self.profile
    }

    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Text of the live config as last fetched or replaced.
    #[must_use]
    pub fn config_text(&self) -> &str {
        &self.config_text
    }

    /// Remote path of the live config.
    #[must_use]
    pub fn config_path(&self) -> &str {
        &self.config.remote
    }

    /// Replace the local live-config text. Call [`Self::persist_config`] to
    /// send it to the server.
    pub fn replace_config(&mut self, text: String) {
        self.config_text = text;
    }

    /// The mirrored ledger, or `None` when the profile has no ledger.
    #[must_use]
    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref().map(|(_, ledger)| ledger)
    }

    /// Add `entry` to the ledger and persist it. No-op without a ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written back.
    pub async fn append_ledger_entry(&mut self, entry: LedgerEntry) -> Result<(), ProvisionError> {
        let Some((_, ledger)) = self.ledger.as_mut() else {
            return Ok(());
        };
        ledger.push(entry);
        self.persist_ledger().await
    }

    /// Drop `client_id` from the ledger; persists only when an entry was
    /// removed. Returns whether one was.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written back.
    pub async fn remove_ledger_entry(&mut self, client_id: &str) -> Result<bool, ProvisionError> {
        let Some((_, ledger)) = self.ledger.as_mut() else {
            return Ok(false);
        };
        if !ledger.remove(client_id) {
            return Ok(false);
        }
        self.persist_ledger().await?;
        Ok(true)
    }

    /// Write the live config back to the server.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the remote file changed since it was fetched.
    pub async fn persist_config(&mut self) -> Result<(), ProvisionError> {
        let text = self.config_text.clone();
        let transport = self.transport;
        let profile = self.profile;
        let verify = self.options.verify_remote_digest;
        let scratch = self.scratch.path().to_path_buf();
        persist(transport, profile, &scratch, &mut self.config, &text, verify).await
    }

    /// Write the ledger back to the server. No-op without a ledger.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the remote file changed since it was fetched.
    pub async fn persist_ledger(&mut self) -> Result<(), ProvisionError> {
        let transport = self.transport;
        let profile = self.profile;
        let verify = self.options.verify_remote_digest;
        let scratch = self.scratch.path().to_path_buf();
        let Some((mirror, ledger)) = self.ledger.as_mut() else {
            return Ok(());
        };
        let text = ledger
            .render()
            .map_err(|e| ProvisionError::file_sync(&mirror.remote, e))?;
        persist(transport, profile, &scratch, mirror, &text, verify).await
    }

    /// Fetch another file from the config directory and return its trimmed
    /// text.
    ///
    /// # Errors
    ///
    /// Returns `FileSync` if the file is missing.
    pub async fn read_remote_text(&self, name: &str) -> Result<String, ProvisionError> {
        let (_, text) = fetch_mirror(self.transport, self.profile, self.scratch.path(), name).await?;
        Ok(text.trim().to_string())
    }

    /// Restart the protocol container so it reloads its config.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the restart command fails.
    pub async fn restart(&self) -> Result<(), ProvisionError> {
        let container = self.profile.container();
        tracing::debug!(server = %self.server.name, %container, "restarting container");
        self.transport
            .exec(&format!("sudo docker restart {}", quote(container)))
            .await
            .map(|_| ())
    }

    /// Remove the scratch directory and release the lock. Never fails.
    pub fn close(self) {
        let Self { scratch, server, .. } = self;
        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(
                server = %server.name,
                scratch = %path.display(),
                error = %e,
                "failed to remove session scratch directory"
            );
        }
    }

    /// End the session: restart (unless disabled), then close.
    ///
    /// An error in `outcome` stays the primary error; a restart failure is
    /// chained onto it.
    ///
    /// # Errors
    ///
    /// Returns the body's error, the restart error, or both chained.
    pub async fn finish<R>(self, outcome: Result<R, ProvisionError>) -> Result<R, ProvisionError> {
        let restarted = if self.options.restart {
            self.restart().await
        } else {
            Ok(())
        };
        self.close();
        match (outcome, restarted) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(r)) => Err(r),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(r)) => Err(e.chain(r)),
        }
    }
}

fn create_scratch(root: Option<&Path>) -> Result<TempDir, ProvisionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("vpnctl-");
    match root {
        Some(root) => builder
            .tempdir_in(root)
            .map_err(|e| ProvisionError::local(root, e)),
        None => builder
            .tempdir()
            .map_err(|e| ProvisionError::local(std::env::temp_dir(), e)),
    }
}

fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

async fn read_local(path: &Path) -> Result<String, ProvisionError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ProvisionError::local(path, e))
}

async fn fetch_mirror(
    transport: &impl RemoteTransport,
    profile: &ProtocolProfile,
    scratch: &Path,
    name: &str,
) -> Result<(Mirror, String), ProvisionError> {
    let remote = profile.remote_path(name);
    let local = scratch.join(name);
    transfer::pull(transport, profile.file_access(), &remote, &local).await?;
    let text = read_local(&local).await?;
    let mirror = Mirror {
        name: name.to_string(),
        remote,
        local,
        digest: digest(&text),
    };
    Ok((mirror, text))
}

async fn persist(
    transport: &impl RemoteTransport,
    profile: &ProtocolProfile,
    scratch: &Path,
    mirror: &mut Mirror,
    text: &str,
    verify: bool,
) -> Result<(), ProvisionError> {
    if verify {
        let check = scratch.join(format!("{}.check", mirror.name));
        transfer::pull(transport, profile.file_access(), &mirror.remote, &check).await?;
        let current = read_local(&check).await?;
        if digest(&current) != mirror.digest {
            return Err(ProvisionError::Conflict {
                path: mirror.remote.clone(),
            });
        }
    }
    tokio::fs::write(&mirror.local, text)
        .await
        .map_err(|e| ProvisionError::local(&mirror.local, e))?;
    transfer::push(transport, profile.file_access(), &mirror.local, &mirror.remote).await?;
    tracing::debug!(remote = %mirror.remote, bytes = text.len(), "persisted");
    mirror.digest = digest(text);
    Ok(())
}
