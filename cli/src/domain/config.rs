//! Domain types and validators for vpnctl configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vpnctl_common::Server;

use crate::domain::error::ConfigError;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.vpnctl/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VpnctlConfig {
    pub ssh: SshSettings,
    pub session: SessionSettings,
    /// Server inventory.
    pub servers: Vec<Server>,
}

/// `StrictHostKeyChecking` value passed to ssh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    Yes,
    #[default]
    AcceptNew,
    No,
}

impl HostKeyPolicy {
    #[must_use]
    pub fn as_ssh_option(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::AcceptNew => "accept-new",
            Self::No => "no",
        }
    }
}

/// SSH connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub connect_timeout_secs: u64,
    /// Deadline for each remote command or file transfer.
    pub command_timeout_secs: u64,
    pub strict_host_key_checking: HostKeyPolicy,
    pub known_hosts_file: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            command_timeout_secs: 60,
            strict_host_key_checking: HostKeyPolicy::default(),
            known_hosts_file: None,
        }
    }
}

impl SshSettings {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Local scratch and session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Parent of per-session scratch directories (system temp dir if unset).
    pub scratch_dir: Option<PathBuf>,
    /// Where generated AmneziaWG client configs are written.
    pub artifact_dir: Option<PathBuf>,
    /// Re-read each remote file before overwriting it and fail on change.
    pub verify_remote_digest: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            artifact_dir: None,
            verify_remote_digest: true,
        }
    }
}

// ── Lookups and validators ───────────────────────────────────────────────────

impl VpnctlConfig {
    /// Finds a server by name.
    ///
    /// # Errors
    ///
    /// Returns an error listing the configured servers if none matches.
    pub fn server(&self, name: &str) -> Result<&Server, ConfigError> {
        self.servers
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::UnknownServer {
                name: name.to_string(),
                valid: self.server_names().join(", "),
            })
    }

    #[must_use]
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Checks the inventory for duplicates and unusable entries.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for server in &self.servers {
            if !names.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateServer(server.name.clone()));
            }
            validate_server(server)?;
        }
        Ok(())
    }
}

fn validate_server(server: &Server) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidServer {
        server: server.name.clone(),
        message: message.to_string(),
    };
    if server.host.trim().is_empty() {
        return Err(invalid("host is empty"));
    }
    if server.ssh_user.trim().is_empty() {
        return Err(invalid("ssh_user is empty"));
    }
    if server.is_active && server.identity_file.is_none() {
        return Err(invalid("active server has no identity_file"));
    }
    let mut kinds = HashSet::new();
    for profile in &server.protocols {
        if !kinds.insert(profile.kind) {
            return Err(ConfigError::DuplicateProtocol {
                server: server.name.clone(),
                protocol: profile.kind.to_string(),
            });
        }
        if profile.container().trim().is_empty() {
            return Err(invalid("container name is empty"));
        }
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
