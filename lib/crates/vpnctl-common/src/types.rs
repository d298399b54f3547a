use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tunnel protocols a server can expose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProtocolKind {
    /// VLESS + REALITY with the XTLS vision flow, served by Xray.
    #[serde(rename = "xray")]
    #[cfg_attr(feature = "clap", value(name = "xray"))]
    Xray,
    /// AmneziaWG, the obfuscated WireGuard fork.
    #[serde(rename = "amneziawg")]
    #[cfg_attr(feature = "clap", value(name = "amneziawg"))]
    AmneziaWg,
}

impl ProtocolKind {
    /// Directory holding the protocol's files inside the container (or on the
    /// host when it is volume-mounted).
    #[must_use]
    pub fn default_config_path(self) -> &'static str {
        match self {
            Self::Xray => "/opt/amnezia/xray/",
            Self::AmneziaWg => "/opt/amnezia/awg/",
        }
    }

    #[must_use]
    pub fn default_config_filename(self) -> &'static str {
        match self {
            Self::Xray => "server.json",
            Self::AmneziaWg => "wg0.conf",
        }
    }

    #[must_use]
    pub fn default_container(self) -> &'static str {
        match self {
            Self::Xray => "amnezia-xray",
            Self::AmneziaWg => "amnezia-awg",
        }
    }

    /// File next to the live config that carries the server's public key.
    #[must_use]
    pub fn public_key_filename(self) -> &'static str {
        match self {
            Self::Xray => "xray_public.key",
            Self::AmneziaWg => "wireguard_server_public_key.key",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xray => "xray",
            Self::AmneziaWg => "amneziawg",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the protocol's files are reached on the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Files are volume-mounted and transferred directly.
    Volume,
    /// Files only exist inside the container and are moved with `docker cp`.
    #[default]
    Container,
}

/// Transfer path selected from a profile's [`AccessMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess<'a> {
    Direct,
    Container(&'a str),
}

/// Per-server, per-protocol capability and path descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolProfile {
    #[serde(rename = "protocol")]
    pub kind: ProtocolKind,
    /// Directory containing the live config and the clients table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Server public key embedded in client artifacts. Read from the
    /// server when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Pre-shared key handed to every AmneziaWG peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<String>,
    /// Whether the server keeps a `clientsTable` ledger for this protocol.
    #[serde(default = "default_true")]
    pub ledger: bool,
    #[serde(default)]
    pub access: AccessMode,
}

impl ProtocolProfile {
    /// Profile with every path and flag at its default.
    #[must_use]
    pub fn new(kind: ProtocolKind) -> Self {
        Self {
            kind,
            config_path: None,
            config_filename: None,
            container: None,
            public_key: None,
            preshared_key: None,
            ledger: true,
            access: AccessMode::default(),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> &str {
        self.config_path
            .as_deref()
            .unwrap_or_else(|| self.kind.default_config_path())
    }

    #[must_use]
    pub fn config_filename(&self) -> &str {
        self.config_filename
            .as_deref()
            .unwrap_or_else(|| self.kind.default_config_filename())
    }

    #[must_use]
    pub fn container(&self) -> &str {
        self.container
            .as_deref()
            .unwrap_or_else(|| self.kind.default_container())
    }

    /// Joins `name` onto the config directory.
    #[must_use]
    pub fn remote_path(&self, name: &str) -> String {
        let dir = self.config_dir();
        if dir.ends_with('/') {
            format!("{dir}{name}")
        } else {
            format!("{dir}/{name}")
        }
    }

    #[must_use]
    pub fn config_file_path(&self) -> String {
        self.remote_path(self.config_filename())
    }

    #[must_use]
    pub fn file_access(&self) -> FileAccess<'_> {
        match self.access {
            AccessMode::Volume => FileAccess::Direct,
            AccessMode::Container => FileAccess::Container(self.container()),
        }
    }
}

/// A VPN host reachable over SSH.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    /// Unique human-friendly name.
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    /// Private key used for SSH authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_max_configs")]
    pub max_configs: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub protocols: Vec<ProtocolProfile>,
}

impl Server {
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            ssh_port: default_ssh_port(),
            ssh_user: default_ssh_user(),
            identity_file: None,
            max_configs: default_max_configs(),
            is_active: true,
            protocols: Vec::new(),
        }
    }

    #[must_use]
    pub fn profile(&self, kind: ProtocolKind) -> Option<&ProtocolProfile> {
        self.protocols.iter().find(|p| p.kind == kind)
    }

    /// `user@host` as passed to ssh.
    #[must_use]
    pub fn ssh_destination(&self) -> String {
        format!("{}@{}", self.ssh_user, self.host)
    }
}

/// A credential issued on a server, as recorded by the external store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientRecord {
    pub server: String,
    pub protocol: ProtocolKind,
    /// UUID for Xray, peer public key for AmneziaWG.
    pub client_id: String,
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_max_configs() -> u32 {
    100
}
