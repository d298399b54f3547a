//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All error types implement `thiserror::Error`; the command layer converts
//! them to `anyhow::Error` via the `?` operator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Failure kinds surfaced by sessions and protocol managers.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("cannot connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("remote command `{command}` failed: {message}")]
    Transport { command: String, message: String },

    #[error("`{operation}` timed out after {}s", timeout.as_secs())]
    TransportTimeout {
        operation: String,
        timeout: Duration,
    },

    #[error("cannot sync remote file {path}: {reason}")]
    FileSync { path: String, reason: String },

    #[error("address pool {pool} is exhausted")]
    PoolExhausted { pool: String },

    #[error("client {client_id} not found")]
    NotFound { client_id: String },

    #[error("client {client_id} already exists")]
    AlreadyExists { client_id: String },

    #[error("server {server} is at capacity ({issued}/{max_configs} configs issued)")]
    CapacityExceeded {
        server: String,
        issued: u32,
        max_configs: u32,
    },

    #[error("server {0} is not active")]
    ServerInactive(String),

    #[error("server {server} has no {protocol} profile")]
    UnsupportedProtocol { server: String, protocol: String },

    #[error("remote file {path} changed since it was fetched")]
    Conflict { path: String },

    #[error("local scratch I/O failed at {}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{primary} (while cleaning up: {secondary})")]
    Chained {
        primary: Box<ProvisionError>,
        secondary: Box<ProvisionError>,
    },
}

impl ProvisionError {
    /// Attach an error raised during restart/cleanup to `self`, keeping
    /// `self` as the primary cause.
    #[must_use]
    pub fn chain(self, secondary: ProvisionError) -> Self {
        Self::Chained {
            primary: Box::new(self),
            secondary: Box::new(secondary),
        }
    }

    /// The error that caused the failure, skipping cleanup attachments.
    #[must_use]
    pub fn primary(&self) -> &ProvisionError {
        match self {
            Self::Chained { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Stable machine-readable code, used by `--json` error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self.primary() {
            Self::Connect { .. } | Self::Transport { .. } => "transport",
            Self::TransportTimeout { .. } => "transport_timeout",
            Self::FileSync { .. } => "file_sync",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::ServerInactive(_) => "server_inactive",
            Self::UnsupportedProtocol { .. } => "unsupported_protocol",
            Self::Conflict { .. } => "conflict",
            Self::Local { .. } => "local_io",
            Self::Chained { .. } => "chained",
        }
    }

    pub(crate) fn local(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Local {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn file_sync(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::FileSync {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

// ── Document errors ───────────────────────────────────────────────────────────

/// Errors parsing the live config or ledger documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

// ── Process errors ────────────────────────────────────────────────────────────

/// A local process (ssh, sftp) exceeded its deadline and was killed.
#[derive(Debug, Error)]
#[error("{program} timed out after {}s", timeout.as_secs())]
pub struct CommandTimeout {
    pub program: String,
    pub timeout: Duration,
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to the server inventory and settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown server: {name}\n\nConfigured servers: {valid}")]
    UnknownServer { name: String, valid: String },

    #[error("Server '{0}' is listed more than once.")]
    DuplicateServer(String),

    #[error("Server '{server}' lists protocol {protocol} more than once.")]
    DuplicateProtocol { server: String, protocol: String },

    #[error("Server '{server}': {message}")]
    InvalidServer { server: String, message: String },
}
