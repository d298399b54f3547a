//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `vpnctl_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use vpnctl_common::Server;

use crate::domain::{ProvisionError, WgKeyPair};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
///
/// A deadline overrun is reported as a [`crate::domain::CommandTimeout`]
/// inside the returned `anyhow::Error`.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`, under the default timeout.
    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output>;
}

// ── Remote Transport Port ─────────────────────────────────────────────────────

/// An authenticated channel to one server.
///
/// Remote paths are absolute paths on the host filesystem. Container
/// copies are composed from these primitives by the application layer.
#[allow(async_fn_in_trait)]
pub trait RemoteTransport {
    /// Run `command` through the remote shell and return its stdout.
    ///
    /// # Errors
    ///
    /// Fails with `Transport` on a non-zero exit status or on any stderr
    /// output, even when the exit status is zero.
    async fn exec(&self, command: &str) -> Result<String, ProvisionError>;
    /// Copy a remote file to `local`.
    async fn fetch(&self, remote: &str, local: &Path) -> Result<(), ProvisionError>;
    /// Copy `local` to the remote path, replacing it.
    async fn push(&self, local: &Path, remote: &str) -> Result<(), ProvisionError>;
    /// Tear down the connection.
    async fn close(&self) -> Result<(), ProvisionError>;
}

/// Opens transports to inventory servers.
#[allow(async_fn_in_trait)]
pub trait TransportConnector {
    type Transport: RemoteTransport;

    /// # Errors
    ///
    /// Returns `Connect` when the server cannot be reached or rejects the
    /// credentials, `TransportTimeout` when the handshake hangs.
    async fn connect(&self, server: &Server) -> Result<Self::Transport, ProvisionError>;
}

// ── Key and Artifact Ports ────────────────────────────────────────────────────

/// Source of fresh AmneziaWG keypairs.
pub trait KeyGenerator {
    fn generate(&self) -> WgKeyPair;
}

/// Writes generated client configuration files.
#[allow(async_fn_in_trait)]
pub trait ArtifactWriter {
    /// Write `contents` to a new file whose name starts with `stem` and
    /// return its path. Two calls never return the same path.
    async fn write_artifact(&self, stem: &str, contents: &str) -> Result<PathBuf, ProvisionError>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts loading the inventory and settings file.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults if the file does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<crate::domain::VpnctlConfig>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}
