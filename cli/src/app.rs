//! Application context: unified state passed to every command handler.
//!
//! `AppContext` bundles the output context, the loaded inventory and the
//! SSH-backed provisioner so command signatures stay `(&AppContext, args)`.

use std::path::PathBuf;

use anyhow::Result;
use vpnctl_common::Server;

use crate::application::ports::ConfigStore;
use crate::application::services::{Provisioner, ProvisionerOptions, SessionOptions};
use crate::domain::VpnctlConfig;
use crate::infra::artifacts::ArtifactDir;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::keys::X25519Keys;
use crate::infra::ssh::OpenSshConnector;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Provisioner wired to OpenSSH, x25519 keys and on-disk artifacts.
pub type SshProvisioner = Provisioner<OpenSshConnector<TokioCommandRunner>, X25519Keys, ArtifactDir>;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    /// Config file given with `--config`.
    pub config: Option<PathBuf>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Loaded and validated configuration.
    pub config: VpnctlConfig,
    /// Where `config` was read from.
    pub config_path: PathBuf,
    pub provisioner: SshProvisioner,
}

impl AppContext {
    /// Load configuration and build the provisioner.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is unreadable or
    /// invalid, or if the home directory cannot be determined.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        let store = YamlConfigStore::new(flags.config.clone());
        let config = store.load()?;
        let config_path = store.path()?;
        let provisioner = build_provisioner(&config);

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            config,
            config_path,
            provisioner,
        })
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Inventory entry named `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownServer` listing the configured names.
    pub fn server(&self, name: &str) -> Result<&Server> {
        Ok(self.config.server(name)?)
    }
}

fn build_provisioner(config: &VpnctlConfig) -> SshProvisioner {
    let runner = TokioCommandRunner::new(config.ssh.command_timeout());
    let connector = OpenSshConnector::new(runner, config.ssh.clone());
    let writer = ArtifactDir::from_setting(config.session.artifact_dir.clone());
    let options = ProvisionerOptions {
        session: SessionOptions {
            scratch_root: config.session.scratch_dir.clone(),
            verify_remote_digest: config.session.verify_remote_digest,
            ..SessionOptions::default()
        },
    };
    Provisioner::new(connector, X25519Keys, writer, options)
}
