//! Output formatting module

pub mod human;
pub mod json;
pub mod styles;

use std::path::Path;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
use serde_json::json;
use vpnctl_common::{CapacityReport, ProtocolKind, Server};

use crate::application::services::{ClientSummary, IssuedCredential};
pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use styles::Styles;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }

    /// Print a value meant for copying. Printed even when `quiet`, since
    /// it is the command's result.
    pub fn secret(&self, value: &str) {
        println!("{}", value.style(self.styles.secret));
    }
}

/// Renderer selected by the `--json` flag.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_servers(&self, servers: &[Server]) -> Result<()> {
        match self {
            Self::Human(r) => r.render_servers(servers),
            Self::Json(r) => r.render(&json!({ "servers": servers }))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_issued(
        &self,
        server: &Server,
        issued: &IssuedCredential,
        show_private_key: bool,
    ) -> Result<()> {
        match self {
            Self::Human(r) => r.render_issued(server, issued, show_private_key),
            Self::Json(r) => r.render(&json::issued_value(&server.name, issued, show_private_key))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_revoked(&self, server: &Server, kind: ProtocolKind, client_id: &str) -> Result<()> {
        match self {
            Self::Human(r) => r.render_revoked(server, kind, client_id),
            Self::Json(r) => r.render(&json!({
                "server": server.name,
                "protocol": kind,
                "client_id": client_id,
                "revoked": true,
            }))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_toggled(&self, client_id: &str, enabled: bool, changed: bool) -> Result<()> {
        match self {
            Self::Human(r) => r.render_toggled(client_id, enabled, changed),
            Self::Json(r) => r.render(&json!({
                "client_id": client_id,
                "enabled": enabled,
                "changed": changed,
            }))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_clients(
        &self,
        server: &Server,
        kind: ProtocolKind,
        clients: &[ClientSummary],
    ) -> Result<()> {
        match self {
            Self::Human(r) => r.render_clients(server, kind, clients),
            Self::Json(r) => r.render(&json!({
                "server": server.name,
                "protocol": kind,
                "clients": clients,
            }))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_link(&self, link: &str) -> Result<()> {
        match self {
            Self::Human(r) => r.render_link(link),
            Self::Json(r) => r.render(&json!({ "url": link }))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_artifact(&self, path: &Path) -> Result<()> {
        match self {
            Self::Human(r) => r.render_artifact(path),
            Self::Json(r) => r.render(&json!({ "artifact": path }))?,
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_capacity(&self, rows: &[CapacityReport]) -> Result<()> {
        match self {
            Self::Human(r) => r.render_capacity(rows),
            Self::Json(r) => r.render(&json!({ "servers": rows }))?,
        }
        Ok(())
    }
}
