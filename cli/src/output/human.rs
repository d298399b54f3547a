//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;
use secrecy::ExposeSecret;
use vpnctl_common::{CapacityReport, ProtocolKind, Server};

use crate::application::services::{ClientSummary, IssuedCredential};
use crate::output::OutputContext;

/// Renders results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_servers(&self, servers: &[Server]) {
        if servers.is_empty() {
            self.ctx.info("No servers configured.");
            return;
        }
        for server in servers {
            let state = if server.is_active { "active" } else { "inactive" };
            let protocols: Vec<&str> = server.protocols.iter().map(|p| p.kind.as_str()).collect();
            self.ctx.header(&server.name);
            self.ctx
                .kv("Host:", &format!("{}:{}", server.ssh_destination(), server.ssh_port));
            self.ctx.kv("State:", state);
            self.ctx.kv("Protocols:", &protocols.join(", "));
            self.ctx.kv("Max configs:", &server.max_configs.to_string());
        }
    }

    pub fn render_issued(&self, server: &Server, issued: &IssuedCredential, show_private_key: bool) {
        self.ctx
            .success(&format!("Issued {} on {}", issued.client_name(), server.name));
        self.ctx.kv("Client id:", issued.client_id());
        match issued {
            IssuedCredential::Xray { url, .. } => self.ctx.secret(url),
            IssuedCredential::AmneziaWg {
                address, artifact, ..
            } => {
                self.ctx.kv("Address:", address);
                self.ctx.secret(&artifact.display().to_string());
            }
        }
        if let (true, Some(key)) = (show_private_key, issued.private_key()) {
            self.ctx.secret(key.expose_secret());
        }
    }

    pub fn render_revoked(&self, server: &Server, kind: ProtocolKind, client_id: &str) {
        self.ctx
            .success(&format!("Revoked {kind} client {client_id} on {}", server.name));
    }

    pub fn render_toggled(&self, client_id: &str, enabled: bool, changed: bool) {
        let verb = if enabled { "enabled" } else { "disabled" };
        if changed {
            self.ctx.success(&format!("Client {client_id} {verb}"));
        } else {
            self.ctx.info(&format!("Client {client_id} already {verb}"));
        }
    }

    pub fn render_clients(&self, server: &Server, kind: ProtocolKind, clients: &[ClientSummary]) {
        self.ctx.header(&format!("{} ({kind})", server.name));
        if clients.is_empty() {
            self.ctx.info("No clients.");
            return;
        }
        for client in clients {
            let mark = if client.enabled {
                "●".style(self.ctx.styles.success).to_string()
            } else {
                "○".style(self.ctx.styles.dim).to_string()
            };
            let mut line = format!("{mark} {}", client.client_id);
            if !client.client_name.is_empty() {
                line.push_str(&format!("  {}", client.client_name));
            }
            if let Some(address) = &client.address {
                line.push_str(&format!("  {address}"));
            }
            if !client.in_ledger {
                line.push_str(&format!("  {}", "(not in ledger)".style(self.ctx.styles.warning)));
            }
            if !self.ctx.quiet {
                println!("  {line}");
            }
        }
        let stray = clients.iter().filter(|c| !c.in_ledger).count();
        if stray > 0 {
            self.ctx
                .warn(&format!("{stray} client(s) missing from the ledger"));
        }
    }

    pub fn render_link(&self, link: &str) {
        self.ctx.secret(link);
    }

    pub fn render_artifact(&self, path: &Path) {
        self.ctx.success("Client config written");
        self.ctx.secret(&path.display().to_string());
    }

    pub fn render_capacity(&self, rows: &[CapacityReport]) {
        for row in rows {
            let status = match (row.is_active, row.overloaded) {
                (false, _) => "inactive".style(self.ctx.styles.dim).to_string(),
                (true, true) => "full".style(self.ctx.styles.error).to_string(),
                (true, false) => "open".style(self.ctx.styles.success).to_string(),
            };
            self.ctx.kv(
                &format!("{}:", row.server),
                &format!(
                    "{}/{} issued, {} free  {status}",
                    row.issued, row.max_configs, row.available_slots
                ),
            );
        }
    }
}
